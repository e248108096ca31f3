mod api;
mod auth;
mod cli;
mod config;
mod error;
mod fetch;
mod guard;
mod http;
mod journal;
mod navigation;
mod pages;
mod session;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sabj", about = "Terminal client for the SABJ Air booking gateway")]
pub struct Args {
    #[arg(short, long, help = "Run one command (e.g. '/flights origen=UIO') and exit")]
    pub command: Option<String>,

    #[arg(long, env = "SABJ_BASE_URL", help = "Gateway base URL")]
    pub base_url: Option<String>,

    #[arg(long, value_name = "MS", help = "Request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory holding stored credentials")]
    pub session_dir: Option<PathBuf>,

    #[arg(long, help = "Keep credentials in memory only")]
    pub ephemeral: bool,

    #[arg(long, help = "Do not write the activity journal")]
    pub no_journal: bool,

    #[arg(long, help = "Debug output (requests and navigation)")]
    pub debug: bool,

    #[arg(long, help = "Trace output (everything)")]
    pub trace: bool,
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_env("SABJ_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if args.trace {
            "sabj=trace"
        } else if args.debug {
            "sabj=debug"
        } else {
            "sabj=warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args);

    let mut cfg = match &args.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    // Command-line flags win over every config layer
    if let Some(url) = &args.base_url {
        cfg.gateway.base_url = Some(url.clone());
    }
    if let Some(ms) = args.timeout_ms {
        cfg.gateway.timeout_ms = Some(ms);
    }
    if let Some(dir) = &args.session_dir {
        cfg.session.dir = Some(dir.clone());
    }
    if args.no_journal {
        cfg.journal.enabled = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(anyhow::anyhow!("Invalid configuration:\n  {}", lines.join("\n  ")));
    }

    let base_url = cfg.gateway.base_url().to_string();
    tracing::debug!(base_url = %base_url, timeout = ?cfg.gateway.timeout(), "gateway");

    let (store, credentials_path) = if args.ephemeral {
        let store: Box<dyn session::CredentialStore> = Box::new(session::MemoryCredentialStore::new());
        (store, None)
    } else {
        let file = session::FileCredentialStore::for_gateway(&cfg.session.dir(), &base_url);
        let path = file.path().to_path_buf();
        let store: Box<dyn session::CredentialStore> = Box::new(file);
        (store, Some(path))
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut session = session::SessionContext::new(store, cfg.session.lifetimes());
    let mut journal_path = None;
    if cfg.journal.enabled() {
        match journal::Journal::in_dir(&cfg.journal.dir(), &session_id) {
            Ok(journal) => {
                journal_path = Some(journal.path.clone());
                session = session.with_journal(journal);
            }
            Err(e) => tracing::warn!("journal disabled: {:#}", e),
        }
    }

    let transport = http::UreqTransport::new(cfg.gateway.timeout());
    let client = http::ApiClient::new(&base_url, Box::new(transport), session);

    let mut ctx = cli::Context::new(client, session_id);
    ctx.credentials_path = credentials_path;
    ctx.journal_path = journal_path;

    if let Some(command) = &args.command {
        cli::run_once(&ctx, command)
    } else {
        cli::run_repl(ctx)
    }
}
