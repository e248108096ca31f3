use crate::api::{self, FlightFilters};
use crate::auth;
use crate::guard::{self, Guarded};
use crate::http::ApiClient;
use crate::navigation::Route;
use crate::pages::flights::{describe_flight, FlightsPage};
use crate::pages::login::LoginPage;
use crate::pages::profile::{ProfilePage, EDITABLE_FIELDS};
use crate::pages::register::RegisterPage;
use crate::pages::reservation_detail::ReservationDetailPage;
use crate::pages::reservations::ReservationsPage;
use crate::pages::reserve::{ReservePage, PASSENGER_FIELDS};
use crate::pages::{self, format_price, parse_id};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

pub struct Context {
    pub client: ApiClient,
    pub session_id: String,
    pub credentials_path: Option<PathBuf>,
    pub journal_path: Option<PathBuf>,
    flights: RefCell<Option<FlightsPage>>,
}

impl Context {
    pub fn new(client: ApiClient, session_id: String) -> Self {
        Self {
            client,
            session_id,
            credentials_path: None,
            journal_path: None,
            flights: RefCell::new(None),
        }
    }
}

/// Line input for interactive commands
pub trait Prompt {
    /// `None` when input ends or is interrupted.
    fn ask(&mut self, label: &str) -> Result<Option<String>>;

    /// Like `ask`, but the typed text is not echoed and not trimmed.
    fn secret(&mut self, label: &str) -> Result<Option<String>>;
}

impl Prompt for DefaultEditor {
    fn ask(&mut self, label: &str) -> Result<Option<String>> {
        match self.readline(label) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn secret(&mut self, label: &str) -> Result<Option<String>> {
        match rpassword::prompt_password(label) {
            Ok(line) => Ok(Some(line)),
            Err(e) if matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::Interrupted) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read password")),
        }
    }
}

fn confirm(prompt: &mut dyn Prompt, label: &str) -> Result<bool> {
    Ok(prompt
        .ask(label)?
        .is_some_and(|a| matches!(a.to_lowercase().as_str(), "y" | "yes")))
}

pub fn run_once(ctx: &Context, command: &str) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut out = std::io::stdout();
    handle_command(ctx, command, &mut rl, &mut out)?;
    Ok(())
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut out = std::io::stdout();

    println!("sabj - type /help for commands, /exit to quit");

    loop {
        let label = format!("sabj {}> ", ctx.client.session().navigator().current());
        match rl.readline(&label) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_command(&ctx, line, &mut rl, &mut out) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Run one command line. Returns true when the shell should exit.
pub fn handle_command(
    ctx: &Context,
    line: &str,
    prompt: &mut dyn Prompt,
    out: &mut dyn Write,
) -> Result<bool> {
    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => {
            writeln!(out, "Parse error: {}", e)?;
            return Ok(false);
        }
    };
    let Some((cmd, args)) = words.split_first() else {
        return Ok(false);
    };
    let client = &ctx.client;

    match cmd.as_str() {
        "/exit" | "/quit" => return Ok(true),
        "/help" => print_help(out)?,
        "/login" => login(client, args, prompt, out)?,
        "/register" => {
            let mut page = RegisterPage::mount(client);
            match parse_assignments(args) {
                Ok(fields) => match page.fill(&fields) {
                    Ok(()) => {
                        page.submit(client);
                        match page.status() {
                            Some(status) => writeln!(out, "{}", status)?,
                            None => write!(out, "{}", page.render())?,
                        }
                    }
                    Err(e) => writeln!(out, "{}", e)?,
                },
                Err(e) => writeln!(out, "{}", e)?,
            }
        }
        "/logout" => {
            let open = ctx.flights.borrow_mut().take();
            match open {
                Some(mut page) => page.logout(client),
                None => auth::logout(client.session()),
            }
            writeln!(out, "Logged out.")?;
        }
        "/profile" => profile(client, args, out)?,
        "/dashboard" => {
            pages::open_dashboard(client);
            show_flights(ctx, FlightsPage::mount(client), out)?;
        }
        "/flights" => {
            if args.first().map(String::as_str) == Some("clear") {
                // Clear on the page already open, if any
                let on_flights = client.session().navigator().current() == Route::Flights;
                let cleared = match ctx.flights.borrow_mut().as_mut() {
                    Some(page) if on_flights && page.filters().is_empty() => Some(page.render()),
                    Some(page) if on_flights => {
                        page.clear_filters(client);
                        Some(page.render())
                    }
                    _ => None,
                };
                match cleared {
                    Some(text) => write!(out, "{}", text)?,
                    None => show_flights(ctx, FlightsPage::mount(client), out)?,
                }
            } else {
                match parse_filters(args) {
                    Ok(filters) => show_flights(ctx, FlightsPage::mount_with(client, filters), out)?,
                    Err(e) => writeln!(out, "{}", e)?,
                }
            }
        }
        "/flight" => match args.first().and_then(|a| parse_id(a)) {
            Some(id) => show_flight(client, id, out)?,
            None => writeln!(out, "Usage: /flight <id>")?,
        },
        "/reserve" => match args.first() {
            Some(id) => reserve(client, id, prompt, out)?,
            None => writeln!(out, "Usage: /reserve <flightId>")?,
        },
        "/reservations" => {
            let page = ReservationsPage::mount(client);
            write!(out, "{}", page.render())?;
        }
        "/reservation" => match args.first() {
            Some(id) => {
                let page = ReservationDetailPage::mount(client, id);
                write!(out, "{}", page.render())?;
            }
            None => writeln!(out, "Usage: /reservation <id>")?,
        },
        "/cancel" => match args.first().and_then(|a| parse_id(a)) {
            Some(id) => cancel(client, id, prompt, out)?,
            None => writeln!(out, "Usage: /cancel <id>")?,
        },
        "/go" => match args.first().and_then(|p| Route::parse(p)) {
            Some(route) => open_route(ctx, route, prompt, out)?,
            None => writeln!(out, "Usage: /go <path>, e.g. /go /mis-reservas")?,
        },
        "/session" => show_session(ctx, out)?,
        "/route" => {
            let nav = client.session().navigator();
            writeln!(out, "Current: {}", nav.current())?;
            let history: Vec<String> = nav.history().iter().map(Route::path).collect();
            if !history.is_empty() {
                writeln!(out, "History: {}", history.join(" -> "))?;
            }
        }
        other => writeln!(out, "Unknown command: {}. Type /help.", other)?,
    }
    Ok(false)
}

fn print_help(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Account:")?;
    writeln!(out, "  /login <user>              - sign in (password is prompted)")?;
    writeln!(out, "  /register key=value...     - create an account (username, email, password, ...)")?;
    writeln!(out, "  /logout                    - forget stored credentials")?;
    writeln!(out, "  /profile                   - show your profile")?;
    writeln!(out, "  /profile edit key=value... - update {}", EDITABLE_FIELDS.join(", "))?;
    writeln!(out, "  /profile logout            - same as /logout")?;
    writeln!(out, "Flights:")?;
    writeln!(out, "  /flights [origen=UIO] [destino=BOG] [fecha=YYYY-MM-DD]")?;
    writeln!(out, "  /flights clear             - drop the filters")?;
    writeln!(out, "  /flight <id>               - flight details")?;
    writeln!(out, "  /reserve <flightId>        - book seats interactively")?;
    writeln!(out, "Reservations:")?;
    writeln!(out, "  /reservations              - list with flight details")?;
    writeln!(out, "  /reservation <id>          - reservation details")?;
    writeln!(out, "  /cancel <id>               - cancel after confirmation")?;
    writeln!(out, "Session:")?;
    writeln!(out, "  /session                   - stored credentials and journal")?;
    writeln!(out, "  /route                     - current page and history")?;
    writeln!(out, "  /go <path>                 - open a page by path")?;
    writeln!(out, "  /help, /exit")?;
    Ok(())
}

fn login(client: &ApiClient, args: &[String], prompt: &mut dyn Prompt, out: &mut dyn Write) -> Result<()> {
    let username = match args {
        [username] => username,
        [] => {
            writeln!(out, "Usage: /login <user>")?;
            return Ok(());
        }
        _ => {
            writeln!(out, "Passwords are not accepted as arguments. Use /login <user> and enter it at the prompt.")?;
            return Ok(());
        }
    };
    let Some(password) = prompt.secret("Password: ")? else {
        return Ok(());
    };
    let mut page = LoginPage::mount(client);
    if page.submit(client, username, &password) {
        writeln!(out, "Logged in as {}.", username)?;
    } else {
        write!(out, "{}", page.render())?;
    }
    Ok(())
}

fn profile(client: &ApiClient, args: &[String], out: &mut dyn Write) -> Result<()> {
    let mut page = ProfilePage::mount(client);
    if page.state().ready().is_none() {
        write!(out, "{}", page.render())?;
        return Ok(());
    }
    if args.first().map(String::as_str) == Some("logout") {
        page.logout(client);
        writeln!(out, "Logged out.")?;
        return Ok(());
    }
    if args.first().map(String::as_str) == Some("edit") {
        let fields = match parse_assignments(&args[1..]) {
            Ok(fields) => fields,
            Err(e) => {
                writeln!(out, "{}", e)?;
                return Ok(());
            }
        };
        page.toggle_edit();
        for (field, value) in &fields {
            if let Err(e) = page.set_field(field, value) {
                writeln!(out, "{}", e)?;
                return Ok(());
            }
        }
        page.submit(client);
    }
    write!(out, "{}", page.render())?;
    Ok(())
}

fn show_flights(ctx: &Context, page: FlightsPage, out: &mut dyn Write) -> Result<()> {
    write!(out, "{}", page.render())?;
    if page.state().is_redirected() {
        writeln!(out, "Use /login <user> to sign in.")?;
    }
    *ctx.flights.borrow_mut() = Some(page);
    Ok(())
}

fn show_flight(client: &ApiClient, id: u64, out: &mut dyn Write) -> Result<()> {
    match guard::protect(client, |_| api::get_flight(client, id)) {
        Guarded::Allowed { content: Ok(flight), .. } => write!(out, "{}", describe_flight(&flight))?,
        Guarded::Allowed { content: Err(e), .. } => {
            writeln!(out, "{}", e.user_message("Could not load the flight."))?
        }
        Guarded::Redirected => writeln!(out, "Session expired. Please /login.")?,
    }
    Ok(())
}

fn reserve(client: &ApiClient, raw_id: &str, prompt: &mut dyn Prompt, out: &mut dyn Write) -> Result<()> {
    let mut page = ReservePage::mount(client, raw_id);
    write!(out, "{}", page.render())?;
    let Some(max) = page.state().ready().map(|v| v.max_seats()) else {
        return Ok(());
    };
    if max == 0 {
        writeln!(out, "No seats available on this flight.")?;
        return Ok(());
    }

    loop {
        let Some(answer) = prompt.ask(&format!("Seats (1-{}) [1]: ", max))? else {
            return Ok(());
        };
        let seats = if answer.is_empty() { Ok(1) } else { answer.parse::<u32>() };
        match seats.map_err(|e| e.to_string()).and_then(|n| page.select_seats(n)) {
            Ok(()) => break,
            Err(e) => writeln!(out, "{}", e)?,
        }
    }

    let count = page.state().ready().map(|v| v.form.len()).unwrap_or(0);
    for index in 0..count {
        for field in PASSENGER_FIELDS {
            loop {
                let current = page
                    .state()
                    .ready()
                    .and_then(|v| v.form.passengers().get(index))
                    .map(|p| passenger_value(p, field))
                    .unwrap_or_default();
                let label = format!("Passenger {} {} [{}]: ", index + 1, field, current);
                let Some(answer) = prompt.ask(&label)? else {
                    return Ok(());
                };
                if answer.is_empty() {
                    break;
                }
                match page.set_passenger(index, field, &answer) {
                    Ok(()) => break,
                    Err(e) => writeln!(out, "{}", e)?,
                }
            }
        }
    }

    let total = page.state().ready().map(|v| {
        let base: f64 = v.flight.base_price.parse().unwrap_or(0.0);
        format_price(&(base * v.seats as f64).to_string())
    });
    let label = format!("Book for about ${}? [y/N] ", total.unwrap_or_default());
    if confirm(prompt, &label)? {
        page.submit(client);
        write!(out, "{}", page.render())?;
        if let Some(reservation) = page.created() {
            writeln!(out, "View it with /reservation {}", reservation.id)?;
        }
    } else {
        writeln!(out, "Reservation not submitted.")?;
    }
    Ok(())
}

fn passenger_value(p: &api::Passenger, field: &str) -> String {
    match field {
        "nombre" => p.first_name.clone(),
        "apellido" => p.last_name.clone(),
        "tipo_documento" => p.document_type.clone(),
        "numero_documento" => p.document_number.clone(),
        "fecha_nacimiento" => p.birth_date.clone(),
        _ => String::new(),
    }
}

fn cancel(client: &ApiClient, id: u64, prompt: &mut dyn Prompt, out: &mut dyn Write) -> Result<()> {
    let mut page = ReservationsPage::mount(client);
    if page.state().ready().is_none() {
        write!(out, "{}", page.render())?;
        return Ok(());
    }
    if let Err(e) = page.request_cancel(id) {
        writeln!(out, "{}", e)?;
        return Ok(());
    }
    if confirm(prompt, &format!("Cancel reservation #{}? [y/N] ", id))? {
        page.confirm_cancel(client);
    } else {
        page.abort_cancel();
        writeln!(out, "Kept reservation #{}.", id)?;
    }
    write!(out, "{}", page.render())?;
    Ok(())
}

fn open_route(ctx: &Context, route: Route, prompt: &mut dyn Prompt, out: &mut dyn Write) -> Result<()> {
    let client = &ctx.client;
    if route.is_protected() && client.session().access_token().is_none() {
        client.session().navigate(Route::Login);
        writeln!(out, "Not logged in. Use /login <user> first.")?;
        return Ok(());
    }
    match route {
        Route::Login => {
            LoginPage::mount(client);
            writeln!(out, "Use /login <user> to sign in.")?;
        }
        Route::Register => {
            RegisterPage::mount(client);
            writeln!(out, "Use /register key=value... to create an account.")?;
        }
        Route::Profile => profile(client, &[], out)?,
        Route::Dashboard => {
            pages::open_dashboard(client);
            show_flights(ctx, FlightsPage::mount(client), out)?;
        }
        Route::Flights => show_flights(ctx, FlightsPage::mount(client), out)?,
        Route::Reserve(id) => reserve(client, &id.to_string(), prompt, out)?,
        Route::Reservations => write!(out, "{}", ReservationsPage::mount(client).render())?,
        Route::ReservationDetail(id) => {
            write!(out, "{}", ReservationDetailPage::mount(client, &id.to_string()).render())?
        }
    }
    Ok(())
}

fn show_session(ctx: &Context, out: &mut dyn Write) -> Result<()> {
    let session = ctx.client.session();
    writeln!(out, "Session: {}", ctx.session_id)?;
    writeln!(out, "Gateway: {}", ctx.client.base_url())?;
    if let Some(path) = &ctx.credentials_path {
        writeln!(out, "Credentials: {}", path.display())?;
    } else {
        writeln!(out, "Credentials: in memory")?;
    }
    if let Some(path) = &ctx.journal_path {
        writeln!(out, "Journal: {}", path.display())?;
    }
    let status = session.status()?;
    match status.access_expires {
        Some(at) => writeln!(out, "Access credential: stored, expires {}", at.to_rfc3339())?,
        None => writeln!(out, "Access credential: none")?,
    }
    if let Some(at) = status.access_claims_expiry {
        writeln!(out, "  token exp claim: {}", at.to_rfc3339())?;
    }
    match status.refresh_expires {
        Some(at) => writeln!(out, "Refresh credential: stored, expires {}", at.to_rfc3339())?,
        None => writeln!(out, "Refresh credential: none")?,
    }
    Ok(())
}

/// `key=value` words into pairs
fn parse_assignments(args: &[String]) -> Result<Vec<(String, String)>, String> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| format!("Expected key=value, got '{}'", arg))
        })
        .collect()
}

fn parse_filters(args: &[String]) -> Result<FlightFilters, String> {
    let mut filters = FlightFilters::default();
    for (key, value) in parse_assignments(args)? {
        let slot = match key.as_str() {
            "origen" | "origin" => &mut filters.origin,
            "destino" | "destination" => &mut filters.destination,
            "fecha" | "date" => &mut filters.date,
            _ => return Err(format!("Unknown filter: {} (use origen, destino, fecha)", key)),
        };
        *slot = Some(value);
    }
    Ok(filters)
}
