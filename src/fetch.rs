//! Fetch coordination: stale-result tokens and concurrent related fetches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Most related fetches in flight at once
pub const MAX_PARALLEL_FETCHES: usize = 8;

/// Generation counter for one view. Starting a fetch supersedes every
/// earlier one.
///
/// With the blocking transport a page begins and finishes a fetch inside
/// one call, so a token only goes stale when the two halves are driven
/// separately (`FlightsPage::begin_search` / `finish_search`) or the page
/// is logged out in between.
#[derive(Debug, Default)]
pub struct FetchSequence {
    generation: AtomicU64,
}

/// Identifies one started fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

impl FetchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> FetchToken {
        FetchToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: FetchToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }

    /// Invalidate outstanding fetches without starting a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fetch the related record of every item concurrently and wait for all.
/// At most [`MAX_PARALLEL_FETCHES`] run at a time.
///
/// A failed fetch degrades only its own item to `None`. Order is preserved.
pub fn join_related<T, R, E, F>(items: Vec<T>, fetch: F) -> Vec<(T, Option<R>)>
where
    T: Sync,
    R: Send,
    E: std::fmt::Display + Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    let mut related: Vec<Option<R>> = Vec::with_capacity(items.len());
    let fetch = &fetch;
    for chunk in items.chunks(MAX_PARALLEL_FETCHES) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|item| scope.spawn(move || fetch(item)))
                .collect();
            related.extend(handles.into_iter().map(|handle| match handle.join() {
                Ok(Ok(value)) => Some(value),
                Ok(Err(e)) => {
                    tracing::warn!("related fetch failed: {}", e);
                    None
                }
                Err(_) => {
                    tracing::warn!("related fetch panicked");
                    None
                }
            }));
        });
    }
    items.into_iter().zip(related).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_only_latest_token_is_current() {
        let seq = FetchSequence::new();
        let first = seq.begin();
        assert!(seq.is_current(first));
        let second = seq.begin();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
        seq.cancel();
        assert!(!seq.is_current(second));
    }

    #[test]
    fn test_join_related_degrades_per_item() {
        let joined = join_related(vec![1u64, 2, 3], |id| {
            if *id == 2 {
                Err("flight unavailable")
            } else {
                Ok(id * 10)
            }
        });
        assert_eq!(joined, vec![(1, Some(10)), (2, None), (3, Some(30))]);
    }

    #[test]
    fn test_join_related_runs_concurrently() {
        // Every fetch waits for all the others; sequential execution would hang.
        let barrier = Barrier::new(4);
        let joined = join_related(vec!['a', 'b', 'c', 'd'], |c| {
            barrier.wait();
            Ok::<_, String>(c.to_ascii_uppercase())
        });
        let upper: Vec<char> = joined.into_iter().filter_map(|(_, r)| r).collect();
        assert_eq!(upper, vec!['A', 'B', 'C', 'D']);
    }

    #[test]
    fn test_join_related_bounds_threads_in_flight() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..MAX_PARALLEL_FETCHES * 3 + 1).collect();
        let joined = join_related(items.clone(), |n| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, String>(n * 2)
        });
        assert!(peak.load(Ordering::SeqCst) <= MAX_PARALLEL_FETCHES);
        for (n, r) in &joined {
            assert_eq!(*r, Some(n * 2));
        }
        let order: Vec<usize> = joined.into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, items);
    }

    #[test]
    fn test_join_related_empty() {
        let joined = join_related(Vec::<u64>::new(), |id| Ok::<_, String>(*id));
        assert!(joined.is_empty());
    }
}
