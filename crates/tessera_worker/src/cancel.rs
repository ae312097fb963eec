use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a running operation and
/// whoever may want to stop it.
///
/// Operations poll [`is_cancelled`](Self::is_cancelled) at every unit
/// boundary (row, file) and return a partial result when it is set.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation. Returns true for the first request only.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let seen_by_worker = token.clone();
        assert!(!seen_by_worker.is_cancelled());

        assert!(token.cancel());
        assert!(seen_by_worker.is_cancelled());
        assert!(!seen_by_worker.cancel());
    }
}
