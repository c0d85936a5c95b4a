use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::solver::error::SolveError;

/// Shared flag to abort a solve. It is only observed between phases, a running
/// phase always completes.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    is_cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.is_cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::Relaxed)
    }

    pub fn check(&self, phase: &'static str) -> Result<(), SolveError> {
        if self.is_cancelled() {
            Err(SolveError::Cancelled { phase })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert!(token.check("allocation").is_ok());
        clone.cancel();

        assert!(matches!(
            token.check("solver"),
            Err(SolveError::Cancelled { phase: "solver" })
        ));
    }
}
