use super::gru::TrainingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative stop signal for a training run.
///
/// Cloning shares the cancellation flag, so the transport can hold one copy and raise it when
/// the client disconnects while the training thread polls another.
#[derive(Debug, Clone)]
pub struct TrainingControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl TrainingControl {
    pub fn new(cancelled: Arc<AtomicBool>, timeout: Duration) -> Self {
        Self {
            cancelled,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A control that is never exceeded unless cancelled explicitly.
    pub fn unbounded() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails once the run has been cancelled or has outlived its deadline.
    pub fn check(&self) -> Result<(), TrainingError> {
        if self.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(TrainingError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = Arc::new(AtomicBool::new(false));
        let control = TrainingControl::new(flag.clone(), Duration::from_secs(60));
        let other = control.clone();

        assert_eq!(control.check(), Ok(()));
        flag.store(true, Ordering::Release);

        assert_eq!(other.check(), Err(TrainingError::Cancelled));
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let control = TrainingControl::new(Arc::new(AtomicBool::new(false)), Duration::ZERO);

        assert_eq!(control.check(), Err(TrainingError::DeadlineExceeded));
    }

    #[test]
    fn cancellation_wins_over_deadline() {
        let control = TrainingControl::new(Arc::new(AtomicBool::new(false)), Duration::ZERO);
        control.cancel();

        assert_eq!(control.check(), Err(TrainingError::Cancelled));
    }
}
