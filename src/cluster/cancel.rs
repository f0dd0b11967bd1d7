use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative stop request, polled by the engine between iterations.
///
/// `completed_iterations` is the number of iterations fully finished when the
/// signal is polled. Any `Fn(usize) -> bool` closure is a signal, which makes
/// "stop after iteration N" trivial to express.
pub trait CancelSignal {
    fn should_stop(&self, completed_iterations: usize) -> bool;
}

/// Signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn should_stop(&self, _completed_iterations: usize) -> bool {
        false
    }
}

/// Shared flag that can be raised from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl CancelSignal for CancelToken {
    fn should_stop(&self, _completed_iterations: usize) -> bool {
        self.is_cancelled()
    }
}

impl<F> CancelSignal for F
where
    F: Fn(usize) -> bool,
{
    fn should_stop(&self, completed_iterations: usize) -> bool {
        self(completed_iterations)
    }
}
