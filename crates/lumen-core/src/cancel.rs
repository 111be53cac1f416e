// SPDX-License-Identifier: CEPL-1.0
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request shared between the loop driver and whoever may
/// ask it to stop (toplevel close, ESC, SIGINT forwarding).
///
/// Clones observe the same flag. Cancelling never interrupts work in
/// progress; the loop polls [`CancelToken::is_cancelled`] once per iteration.
#[derive(Clone, Debug, Default)]
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
