// SPDX-License-Identifier: CEPL-1.0
//! SIGINT wiring. The handler only flips a static flag; the loop forwards it
//! to its [`CancelToken`] once per iteration.

use std::io;

use lumen_core::CancelToken;
use portable_atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Release);
}

/// One-shot handler: a second Ctrl-C gets the default action.
pub fn install() -> io::Result<()> {
    // SAFETY: the handler is async-signal-safe (a single atomic store) and
    // `action` is fully initialised before the call.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_sigint as libc::sighandler_t;
        action.sa_flags = libc::SA_RESETHAND;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

pub fn forward(cancel: &CancelToken) {
    if INTERRUPTED.load(Ordering::Acquire) {
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_reaches_the_token() {
        let cancel = CancelToken::new();
        on_sigint(libc::SIGINT);
        forward(&cancel);
        assert!(cancel.is_cancelled());
    }
}
