//! Process signals: SIGHUP asks for a restart, SIGTERM for a clean exit and
//! SIGCHLD is ignored so that spawned programs are reaped by the kernel.
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};

static RESTART: AtomicBool = AtomicBool::new(false);
static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_hangup(_: libc::c_int) {
    RESTART.store(true, Ordering::SeqCst);
}

extern "C" fn on_terminate(_: libc::c_int) {
    QUIT.store(true, Ordering::SeqCst);
}

pub fn install() -> Result<()> {
    let handlers = [
        (libc::SIGCHLD, libc::SIG_IGN),
        (libc::SIGHUP, on_hangup as libc::sighandler_t),
        (libc::SIGTERM, on_terminate as libc::sighandler_t),
    ];
    for (sig, handler) in handlers.iter() {
        if unsafe { libc::signal(*sig, *handler) } == libc::SIG_ERR {
            return Err(anyhow!("cannot install handler for signal {}", sig));
        }
    }
    Ok(())
}

/// Consume a pending request. `Some(true)` means restart, `Some(false)` quit.
pub fn pending() -> Option<bool> {
    if RESTART.swap(false, Ordering::SeqCst) {
        Some(true)
    } else if QUIT.swap(false, Ordering::SeqCst) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_consumed_once() {
        on_terminate(libc::SIGTERM);
        assert_eq!(pending(), Some(false));
        assert_eq!(pending(), None);
        on_hangup(libc::SIGHUP);
        on_terminate(libc::SIGTERM);
        assert_eq!(pending(), Some(true));
        assert_eq!(pending(), Some(false));
    }
}
