//! Async, message-mode bindings for the SRT (Secure Reliable Transport)
//! library.
//!
//! SRT's own C API exposes readiness through a private `epoll`-like group,
//! independent of any OS-level reactor — there is nothing a general-purpose
//! async runtime can `await` directly. This crate bridges that readiness
//! mechanism into tokio: a dedicated poll thread drives SRT's epoll group
//! and wakes tasks the way [`tokio::io::unix::AsyncFd`] wakes tasks over
//! the OS epoll for standard sockets, so that connecting, sending, and
//! accepting read like any other async I/O.
//!
//! - [`reactor::Reactor`] owns the epoll group and the poll thread; callers
//!   never touch it directly.
//! - [`Socket`] connects and exchanges whole messages.
//! - [`Acceptor`] binds, listens, and accepts, optionally gating incoming
//!   connections with a synchronous pre-accept hook.
//! - [`SrtOptions`] is the typed, phase-aware option set both adapters are
//!   constructed from.
//!
//! Only message-mode is exposed; SRT's reliability and boundary semantics
//! are message-shaped, and a byte-stream API would throw that away. No
//! reconnection, pooling, or load balancing is built in — compose that on
//! top, the same way you would for a `TcpStream`.

pub mod error;
pub mod logging;
pub mod options;
pub mod reactor;

mod acceptor;
mod socket;
mod stats;
mod sys;

pub use acceptor::{Acceptor, ListenHook};
pub use error::{ErrorKind, RejectReason};
pub use logging::{init as init_logging, LoggerInitError};
pub use options::{Phase, SrtOption, SrtOptions, TransType, TypedValue, ValueType};
pub use reactor::Reactor;
pub use socket::{ConnectCallback, Socket};
pub use stats::Stats;

use std::sync::atomic::AtomicIsize;

use sync::atomic::EasyAtomic;

static STARTUP_REFS: AtomicIsize = AtomicIsize::new(0);

/// Initializes the SRT library. Safe to call more than once — the library
/// itself only tears down on the matching number of [`cleanup`] calls, so
/// this crate mirrors that with its own reference count rather than
/// assuming the caller starts up exactly once.
pub fn startup() {
    if STARTUP_REFS.get() == 0 {
        let ret = unsafe { sys::srt_startup() };
        if ret < 0 {
            panic!("srt_startup failed: {:?}", error::map_last_error());
        }
        log::info!("SRT library initialized");
    }

    STARTUP_REFS.update(STARTUP_REFS.get() + 1);
}

/// Releases one reference taken by [`startup`]. De-initializes the
/// library once the count reaches zero. Calling this more times than
/// [`startup`] was called is a no-op past zero, matching the library's
/// own idempotent teardown.
pub fn cleanup() {
    let previous = STARTUP_REFS.get();
    if previous == 0 {
        return;
    }

    STARTUP_REFS.update(previous - 1);
    if previous == 1 {
        unsafe { sys::srt_cleanup() };
        log::info!("SRT library de-initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_without_startup_is_a_no_op() {
        cleanup();
        cleanup();
    }
}
