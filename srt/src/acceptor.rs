//! The listening-socket adapter (C5): binds, optionally gates incoming
//! connections with a synchronous listen hook, and hands off accepted
//! peers as [`Socket`]s.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::net::SocketAddr;

use libc::sockaddr;
use os_socketaddr::OsSocketAddr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{self, ErrorKind};
use crate::options::{Phase, SrtOptions};
use crate::reactor::Reactor;
use crate::socket::Socket;
use crate::stats::{self, Stats};
use crate::sys::{self, SRTSOCKET, SRT_INVALID_SOCK};

/// Decides whether to accept an incoming connection. Called synchronously
/// from SRT's internal handshake thread, before the client handle is
/// visible to `accept` — it must not block or touch anything that itself
/// waits on the reactor. Given the client handle itself (so it can set
/// per-connection options that must take effect before the client becomes
/// Connected), the handshake version, the peer address, and the stream ID
/// if one was sent.
pub type ListenHook = dyn Fn(SRTSOCKET, c_int, SocketAddr, Option<&str>) -> bool + Send + Sync;

/// A bound, listening SRT socket.
pub struct Acceptor {
    fd: SRTSOCKET,
    opt: SrtOptions,
    hook: Option<*mut Box<ListenHook>>,
}

unsafe impl Send for Acceptor {}
unsafe impl Sync for Acceptor {}

impl Acceptor {
    /// Binds and starts listening. `backlog` bounds how many fully
    /// established-but-unaccepted connections may queue before the
    /// library itself starts refusing new ones.
    pub async fn bind(addr: SocketAddr, mut opt: SrtOptions, backlog: i32) -> Result<Self, ErrorKind> {
        let fd = unsafe { sys::srt_create_socket() };
        if fd == SRT_INVALID_SOCK {
            return Err(error::map_last_error());
        }

        if let Err(err) = Self::prepare(fd, &mut opt, addr, backlog) {
            unsafe { sys::srt_close(fd) };
            return Err(err);
        }

        Ok(Self { fd, opt, hook: None })
    }

    fn prepare(fd: SRTSOCKET, opt: &mut SrtOptions, addr: SocketAddr, backlog: i32) -> Result<(), ErrorKind> {
        Socket::force_async_mode(fd)?;
        opt.apply_phase(fd, Phase::PreBind)?;

        let os_addr: OsSocketAddr = addr.into();
        if unsafe { sys::srt_bind(fd, os_addr.as_ptr() as *const _, os_addr.len() as c_int) } == sys::SRT_ERROR {
            return Err(error::map_last_error());
        }

        opt.apply_phase(fd, Phase::Pre)?;

        if unsafe { sys::srt_listen(fd, backlog as c_int) } == sys::SRT_ERROR {
            return Err(error::map_last_error());
        }

        opt.apply_phase(fd, Phase::Post)?;
        // A user-supplied Post-phase sndsyn/rcvsyn would otherwise stick;
        // re-assert non-blocking the same way `Socket::connect` does after
        // its own Post-phase apply.
        Socket::force_async_mode(fd)?;
        Ok(())
    }

    /// Installs a hook deciding whether to accept each incoming
    /// connection before the handshake completes. Replacing a
    /// previously-installed hook drops the old one once the native call
    /// confirms the new one took effect.
    pub fn set_listener_hook<F>(&mut self, hook: F) -> Result<(), ErrorKind>
    where
        F: Fn(SRTSOCKET, c_int, SocketAddr, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let boxed: Box<Box<ListenHook>> = Box::new(Box::new(hook));
        let ptr = Box::into_raw(boxed);

        if unsafe { sys::srt_listen_callback(self.fd, listen_callback_trampoline, ptr as *mut c_void) } != 0 {
            let err = error::map_last_error();
            unsafe { drop(Box::from_raw(ptr)) };
            return Err(err);
        }

        if let Some(previous) = self.hook.replace(ptr) {
            unsafe { drop(Box::from_raw(previous)) };
        }

        Ok(())
    }

    /// Accepts the next connection, waiting on the reactor until the
    /// listening socket reports itself readable.
    pub async fn accept(&self, deadline: Option<Instant>, cancel: Option<&CancellationToken>) -> Result<(Socket, SocketAddr), ErrorKind> {
        loop {
            let mut raw_addr = OsSocketAddr::new();
            let mut addr_len = raw_addr.capacity() as c_int;
            let fd = unsafe { sys::srt_accept(self.fd, raw_addr.as_mut_ptr() as *mut _, &mut addr_len) };

            if fd != SRT_INVALID_SOCK {
                let peer = raw_addr.into().ok_or_else(|| {
                    ErrorKind::InvalidArgument {
                        message: "accepted socket reported no peer address".into(),
                    }
                })?;

                // The listener's own sndsyn/rcvsyn don't reliably carry over
                // to an accepted socket; force it the same way a freshly
                // connected one is forced, so send/recv on it never blocks
                // this task's executor thread.
                Socket::force_async_mode(fd)?;
                return Ok((Socket::new(fd, self.opt.clone()), peer));
            }

            if !error::last_error_is_would_block() {
                return Err(error::map_last_error());
            }

            Reactor::global().wait_readable(self.fd, deadline, cancel).await?;
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        let mut addr = OsSocketAddr::new();
        let mut addr_len = addr.capacity() as c_int;
        if unsafe { sys::srt_getsockname(self.fd, addr.as_mut_ptr() as *mut _, &mut addr_len) } != 0 {
            return None;
        }
        addr.into()
    }

    pub fn get_stats(&self) -> Result<Stats, ErrorKind> {
        stats::fetch(self.fd)
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        Reactor::forget_if_running(self.fd);
        if let Some(ptr) = self.hook.take() {
            unsafe { drop(Box::from_raw(ptr)) };
        }
        if unsafe { sys::srt_close(self.fd) } != 0 {
            log::warn!("failed to close SRT listener {}: {:?}", self.fd, error::map_last_error());
        }
    }
}

extern "C" fn listen_callback_trampoline(
    opaque: *mut c_void,
    sock: SRTSOCKET,
    hs_version: c_int,
    peer: *const sockaddr,
    stream_id: *const c_char,
) -> c_int {
    let hook = unsafe { &*(opaque as *const Box<ListenHook>) };

    let addr: Option<SocketAddr> = unsafe { OsSocketAddr::copy_from_raw(peer, std::mem::size_of::<sockaddr>() as u32) }.into();
    let Some(addr) = addr else {
        return -1;
    };

    let stream_id = if stream_id.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(stream_id) }.to_str().ok()
    };

    if hook(sock, hs_version, addr, stream_id) {
        0
    } else {
        -1
    }
}
