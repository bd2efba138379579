//! The connected-socket adapter (C4): construction, the connect handshake,
//! and message-mode send/recv built as try-then-wait loops over the
//! reactor.

use std::ffi::{c_char, c_int, c_void};
use std::mem::size_of;
use std::net::SocketAddr;

use libc::sockaddr;
use os_socketaddr::OsSocketAddr;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{self, ErrorKind};
use crate::options::{Phase, SrtOptions};
use crate::reactor::Reactor;
use crate::stats::{self, Stats};
use crate::sys::{self, SRTSOCKET, SRT_INVALID_SOCK, SRT_SOCKOPT};

/// Invoked exactly once per connect attempt, on the runtime rather than on
/// SRT's internal thread, with the mapped outcome of the attempt.
pub type ConnectCallback = dyn FnOnce(Option<ErrorKind>, SRTSOCKET) + Send + 'static;

struct ConnectCtx {
    tx: oneshot::Sender<Result<(), ErrorKind>>,
    on_complete: Option<Box<ConnectCallback>>,
    handle: Handle,
}

/// A connected SRT socket. Always constructed already bound to a remote
/// peer — there is no half-open state a caller can observe.
pub struct Socket {
    fd: SRTSOCKET,
    opt: SrtOptions,
}

unsafe impl Send for Socket {}
unsafe impl Sync for Socket {}

impl Socket {
    pub(crate) fn new(fd: SRTSOCKET, opt: SrtOptions) -> Self {
        Self { fd, opt }
    }

    /// Connects to a remote endpoint. The socket is forced into
    /// non-blocking mode for both directions regardless of anything the
    /// caller staged in `opt` for `sndsyn`/`rcvsyn` — this core has its
    /// own async waiting and never lets the native library block a
    /// thread on its behalf.
    ///
    /// `deadline` and `cancel` bound how long the connect attempt is
    /// allowed to run; either leaves the underlying socket in the
    /// process of tearing down (the native connect callback, once it
    /// eventually fires, finds a closed socket and simply has nothing
    /// left to report to).
    pub async fn connect(
        addr: SocketAddr,
        mut opt: SrtOptions,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
        on_complete: Option<Box<ConnectCallback>>,
    ) -> Result<Self, ErrorKind> {
        let fd = unsafe { sys::srt_create_socket() };
        if fd == SRT_INVALID_SOCK {
            return Err(error::map_last_error());
        }

        if let Err(err) = Self::prepare(fd, &mut opt) {
            unsafe { sys::srt_close(fd) };
            return Err(err);
        }

        let (tx, rx) = oneshot::channel::<Result<(), ErrorKind>>();
        let ctx = ConnectCtx {
            tx,
            on_complete,
            handle: Handle::current(),
        };
        let opaque = Box::into_raw(Box::new(ctx)) as *mut c_void;

        if unsafe { sys::srt_connect_callback(fd, connect_callback_trampoline, opaque) } != 0 {
            let err = error::map_last_error();
            unsafe {
                // Installing the callback failed, so it will never run for
                // this attempt — this call is still the sole owner of the box.
                drop(Box::from_raw(opaque as *mut ConnectCtx));
                sys::srt_close(fd);
            }
            return Err(err);
        }

        let os_addr: OsSocketAddr = addr.into();
        let ret = unsafe { sys::srt_connect(fd, os_addr.as_ptr() as *const _, os_addr.len() as c_int) };
        if ret == sys::SRT_ERROR && !error::last_error_is_would_block() {
            let err = error::map_last_error();
            unsafe {
                // An "early" failure is reported synchronously, without the
                // callback ever firing for it — still the sole owner here.
                drop(Box::from_raw(opaque as *mut ConnectCtx));
                sys::srt_close(fd);
            }
            return Err(err);
        }

        // Past this point SRT owns `opaque` and will hand it back to
        // `connect_callback_trampoline` exactly once, which reclaims it.
        // Neither remaining exit path below touches it again.
        let deadline_sleep = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancel_fut = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            res = rx => res.unwrap_or(Err(ErrorKind::ConnectionAborted {
                message: Some("connect callback channel closed without a reply".into()),
            })),
            _ = deadline_sleep => Err(ErrorKind::Timeout),
            _ = cancel_fut => Err(ErrorKind::Canceled),
        };

        if let Err(mut err) = outcome {
            if let ErrorKind::ConnectionRefused { reason, .. } = &mut err {
                if reason.is_none() {
                    *reason = Some(error::reject_reason_for(fd));
                }
            }
            unsafe { sys::srt_close(fd) };
            return Err(err);
        }

        opt.apply_phase(fd, Phase::Post)?;
        Self::force_async_mode(fd)?;

        Ok(Self::new(fd, opt))
    }

    fn prepare(fd: SRTSOCKET, opt: &mut SrtOptions) -> Result<(), ErrorKind> {
        Self::force_async_mode(fd)?;
        opt.apply_phase(fd, Phase::PreBind)?;
        opt.apply_phase(fd, Phase::Pre)?;
        Ok(())
    }

    /// Forces `SRTO_SNDSYN`/`SRTO_RCVSYN` off, overriding anything staged
    /// in an `SrtOptions` for those two names. Called once up front and
    /// again right after the phase-`Post` options are applied, since a
    /// user-supplied `sndsyn`/`rcvsyn` value is itself legal at `Post`.
    pub(crate) fn force_async_mode(fd: SRTSOCKET) -> Result<(), ErrorKind> {
        for id in [SRT_SOCKOPT::SRTO_SNDSYN, SRT_SOCKOPT::SRTO_RCVSYN] {
            let flag: i32 = 0;
            let ret =
                unsafe { sys::srt_setsockflag(fd, id, &flag as *const i32 as *const _, size_of::<i32>() as c_int) };
            if ret != 0 {
                return Err(error::map_last_error());
            }
        }
        Ok(())
    }

    /// Receives one message. In live mode a single call never yields more
    /// than one MTU's worth of payload, matching a single `send` on the
    /// peer side.
    pub async fn recv(&self, buf: &mut [u8], deadline: Option<Instant>, cancel: Option<&CancellationToken>) -> Result<usize, ErrorKind> {
        loop {
            let ret = unsafe { sys::srt_recvmsg(self.fd, buf.as_mut_ptr() as *mut c_char, buf.len() as c_int) };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            if !error::last_error_is_would_block() {
                return Err(error::map_last_error());
            }
            Reactor::global().wait_readable(self.fd, deadline, cancel).await?;
        }
    }

    /// Sends one message, chunked to the configured payload size so a
    /// single call always maps onto the number of native sends the
    /// payload requires.
    pub async fn send(&self, mut buf: &[u8], deadline: Option<Instant>, cancel: Option<&CancellationToken>) -> Result<(), ErrorKind> {
        while !buf.is_empty() {
            let chunk = buf.len().min(self.opt.max_pkt_size());
            let sent = self.send_chunk(&buf[..chunk], deadline, cancel).await?;
            buf = &buf[sent..];
        }
        Ok(())
    }

    async fn send_chunk(&self, buf: &[u8], deadline: Option<Instant>, cancel: Option<&CancellationToken>) -> Result<usize, ErrorKind> {
        loop {
            let ret = unsafe { sys::srt_sendmsg(self.fd, buf.as_ptr() as *const c_char, buf.len() as c_int) };
            if ret >= 0 {
                return Ok(ret as usize);
            }
            if !error::last_error_is_would_block() {
                return Err(error::map_last_error());
            }
            Reactor::global().wait_writable(self.fd, deadline, cancel).await?;
        }
    }

    pub fn get_stats(&self) -> Result<Stats, ErrorKind> {
        stats::fetch(self.fd)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        let mut addr = OsSocketAddr::new();
        let mut addr_len = addr.capacity() as c_int;
        if unsafe { sys::srt_getpeername(self.fd, addr.as_mut_ptr() as *mut _, &mut addr_len) } != 0 {
            return None;
        }
        addr.into()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        Reactor::forget_if_running(self.fd);
        if unsafe { sys::srt_close(self.fd) } != 0 {
            log::warn!("failed to close SRT socket {}: {:?}", self.fd, error::map_last_error());
        }
    }
}

extern "C" fn connect_callback_trampoline(
    opaque: *mut c_void,
    sock: SRTSOCKET,
    error_code: c_int,
    _peer: *const sockaddr,
    _token: c_int,
) {
    // Runs on SRT's internal thread. It must only decode the outcome and
    // post it onward — never touch reactor state directly.
    let ctx = unsafe { Box::from_raw(opaque as *mut ConnectCtx) };
    let ConnectCtx { tx, on_complete, handle } = *ctx;

    let result = if error_code == 0 { Ok(()) } else { Err(error::map_last_error()) };
    let for_user = result.clone();
    let _ = tx.send(result);

    if let Some(on_complete) = on_complete {
        handle.spawn(async move {
            on_complete(for_user.err(), sock);
        });
    }
}
