//! Maps native SRT error codes onto the adapter's own error taxonomy.
//!
//! The native error is always fetched on the thread that observed the
//! failing call — SRT stores it per-thread, so reading it from anywhere
//! else races with whatever that thread does next.

use std::ffi::CStr;

use thiserror::Error;

use crate::sys::{self, SRT_ERRNO, SRT_REJECT_REASON};

/// Why a connection attempt was turned down by the peer or the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unknown,
    System,
    Peer,
    Resource,
    Rogue,
    Backlog,
    InternalError,
    Close,
    Version,
    RendezvousCookie,
    BadSecret,
    Unsecure,
    MessageApi,
    Congestion,
    Filter,
    Group,
    Timeout,
}

impl From<SRT_REJECT_REASON> for RejectReason {
    fn from(reason: SRT_REJECT_REASON) -> Self {
        use SRT_REJECT_REASON::*;
        match reason {
            SRT_REJ_UNKNOWN => Self::Unknown,
            SRT_REJ_SYSTEM => Self::System,
            SRT_REJ_PEER => Self::Peer,
            SRT_REJ_RESOURCE => Self::Resource,
            SRT_REJ_ROGUE => Self::Rogue,
            SRT_REJ_BACKLOG => Self::Backlog,
            SRT_REJ_IPE => Self::InternalError,
            SRT_REJ_CLOSE => Self::Close,
            SRT_REJ_VERSION => Self::Version,
            SRT_REJ_RDVCOOKIE => Self::RendezvousCookie,
            SRT_REJ_BADSECRET => Self::BadSecret,
            SRT_REJ_UNSECURE => Self::Unsecure,
            SRT_REJ_MESSAGEAPI => Self::MessageApi,
            SRT_REJ_CONGESTION => Self::Congestion,
            SRT_REJ_FILTER => Self::Filter,
            SRT_REJ_GROUP => Self::Group,
            SRT_REJ_TIMEOUT => Self::Timeout,
        }
    }
}

/// Stable error taxonomy surfaced to callers of this crate. Variants carry
/// the library's human-readable reason where one is available, so callers
/// don't need to string-match to decide what happened.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error("operation timed out")]
    Timeout,

    #[error("operation canceled")]
    Canceled,

    #[error("connection refused: reason={reason:?} message={message:?}")]
    ConnectionRefused {
        reason: Option<RejectReason>,
        message: Option<String>,
    },

    #[error("connection reset: {message:?}")]
    ConnectionReset { message: Option<String> },

    #[error("connection aborted: {message:?}")]
    ConnectionAborted { message: Option<String> },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("invalid socket: {message:?}")]
    InvalidSocket { message: Option<String> },

    #[error("resource exhausted: {message:?}")]
    ResourceExhausted { message: Option<String> },

    #[error("epoll operation failed: {message:?}")]
    EpollFailure { message: Option<String> },

    #[error("SRT error {code}: {message:?}")]
    IoError { code: i32, message: Option<String> },
}

impl ErrorKind {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Reads `srt_getlasterror`/`srt_getlasterror_str` on the calling thread
/// and maps the result per the policy in the SRT-adapter spec's error
/// mapping section. Never returns a variant representing "would block" —
/// that case is recovered internally by the try-then-wait loops and must
/// never reach this function.
pub fn map_last_error() -> ErrorKind {
    let mut sys_errno = 0;
    let code = unsafe { sys::srt_getlasterror(&mut sys_errno) };
    let message = last_error_message();

    match code_to_errno(code) {
        SRT_ERRNO::SRT_ECONNREJ => ErrorKind::ConnectionRefused {
            // The precise reason requires the socket handle and is filled
            // in by the caller via `reject_reason_for` when one is known
            // (see `Socket::connect`); a bare `map_last_error()` call site
            // has no handle to ask.
            reason: None,
            message,
        },
        SRT_ERRNO::SRT_ECONNSETUP
        | SRT_ERRNO::SRT_ENOSERVER
        | SRT_ERRNO::SRT_ESECFAIL
        | SRT_ERRNO::SRT_ERDVNOSERV
        | SRT_ERRNO::SRT_ERDVUNBOUND => ErrorKind::ConnectionRefused {
            reason: None,
            message,
        },
        SRT_ERRNO::SRT_ECONNLOST | SRT_ERRNO::SRT_ECONGEST | SRT_ERRNO::SRT_EPEERERR => {
            ErrorKind::ConnectionReset { message }
        }
        SRT_ERRNO::SRT_ENOCONN | SRT_ERRNO::SRT_ESCLOSED | SRT_ERRNO::SRT_ECONNFAIL => {
            ErrorKind::ConnectionAborted { message }
        }
        SRT_ERRNO::SRT_EINVSOCK | SRT_ERRNO::SRT_EUNBOUNDSOCK | SRT_ERRNO::SRT_EBOUNDSOCK => {
            ErrorKind::InvalidSocket { message }
        }
        SRT_ERRNO::SRT_ERESOURCE | SRT_ERRNO::SRT_ETHREAD | SRT_ERRNO::SRT_ENOBUF | SRT_ERRNO::SRT_ESYSOBJ => {
            ErrorKind::ResourceExhausted { message }
        }
        SRT_ERRNO::SRT_EINVPOLLID | SRT_ERRNO::SRT_EPOLLEMPTY => ErrorKind::EpollFailure { message },
        SRT_ERRNO::SRT_ETIMEOUT => ErrorKind::Timeout,
        SRT_ERRNO::SRT_EINVPARAM
        | SRT_ERRNO::SRT_EINVOP
        | SRT_ERRNO::SRT_ECONNSOCK
        | SRT_ERRNO::SRT_EINVALMSGAPI
        | SRT_ERRNO::SRT_EINVALBUFFERAPI
        | SRT_ERRNO::SRT_ELARGEMSG
        | SRT_ERRNO::SRT_EDUPLISTEN
        | SRT_ERRNO::SRT_ENOLISTEN => ErrorKind::InvalidArgument {
            message: message.unwrap_or_else(|| "invalid argument".into()),
        },
        _ => ErrorKind::IoError { code, message },
    }
}

/// `true` when the last observed native error is SRT's would-block
/// indicator. The reactor and the try-then-wait loops check this instead
/// of mapping the error, because `WouldBlock` is never allowed to surface
/// to a caller.
pub fn last_error_is_would_block() -> bool {
    let mut sys_errno = 0;
    let code = unsafe { sys::srt_getlasterror(&mut sys_errno) };
    matches!(
        code_to_errno(code),
        SRT_ERRNO::SRT_EASYNCFAIL | SRT_ERRNO::SRT_EASYNCSND | SRT_ERRNO::SRT_EASYNCRCV
    )
}

fn code_to_errno(code: i32) -> SRT_ERRNO {
    match code {
        0 => SRT_ERRNO::SRT_SUCCESS,
        1000 => SRT_ERRNO::SRT_ECONNSETUP,
        1001 => SRT_ERRNO::SRT_ENOSERVER,
        1002 => SRT_ERRNO::SRT_ECONNREJ,
        1003 => SRT_ERRNO::SRT_ESOCKFAIL,
        1004 => SRT_ERRNO::SRT_ESECFAIL,
        1005 => SRT_ERRNO::SRT_ESCLOSED,
        2000 => SRT_ERRNO::SRT_ECONNFAIL,
        2001 => SRT_ERRNO::SRT_ECONNLOST,
        2002 => SRT_ERRNO::SRT_ENOCONN,
        3000 => SRT_ERRNO::SRT_ERESOURCE,
        3001 => SRT_ERRNO::SRT_ETHREAD,
        3002 => SRT_ERRNO::SRT_ENOBUF,
        3003 => SRT_ERRNO::SRT_ESYSOBJ,
        4000 => SRT_ERRNO::SRT_EFILE,
        4001 => SRT_ERRNO::SRT_EINVRDOFF,
        4002 => SRT_ERRNO::SRT_ERDPERM,
        4003 => SRT_ERRNO::SRT_EINVWROFF,
        4004 => SRT_ERRNO::SRT_EWRPERM,
        5000 => SRT_ERRNO::SRT_EINVOP,
        5001 => SRT_ERRNO::SRT_EBOUNDSOCK,
        5002 => SRT_ERRNO::SRT_ECONNSOCK,
        5003 => SRT_ERRNO::SRT_EINVPARAM,
        5004 => SRT_ERRNO::SRT_EINVSOCK,
        5005 => SRT_ERRNO::SRT_EUNBOUNDSOCK,
        5006 => SRT_ERRNO::SRT_ENOLISTEN,
        5007 => SRT_ERRNO::SRT_ERDVNOSERV,
        5008 => SRT_ERRNO::SRT_ERDVUNBOUND,
        5009 => SRT_ERRNO::SRT_EINVALMSGAPI,
        5010 => SRT_ERRNO::SRT_EINVALBUFFERAPI,
        5011 => SRT_ERRNO::SRT_EDUPLISTEN,
        5012 => SRT_ERRNO::SRT_ELARGEMSG,
        5013 => SRT_ERRNO::SRT_EINVPOLLID,
        5014 => SRT_ERRNO::SRT_EPOLLEMPTY,
        5015 => SRT_ERRNO::SRT_EBINDCONFLICT,
        6000 => SRT_ERRNO::SRT_EASYNCFAIL,
        6001 => SRT_ERRNO::SRT_EASYNCSND,
        6002 => SRT_ERRNO::SRT_EASYNCRCV,
        6003 => SRT_ERRNO::SRT_ETIMEOUT,
        6004 => SRT_ERRNO::SRT_ECONGEST,
        7000 => SRT_ERRNO::SRT_EPEERERR,
        _ => SRT_ERRNO::SRT_EUNKNOWN,
    }
}

fn last_error_message() -> Option<String> {
    unsafe { CStr::from_ptr(sys::srt_getlasterror_str()) }
        .to_str()
        .ok()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Called by [`crate::socket::Socket::connect`] on the specific handle
/// once a late connect failure is known, to attach the precise rejection
/// reason rather than the generic one `map_last_error` would produce.
pub fn reject_reason_for(handle: sys::SRTSOCKET) -> RejectReason {
    let code = unsafe { sys::srt_getrejectreason(handle) };
    RejectReason::from(code_to_reject_reason(code))
}

fn code_to_reject_reason(code: i32) -> SRT_REJECT_REASON {
    use SRT_REJECT_REASON::*;
    match code {
        1 => SRT_REJ_SYSTEM,
        2 => SRT_REJ_PEER,
        3 => SRT_REJ_RESOURCE,
        4 => SRT_REJ_ROGUE,
        5 => SRT_REJ_BACKLOG,
        6 => SRT_REJ_IPE,
        7 => SRT_REJ_CLOSE,
        8 => SRT_REJ_VERSION,
        9 => SRT_REJ_RDVCOOKIE,
        10 => SRT_REJ_BADSECRET,
        11 => SRT_REJ_UNSECURE,
        12 => SRT_REJ_MESSAGEAPI,
        13 => SRT_REJ_CONGESTION,
        14 => SRT_REJ_FILTER,
        15 => SRT_REJ_GROUP,
        16 => SRT_REJ_TIMEOUT,
        _ => SRT_REJ_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_from_native_round_trips() {
        assert_eq!(RejectReason::from(SRT_REJECT_REASON::SRT_REJ_PEER), RejectReason::Peer);
        assert_eq!(RejectReason::from(SRT_REJECT_REASON::SRT_REJ_TIMEOUT), RejectReason::Timeout);
    }

    #[test]
    fn code_to_errno_maps_known_ranges() {
        assert_eq!(code_to_errno(2001), SRT_ERRNO::SRT_ECONNLOST);
        assert_eq!(code_to_errno(6003), SRT_ERRNO::SRT_ETIMEOUT);
        assert_eq!(code_to_errno(999999), SRT_ERRNO::SRT_EUNKNOWN);
    }
}
