//! Raw FFI surface for the SRT C library.
//!
//! Every declaration here mirrors the signature published by the SRT
//! project's public header (`srt.h`). Nothing in this module allocates,
//! retries, or interprets return codes — that belongs to [`crate::error`]
//! and the adapters built on top. Keeping the FFI layer this thin makes it
//! possible to audit the `unsafe` boundary in one place.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

use libc::sockaddr;

pub type SRTSOCKET = i32;
pub const SRT_INVALID_SOCK: SRTSOCKET = -1;
pub const SRT_ERROR: c_int = -1;

/// Epoll readiness bits, as defined by `SRT_EPOLL_OPT` in `srt.h`.
pub const SRT_EPOLL_IN: c_int = 0x1;
pub const SRT_EPOLL_OUT: c_int = 0x4;
pub const SRT_EPOLL_ERR: c_int = 0x8;
pub const SRT_EPOLL_UPDATE: c_int = 0x10;

/// One (socket, event mask) pair as reported by [`srt_epoll_uwait`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SRT_EPOLL_EVENT {
    pub fd: SRTSOCKET,
    pub events: c_int,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_SOCKSTATUS {
    SRTS_INIT = 1,
    SRTS_OPENED = 2,
    SRTS_LISTENING = 3,
    SRTS_CONNECTING = 4,
    SRTS_CONNECTED = 5,
    SRTS_BROKEN = 6,
    SRTS_CLOSING = 7,
    SRTS_CLOSED = 8,
    SRTS_NONEXIST = 9,
}

#[repr(C)]
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_TRANSTYPE {
    SRTT_LIVE,
    SRTT_FILE,
    SRTT_INVALID,
}

#[repr(C)]
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_SOCKOPT {
    SRTO_MSS = 0,
    SRTO_SNDSYN = 1,
    SRTO_RCVSYN = 2,
    SRTO_ISN = 3,
    SRTO_FC = 4,
    SRTO_SNDBUF = 5,
    SRTO_RCVBUF = 6,
    SRTO_LINGER = 7,
    SRTO_UDP_SNDBUF = 8,
    SRTO_UDP_RCVBUF = 9,
    SRTO_RENDEZVOUS = 12,
    SRTO_SNDTIMEO = 13,
    SRTO_RCVTIMEO = 14,
    SRTO_REUSEADDR = 15,
    SRTO_MAXBW = 16,
    SRTO_STATE = 17,
    SRTO_EVENT = 18,
    SRTO_SNDDATA = 19,
    SRTO_RCVDATA = 20,
    SRTO_SENDER = 21,
    SRTO_TSBPDMODE = 22,
    SRTO_LATENCY = 23,
    SRTO_INPUTBW = 24,
    SRTO_OHEADBW,
    SRTO_PASSPHRASE = 26,
    SRTO_PBKEYLEN,
    SRTO_KMSTATE,
    SRTO_IPTTL = 29,
    SRTO_IPTOS,
    SRTO_TLPKTDROP = 31,
    SRTO_SNDDROPDELAY = 32,
    SRTO_NAKREPORT = 33,
    SRTO_VERSION = 34,
    SRTO_PEERVERSION,
    SRTO_CONNTIMEO = 36,
    SRTO_DRIFTTRACER = 37,
    SRTO_MININPUTBW = 38,
    SRTO_SNDKMSTATE = 40,
    SRTO_RCVKMSTATE,
    SRTO_LOSSMAXTTL,
    SRTO_RCVLATENCY,
    SRTO_PEERLATENCY,
    SRTO_MINVERSION,
    SRTO_STREAMID,
    SRTO_CONGESTION,
    SRTO_MESSAGEAPI,
    SRTO_PAYLOADSIZE,
    SRTO_TRANSTYPE = 50,
    SRTO_KMREFRESHRATE,
    SRTO_KMPREANNOUNCE,
    SRTO_ENFORCEDENCRYPTION,
    SRTO_IPV6ONLY,
    SRTO_PEERIDLETIMEO,
    SRTO_BINDTODEVICE,
    SRTO_GROUPCONNECT,
    SRTO_GROUPMINSTABLETIMEO,
    SRTO_GROUPTYPE,
    SRTO_PACKETFILTER = 60,
    SRTO_RETRANSMITALGO = 61,
    SRTO_E_SIZE,
}

/// Native SRT error codes, as returned by [`srt_getlasterror`].
#[repr(i32)]
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_ERRNO {
    SRT_EUNKNOWN = -1,
    SRT_SUCCESS = 0,
    SRT_ECONNSETUP = 1000,
    SRT_ENOSERVER = 1001,
    SRT_ECONNREJ = 1002,
    SRT_ESOCKFAIL = 1003,
    SRT_ESECFAIL = 1004,
    SRT_ESCLOSED = 1005,
    SRT_ECONNFAIL = 2000,
    SRT_ECONNLOST = 2001,
    SRT_ENOCONN = 2002,
    SRT_ERESOURCE = 3000,
    SRT_ETHREAD = 3001,
    SRT_ENOBUF = 3002,
    SRT_ESYSOBJ = 3003,
    SRT_EFILE = 4000,
    SRT_EINVRDOFF = 4001,
    SRT_ERDPERM = 4002,
    SRT_EINVWROFF = 4003,
    SRT_EWRPERM = 4004,
    SRT_EINVOP = 5000,
    SRT_EBOUNDSOCK = 5001,
    SRT_ECONNSOCK = 5002,
    SRT_EINVPARAM = 5003,
    SRT_EINVSOCK = 5004,
    SRT_EUNBOUNDSOCK = 5005,
    SRT_ENOLISTEN = 5006,
    SRT_ERDVNOSERV = 5007,
    SRT_ERDVUNBOUND = 5008,
    SRT_EINVALMSGAPI = 5009,
    SRT_EINVALBUFFERAPI = 5010,
    SRT_EDUPLISTEN = 5011,
    SRT_ELARGEMSG = 5012,
    SRT_EINVPOLLID = 5013,
    SRT_EPOLLEMPTY = 5014,
    SRT_EBINDCONFLICT = 5015,
    SRT_EASYNCFAIL = 6000,
    SRT_EASYNCSND = 6001,
    SRT_EASYNCRCV = 6002,
    SRT_ETIMEOUT = 6003,
    SRT_ECONGEST = 6004,
    SRT_EPEERERR = 7000,
}

/// Reason a connection attempt was rejected, as returned by
/// [`srt_getrejectreason`].
#[repr(i32)]
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SRT_REJECT_REASON {
    SRT_REJ_UNKNOWN = 0,
    SRT_REJ_SYSTEM = 1,
    SRT_REJ_PEER = 2,
    SRT_REJ_RESOURCE = 3,
    SRT_REJ_ROGUE = 4,
    SRT_REJ_BACKLOG = 5,
    SRT_REJ_IPE = 6,
    SRT_REJ_CLOSE = 7,
    SRT_REJ_VERSION = 8,
    SRT_REJ_RDVCOOKIE = 9,
    SRT_REJ_BADSECRET = 10,
    SRT_REJ_UNSECURE = 11,
    SRT_REJ_MESSAGEAPI = 12,
    SRT_REJ_CONGESTION = 13,
    SRT_REJ_FILTER = 14,
    SRT_REJ_GROUP = 15,
    SRT_REJ_TIMEOUT = 16,
}

/// Mirrors `SRT_TRACEBSTATS` field-for-field and in declaration order, so
/// that a `srt_bstats`/`srt_bistats` call writing the real (much larger)
/// native struct can never write past the end of this one. [`crate::stats`]
/// only ever reads the handful of fields this core's callers have a use
/// for — congestion, filtering, and bonding counters are carried here
/// purely to keep the layout faithful to the native struct, not because
/// anything in this crate inspects them.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SRT_TRACEBSTATS {
    // global measurements
    pub msTimeStamp: i64,
    pub pktSentTotal: i64,
    pub pktRecvTotal: i64,
    pub pktSndLossTotal: i32,
    pub pktRcvLossTotal: i32,
    pub pktRetransTotal: i32,
    pub pktSentACKTotal: i32,
    pub pktRecvACKTotal: i32,
    pub pktSentNAKTotal: i32,
    pub pktRecvNAKTotal: i32,
    pub usSndDurationTotal: i64,
    pub pktSndDropTotal: i32,
    pub pktRcvDropTotal: i32,
    pub pktRcvUndecryptTotal: i32,
    pub byteSentTotal: u64,
    pub byteRecvTotal: u64,
    pub byteRcvLossTotal: u64,
    pub byteRetransTotal: u64,
    pub byteSndDropTotal: u64,
    pub byteRcvDropTotal: u64,
    pub byteRcvUndecryptTotal: u64,

    // local measurements
    pub pktSent: i64,
    pub pktRecv: i64,
    pub pktSndLoss: i32,
    pub pktRcvLoss: i32,
    pub pktRetrans: i32,
    pub pktRcvRetrans: i32,
    pub pktSentACK: i32,
    pub pktRecvACK: i32,
    pub pktSentNAK: i32,
    pub pktRecvNAK: i32,
    pub mbpsSendRate: f64,
    pub mbpsRecvRate: f64,
    pub usSndDuration: i64,
    pub pktReorderDistance: i32,
    pub pktRcvAvgBelatedTime: f64,
    pub pktRcvBelated: i64,
    pub pktSndDrop: i32,
    pub pktRcvDrop: i32,
    pub pktRcvUndecrypt: i32,
    pub byteSent: u64,
    pub byteRecv: u64,
    pub byteRcvLoss: u64,
    pub byteRetrans: u64,
    pub byteSndDrop: u64,
    pub byteRcvDrop: u64,
    pub byteRcvUndecrypt: u64,

    // instant measurements
    pub usPktSndPeriod: f64,
    pub pktFlowWindow: i32,
    pub pktCongestionWindow: i32,
    pub pktFlightSize: i32,
    pub msRTT: f64,
    pub mbpsBandwidth: f64,
    pub byteAvailSndBuf: i32,
    pub byteAvailRcvBuf: i32,
    pub mbpsMaxBW: f64,
    pub byteMSS: i32,
    pub pktSndBuf: i32,
    pub byteSndBuf: i32,
    pub msSndBuf: i32,
    pub msSndTsbPdDelay: i32,
    pub pktRcvBuf: i32,
    pub byteRcvBuf: i32,
    pub msRcvBuf: i32,
    pub msRcvTsbPdDelay: i32,
    pub pktSndFilterExtraTotal: i32,
    pub pktRcvFilterExtraTotal: i32,
    pub pktRcvFilterSupplyTotal: i32,
    pub pktRcvFilterLossTotal: i32,
    pub pktSndFilterExtra: i32,
    pub pktRcvFilterExtra: i32,
    pub pktRcvFilterSupply: i32,
    pub pktRcvFilterLoss: i32,
    pub pktReorderTolerance: i32,

    // fields added across 1.4.x/1.5.x point releases; reserved so a
    // native library built against a slightly newer header than this
    // declaration still never writes past the end of this struct.
    pub _reserved: [u8; 256],
}

// `[u8; 256]` is past the array length std derives `Default` for, so the
// whole-struct derive doesn't apply here; every field is a plain numeric
// type or a byte array, so the all-zero bit pattern is always valid.
impl Default for SRT_TRACEBSTATS {
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

pub type ConnectCallbackFn =
    extern "C" fn(opaque: *mut c_void, sock: SRTSOCKET, error: c_int, peer: *const sockaddr, token: c_int);

pub type ListenCallbackFn = extern "C" fn(
    opaque: *mut c_void,
    sock: SRTSOCKET,
    hs_version: c_int,
    peer: *const sockaddr,
    stream_id: *const c_char,
) -> c_int;

extern "C" {
    /// Initializes the SRT library. Reference-counted internally by the
    /// library itself; safe to call more than once.
    pub fn srt_startup() -> c_int;

    /// Tears down all global SRT resources. Must be called once per
    /// matching [`srt_startup`] call.
    pub fn srt_cleanup() -> c_int;

    pub fn srt_create_socket() -> SRTSOCKET;

    pub fn srt_bind(s: SRTSOCKET, name: *const sockaddr, name_len: c_int) -> c_int;

    pub fn srt_close(s: SRTSOCKET) -> c_int;

    pub fn srt_listen(s: SRTSOCKET, backlog: c_int) -> c_int;

    pub fn srt_listen_callback(s: SRTSOCKET, hook_fn: ListenCallbackFn, hook_opaque: *mut c_void) -> c_int;

    pub fn srt_connect_callback(s: SRTSOCKET, hook_fn: ConnectCallbackFn, hook_opaque: *mut c_void) -> c_int;

    pub fn srt_connect(s: SRTSOCKET, name: *const sockaddr, name_len: c_int) -> c_int;

    pub fn srt_accept(s: SRTSOCKET, addr: *mut sockaddr, addr_len: *mut c_int) -> SRTSOCKET;

    /// Identical to [`srt_recv`]; the two names are kept for historical
    /// reasons (stream-mode callers used `recv`, message-mode callers used
    /// `recvmsg` in the UDT predecessor). This adapter always operates in
    /// message mode, so every call site uses this name.
    pub fn srt_recvmsg(s: SRTSOCKET, buf: *mut c_char, len: c_int) -> c_int;

    /// Identical to [`srt_send`]; see [`srt_recvmsg`].
    pub fn srt_sendmsg(s: SRTSOCKET, buf: *const c_char, len: c_int) -> c_int;

    pub fn srt_getsockflag(s: SRTSOCKET, opt: SRT_SOCKOPT, optval: *mut c_void, optlen: *mut c_int) -> c_int;

    pub fn srt_setsockflag(s: SRTSOCKET, opt: SRT_SOCKOPT, optval: *const c_void, optlen: c_int) -> c_int;

    pub fn srt_getsockname(s: SRTSOCKET, addr: *mut sockaddr, addr_len: *mut c_int) -> c_int;

    pub fn srt_getpeername(s: SRTSOCKET, addr: *mut sockaddr, addr_len: *mut c_int) -> c_int;

    pub fn srt_getsockstate(s: SRTSOCKET) -> SRT_SOCKSTATUS;

    pub fn srt_bstats(s: SRTSOCKET, perf: *mut SRT_TRACEBSTATS, clear: c_int) -> c_int;

    /// Fetches the last error observed on the calling thread. SRT stores
    /// this per-thread, so it must be read on the thread that just
    /// observed a failing call, before doing anything else.
    pub fn srt_getlasterror(errno_loc: *mut c_int) -> c_int;

    pub fn srt_getlasterror_str() -> *const c_char;

    pub fn srt_getrejectreason(s: SRTSOCKET) -> c_int;

    // --- epoll group: the reactor's only window into socket readiness ---

    pub fn srt_epoll_create() -> c_int;

    pub fn srt_epoll_add_usock(eid: c_int, u: SRTSOCKET, events: *const c_int) -> c_int;

    pub fn srt_epoll_update_usock(eid: c_int, u: SRTSOCKET, events: *const c_int) -> c_int;

    pub fn srt_epoll_remove_usock(eid: c_int, u: SRTSOCKET) -> c_int;

    /// The `uwait` variant is the only one that reports the per-socket
    /// event mask including the error bit; the plain `srt_epoll_wait`
    /// variant splits readable/writable sockets into separate arrays and
    /// loses which ones also errored.
    pub fn srt_epoll_uwait(eid: c_int, fdset: *mut SRT_EPOLL_EVENT, fdsize: c_int, ms_timeout: i64) -> c_int;

    pub fn srt_epoll_release(eid: c_int) -> c_int;
}
