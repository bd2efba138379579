//! The option registry (C1): a static table mapping recognized SRT option
//! names to their native option id, value type, and the socket lifecycle
//! phase at which they may legally be applied.
//!
//! Centralizing this metadata means a phase violation is recoverable —
//! [`SrtOptions`] defers anything that arrived too early until the
//! adapter reaches the right phase — and keeps string parsing out of the
//! hot send/recv path.

use std::ffi::c_int;
use std::mem::size_of;

use crate::error::ErrorKind;
use crate::sys::{self, SRTSOCKET, SRT_SOCKOPT, SRT_TRANSTYPE};

/// The moment in a socket's lifecycle at which an option may be applied.
/// Ordered: an option legal at `PreBind` is legal nowhere else; one legal
/// at `Pre` may also be set at `PreBind`; one legal at `Post` may be set
/// at any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    PreBind,
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int32,
    Bool,
    Int64,
    Str,
    TransType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransType {
    Live,
    File,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int32(i32),
    Bool(bool),
    Int64(i64),
    Str(String),
    TransType(TransType),
}

impl TypedValue {
    fn value_type(&self) -> ValueType {
        match self {
            Self::Int32(_) => ValueType::Int32,
            Self::Bool(_) => ValueType::Bool,
            Self::Int64(_) => ValueType::Int64,
            Self::Str(_) => ValueType::Str,
            Self::TransType(_) => ValueType::TransType,
        }
    }
}

/// Metadata for one recognized SRT option. Instances live only in the
/// static [`OPTIONS`] table.
#[derive(Debug, Clone, Copy)]
pub struct SrtOption {
    pub name: &'static str,
    pub id: SRT_SOCKOPT,
    pub value_type: ValueType,
    pub phase: Phase,
}

macro_rules! opt {
    ($name:literal, $id:expr, $ty:expr, $phase:expr) => {
        SrtOption {
            name: $name,
            id: $id,
            value_type: $ty,
            phase: $phase,
        }
    };
}

/// Every option this adapter knows how to apply. Not exhaustive against
/// SRT's full option surface — only the subset this core requires.
pub static OPTIONS: &[SrtOption] = &[
    opt!("payloadsize", SRT_SOCKOPT::SRTO_PAYLOADSIZE, ValueType::Int32, Phase::Pre),
    opt!("messageapi", SRT_SOCKOPT::SRTO_MESSAGEAPI, ValueType::Bool, Phase::PreBind),
    opt!("latency", SRT_SOCKOPT::SRTO_LATENCY, ValueType::Int32, Phase::Pre),
    opt!("rcvlatency", SRT_SOCKOPT::SRTO_RCVLATENCY, ValueType::Int32, Phase::Pre),
    opt!("peerlatency", SRT_SOCKOPT::SRTO_PEERLATENCY, ValueType::Int32, Phase::Pre),
    opt!("sndbuf", SRT_SOCKOPT::SRTO_SNDBUF, ValueType::Int32, Phase::Pre),
    opt!("rcvbuf", SRT_SOCKOPT::SRTO_RCVBUF, ValueType::Int32, Phase::Pre),
    opt!("udp_sndbuf", SRT_SOCKOPT::SRTO_UDP_SNDBUF, ValueType::Int32, Phase::PreBind),
    opt!("udp_rcvbuf", SRT_SOCKOPT::SRTO_UDP_RCVBUF, ValueType::Int32, Phase::PreBind),
    opt!("conntimeo", SRT_SOCKOPT::SRTO_CONNTIMEO, ValueType::Int32, Phase::Pre),
    opt!("peeridletimeo", SRT_SOCKOPT::SRTO_PEERIDLETIMEO, ValueType::Int32, Phase::Pre),
    opt!("mss", SRT_SOCKOPT::SRTO_MSS, ValueType::Int32, Phase::PreBind),
    opt!("fc", SRT_SOCKOPT::SRTO_FC, ValueType::Int32, Phase::Pre),
    opt!("streamid", SRT_SOCKOPT::SRTO_STREAMID, ValueType::Str, Phase::Pre),
    opt!("passphrase", SRT_SOCKOPT::SRTO_PASSPHRASE, ValueType::Str, Phase::Pre),
    opt!("pbkeylen", SRT_SOCKOPT::SRTO_PBKEYLEN, ValueType::Int32, Phase::Pre),
    opt!("inputbw", SRT_SOCKOPT::SRTO_INPUTBW, ValueType::Int64, Phase::Post),
    opt!("maxbw", SRT_SOCKOPT::SRTO_MAXBW, ValueType::Int64, Phase::Post),
    opt!("oheadbw", SRT_SOCKOPT::SRTO_OHEADBW, ValueType::Int32, Phase::Post),
    opt!("nakreport", SRT_SOCKOPT::SRTO_NAKREPORT, ValueType::Bool, Phase::Pre),
    opt!("tlpktdrop", SRT_SOCKOPT::SRTO_TLPKTDROP, ValueType::Bool, Phase::Pre),
    opt!("transtype", SRT_SOCKOPT::SRTO_TRANSTYPE, ValueType::TransType, Phase::PreBind),
    opt!("sndsyn", SRT_SOCKOPT::SRTO_SNDSYN, ValueType::Bool, Phase::Post),
    opt!("rcvsyn", SRT_SOCKOPT::SRTO_RCVSYN, ValueType::Bool, Phase::Post),
];

/// Canonical lookup: case-insensitive, with an optional `SRTO_` prefix
/// stripped before matching.
pub fn lookup(name: &str) -> Option<&'static SrtOption> {
    let stripped = name
        .strip_prefix("SRTO_")
        .or_else(|| name.strip_prefix("srto_"))
        .unwrap_or(name);

    OPTIONS.iter().find(|o| o.name.eq_ignore_ascii_case(stripped))
}

/// Parses a textual option value into the option's native type.
pub fn parse_value(opt: &SrtOption, text: &str) -> Result<TypedValue, ErrorKind> {
    match opt.value_type {
        ValueType::Int32 => text
            .parse::<i32>()
            .map(TypedValue::Int32)
            .map_err(|_| ErrorKind::invalid_argument(format!("{}: not an integer: {text:?}", opt.name))),
        ValueType::Int64 => text
            .parse::<i64>()
            .map(TypedValue::Int64)
            .map_err(|_| ErrorKind::invalid_argument(format!("{}: not an integer: {text:?}", opt.name))),
        ValueType::Bool => match text.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(TypedValue::Bool(true)),
            "0" | "false" | "no" => Ok(TypedValue::Bool(false)),
            _ => Err(ErrorKind::invalid_argument(format!("{}: not a boolean: {text:?}", opt.name))),
        },
        ValueType::Str => Ok(TypedValue::Str(text.to_string())),
        ValueType::TransType => match text.to_ascii_lowercase().as_str() {
            "live" => Ok(TypedValue::TransType(TransType::Live)),
            "file" => Ok(TypedValue::TransType(TransType::File)),
            _ => Err(ErrorKind::invalid_argument(format!(
                "{}: expected 'live' or 'file', got {text:?}",
                opt.name
            ))),
        },
    }
}

/// Applies one option to a handle, given the adapter's current lifecycle
/// phase. Returns `InvalidArgument` both for a too-early application (the
/// caller should have deferred it) and for a native set-option failure.
pub fn apply(handle: SRTSOCKET, opt: &SrtOption, value: &TypedValue, current_phase: Phase) -> Result<(), ErrorKind> {
    if opt.phase > current_phase {
        return Err(ErrorKind::invalid_argument(format!(
            "{}: requires phase {:?}, currently at {:?}",
            opt.name, opt.phase, current_phase
        )));
    }

    if value.value_type() != opt.value_type {
        return Err(ErrorKind::invalid_argument(format!("{}: value type mismatch", opt.name)));
    }

    let ret = match value {
        TypedValue::Int32(v) => set_flag(handle, opt.id, v),
        TypedValue::Int64(v) => set_flag(handle, opt.id, v),
        TypedValue::Bool(v) => set_flag(handle, opt.id, &(*v as i32)),
        TypedValue::Str(v) => set_flag_bytes(handle, opt.id, v.as_bytes()),
        TypedValue::TransType(v) => {
            let native = match v {
                TransType::Live => SRT_TRANSTYPE::SRTT_LIVE,
                TransType::File => SRT_TRANSTYPE::SRTT_FILE,
            };
            set_flag(handle, opt.id, &native)
        }
    };

    if ret == 0 {
        Ok(())
    } else {
        Err(ErrorKind::invalid_argument(format!("{}: {:?}", opt.name, crate::error::map_last_error())))
    }
}

fn set_flag<T>(handle: SRTSOCKET, id: SRT_SOCKOPT, value: &T) -> c_int {
    unsafe { sys::srt_setsockflag(handle, id, value as *const T as *const _, size_of::<T>() as c_int) }
}

fn set_flag_bytes(handle: SRTSOCKET, id: SRT_SOCKOPT, bytes: &[u8]) -> c_int {
    unsafe { sys::srt_setsockflag(handle, id, bytes.as_ptr() as *const _, bytes.len() as c_int) }
}

/// A user-facing option set: a staged buffer of options that have not yet
/// been applied because their phase hasn't arrived, plus the one field
/// (`payload_size`) the send path needs on every call and so keeps
/// unpacked rather than re-scanning the buffer for.
///
/// `Socket` and `Acceptor` both drive this through [`SrtOptions::apply_phase`]
/// as they move through construction, bind, and connect.
#[derive(Debug, Clone)]
pub struct SrtOptions {
    pending: Vec<(&'static SrtOption, TypedValue)>,
    payload_size: i32,
}

impl Default for SrtOptions {
    fn default() -> Self {
        let mut options = Self {
            pending: Vec::new(),
            payload_size: 1316,
        };

        // Live-streaming defaults, matching the bias every caller in this
        // niche assumes unless told otherwise.
        options.set("transtype", TypedValue::TransType(TransType::Live)).unwrap();
        options.set("messageapi", TypedValue::Bool(true)).unwrap();
        options.set("tlpktdrop", TypedValue::Bool(true)).unwrap();
        options.set("latency", TypedValue::Int32(120)).unwrap();
        options.set("fc", TypedValue::Int32(25600)).unwrap();
        options.set("peeridletimeo", TypedValue::Int32(5000)).unwrap();
        options.set("maxbw", TypedValue::Int64(-1)).unwrap();
        options
    }
}

impl SrtOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a typed option value by canonical name. Fails only if the
    /// name is unrecognized or the value's type doesn't match the
    /// option's declared type — never because of phase, since staging
    /// always succeeds and application is deferred to [`Self::apply_phase`].
    pub fn set(&mut self, name: &str, value: TypedValue) -> Result<&mut Self, ErrorKind> {
        let opt = lookup(name).ok_or_else(|| ErrorKind::invalid_argument(format!("unrecognized option {name:?}")))?;

        if value.value_type() != opt.value_type {
            return Err(ErrorKind::invalid_argument(format!("{name}: value type mismatch")));
        }

        if opt.name == "payloadsize" {
            if let TypedValue::Int32(v) = &value {
                self.payload_size = *v;
            }
        }

        self.pending.retain(|(o, _)| o.name != opt.name);
        self.pending.push((opt, value));
        Ok(self)
    }

    /// Parses and stages an option given its name and textual value.
    pub fn set_str(&mut self, name: &str, text: &str) -> Result<&mut Self, ErrorKind> {
        let opt = lookup(name).ok_or_else(|| ErrorKind::invalid_argument(format!("unrecognized option {name:?}")))?;
        let value = parse_value(opt, text)?;
        self.set(name, value)
    }

    /// Parses a single `name=value` string into this option set.
    pub fn set_kv(&mut self, kv: &str) -> Result<&mut Self, ErrorKind> {
        let (name, text) = kv
            .split_once('=')
            .ok_or_else(|| ErrorKind::invalid_argument(format!("malformed option string {kv:?}")))?;
        self.set_str(name.trim(), text.trim())
    }

    /// Applies every pending option whose phase has been reached, leaving
    /// options that require a later phase in the pending buffer.
    pub(crate) fn apply_phase(&mut self, handle: SRTSOCKET, current_phase: Phase) -> Result<(), ErrorKind> {
        let mut remaining = Vec::new();
        for (opt, value) in self.pending.drain(..) {
            if opt.phase <= current_phase {
                apply(handle, opt, &value, current_phase)?;
            } else {
                remaining.push((opt, value));
            }
        }
        self.pending = remaining;
        Ok(())
    }

    /// Live mode caps a single message at one payload unit; this is the
    /// size `Socket::send_packet` chunks outgoing buffers against.
    pub fn max_pkt_size(&self) -> usize {
        self.payload_size.max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_strips_prefix() {
        assert!(lookup("SRTO_STREAMID").is_some());
        assert!(lookup("streamid").is_some());
        assert!(lookup("StreamId").is_some());
        assert!(lookup("not-a-real-option").is_none());
    }

    #[test]
    fn parse_value_accepts_bool_spellings() {
        let opt = lookup("tlpktdrop").unwrap();
        for text in ["1", "true", "TRUE", "yes"] {
            assert_eq!(parse_value(opt, text).unwrap(), TypedValue::Bool(true));
        }
        for text in ["0", "false", "no"] {
            assert_eq!(parse_value(opt, text).unwrap(), TypedValue::Bool(false));
        }
        assert!(parse_value(opt, "maybe").is_err());
    }

    #[test]
    fn parse_value_accepts_transtype_names() {
        let opt = lookup("transtype").unwrap();
        assert_eq!(parse_value(opt, "live").unwrap(), TypedValue::TransType(TransType::Live));
        assert_eq!(parse_value(opt, "FILE").unwrap(), TypedValue::TransType(TransType::File));
        assert!(parse_value(opt, "udp").is_err());
    }

    #[test]
    fn phase_ordering_matches_lifecycle() {
        assert!(Phase::PreBind < Phase::Pre);
        assert!(Phase::Pre < Phase::Post);
    }

    #[test]
    fn post_phase_option_defers_until_reached() {
        let mut options = SrtOptions::new();
        options.set("maxbw", TypedValue::Int64(5_000_000)).unwrap();
        assert!(options.pending.iter().any(|(o, _)| o.name == "maxbw"));
    }

    #[test]
    fn set_rejects_unrecognized_name() {
        let mut options = SrtOptions::new();
        assert!(options.set("bogus", TypedValue::Bool(true)).is_err());
    }

    #[test]
    fn set_rejects_mismatched_value_type() {
        let mut options = SrtOptions::new();
        assert!(options.set("latency", TypedValue::Bool(true)).is_err());
    }
}
