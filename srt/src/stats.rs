//! Trace statistics (C4/C5 companion): a friendly wrapper around
//! `srt_bstats`, surfacing the subset of the native counters this core
//! has callers for.

use crate::error::{self, ErrorKind};
use crate::sys::{self, SRTSOCKET, SRT_TRACEBSTATS};

/// A snapshot of a socket's transfer counters since the last time they
/// were fetched with `clear = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub ms_timestamp: i64,
    pub packets_sent: i64,
    pub packets_received: i64,
    pub packets_send_loss: i32,
    pub packets_recv_loss: i32,
    pub packets_retransmitted: i64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_rate_mbps: f64,
    pub recv_rate_mbps: f64,
    pub rtt_ms: f64,
    pub bandwidth_mbps: f64,
}

impl From<SRT_TRACEBSTATS> for Stats {
    fn from(raw: SRT_TRACEBSTATS) -> Self {
        Self {
            ms_timestamp: raw.msTimeStamp,
            packets_sent: raw.pktSentTotal,
            packets_received: raw.pktRecvTotal,
            packets_send_loss: raw.pktSndLossTotal,
            packets_recv_loss: raw.pktRcvLossTotal,
            packets_retransmitted: raw.pktRetransTotal as i64,
            bytes_sent: raw.byteSentTotal,
            bytes_received: raw.byteRecvTotal,
            send_rate_mbps: raw.mbpsSendRate,
            recv_rate_mbps: raw.mbpsRecvRate,
            rtt_ms: raw.msRTT,
            bandwidth_mbps: raw.mbpsBandwidth,
        }
    }
}

/// Fetches and clears a handle's trace statistics, matching the
/// `clear = true` call the rest of this core always makes.
pub(crate) fn fetch(handle: SRTSOCKET) -> Result<Stats, ErrorKind> {
    let mut raw = SRT_TRACEBSTATS::default();
    if unsafe { sys::srt_bstats(handle, &mut raw, 1) } != 0 {
        return Err(error::map_last_error());
    }
    Ok(Stats::from(raw))
}
