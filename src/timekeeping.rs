//! Wall-clock time for the clock message.
//!
//! The host clock is corrected by the drift measured against an NTP
//! server, then shifted by the configured timezone offset. The scheduler
//! never sees any of this: it only gets a text provider from
//! [`time_provider`].

use crate::error::{Error, Result};
use crate::marquee::MessageLine;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const NTP_PORT: u16 = 123;
pub const NTP_PACKET_LEN: usize = 48;
/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const NTP_UNIX_EPOCH_DELTA: u64 = 2_208_988_800;
pub const NTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Client request: LI = 0, VN = 3, Mode = 3.
pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Extract the transmit timestamp as Unix seconds.
pub fn parse_response(response: &[u8]) -> Result<i64> {
    if response.len() < NTP_PACKET_LEN {
        return Err(Error::Ntp(format!("invalid response: {} bytes", response.len())));
    }
    let seconds = u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
    if seconds < NTP_UNIX_EPOCH_DELTA {
        return Err(Error::Ntp(format!("invalid timestamp: {seconds}")));
    }
    Ok((seconds - NTP_UNIX_EPOCH_DELTA) as i64)
}

/// Ask `server` for the current time, returning Unix seconds.
pub fn sync_ntp(server: &str) -> Result<i64> {
    let addr = (server, NTP_PORT)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::Ntp(format!("no address for {server}")))?;

    let socket = UdpSocket::bind(local_bind_addr(&addr))?;
    socket.set_read_timeout(Some(NTP_TIMEOUT))?;
    socket.set_write_timeout(Some(NTP_TIMEOUT))?;
    socket.send_to(&build_request(), addr)?;

    let mut buf = [0u8; NTP_PACKET_LEN];
    let (n, _) = socket.recv_from(&mut buf)?;
    parse_response(&buf[..n])
}

/// Any-address socket of the same family as `server`.
fn local_bind_addr(server: &SocketAddr) -> SocketAddr {
    match server {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

/// Format as `"Mon Feb 21 10:30"`.
pub fn format_time_string(t: &NaiveDateTime) -> String {
    t.format("%a %b %-d %H:%M").to_string()
}

/// Host clock plus measured drift plus timezone offset.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeKeeper {
    drift: ChronoDuration,
    utc_offset: ChronoDuration,
    synced: bool,
}

impl TimeKeeper {
    /// `timezone_offset` is in hours and may be fractional (e.g. 5.5).
    pub fn new(timezone_offset: f64) -> Self {
        Self {
            drift: ChronoDuration::zero(),
            utc_offset: ChronoDuration::seconds((timezone_offset * 3600.0) as i64),
            synced: false,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn drift(&self) -> ChronoDuration {
        self.drift
    }

    /// Record an NTP reading taken at host time `host_now`.
    pub fn apply_sync(&mut self, ntp_unix: i64, host_now: DateTime<Utc>) {
        self.drift = ChronoDuration::seconds(ntp_unix - host_now.timestamp());
        self.synced = true;
        tracing::info!("NTP sync: host clock drift {}s", self.drift.num_seconds());
    }

    /// Local time for a given host instant.
    pub fn local_at(&self, host_now: DateTime<Utc>) -> NaiveDateTime {
        (host_now + self.drift + self.utc_offset).naive_utc()
    }

    pub fn now_local(&self) -> NaiveDateTime {
        self.local_at(Utc::now())
    }

    pub fn time_string(&self) -> String {
        format_time_string(&self.now_local())
    }
}

/// Shared between the scheduler's clock provider and the resync thread.
pub type SharedTimeKeeper = Arc<Mutex<TimeKeeper>>;

/// A message line that shows the current local time.
pub fn time_provider(keeper: SharedTimeKeeper) -> MessageLine {
    MessageLine::provider(move || match keeper.lock() {
        Ok(k) => k.time_string(),
        Err(poisoned) => poisoned.into_inner().time_string(),
    })
}

/// Sync once and fold the result into `keeper`.
pub fn resync(keeper: &SharedTimeKeeper, server: &str) -> Result<()> {
    let ntp_unix = sync_ntp(server)?;
    let mut k = keeper.lock().unwrap_or_else(|p| p.into_inner());
    k.apply_sync(ntp_unix, Utc::now());
    Ok(())
}

/// Wait before the next sync: `interval` after a success, `retry` after a
/// failure.
pub fn next_delay(result: &Result<()>, interval: Duration, retry: Duration) -> Duration {
    match result {
        Ok(()) => interval,
        Err(_) => retry,
    }
}

/// Keep `keeper` in sync from a background thread.
///
/// Waits `first_delay`, then syncs every `interval`, or after `retry` when
/// the previous attempt failed. The thread runs for the life of the process.
pub fn spawn_resync(
    keeper: SharedTimeKeeper,
    server: String,
    first_delay: Duration,
    interval: Duration,
    retry: Duration,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("ntp-resync".into()).spawn(move || {
        let mut delay = first_delay;
        loop {
            thread::sleep(delay);
            let result = resync(&keeper, &server);
            if let Err(e) = &result {
                tracing::warn!("{}; retrying in {:?}", e, retry);
            }
            delay = next_delay(&result, interval, retry);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn response_with_seconds(seconds: u32) -> [u8; 48] {
        let mut buf = [0u8; 48];
        buf[40..44].copy_from_slice(&seconds.to_be_bytes());
        buf[44..48].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        buf
    }

    #[test]
    fn request_is_client_mode_v3() {
        let packet = build_request();
        assert_eq!(packet.len(), 48);
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn parse_response_converts_to_unix() {
        // 2025-02-21 10:30:00 UTC
        let unix = 1_740_133_800u32;
        let buf = response_with_seconds(unix + NTP_UNIX_EPOCH_DELTA as u32);
        assert_eq!(parse_response(&buf).unwrap(), unix as i64);
    }

    #[test]
    fn parse_response_rejects_short_packets() {
        let err = parse_response(&[0u8; 47]).unwrap_err();
        assert!(err.to_string().contains("47 bytes"));
    }

    #[test]
    fn parse_response_rejects_pre_epoch_timestamps() {
        assert!(parse_response(&response_with_seconds(12345)).is_err());
    }

    #[rstest]
    #[case(2025, 2, 21, 10, 30, "Fri Feb 21 10:30")]
    #[case(2024, 12, 2, 7, 5, "Mon Dec 2 07:05")]
    #[case(2026, 1, 4, 0, 0, "Sun Jan 4 00:00")]
    fn formats_like_the_panel(
        #[case] y: i32,
        #[case] mo: u32,
        #[case] d: u32,
        #[case] h: u32,
        #[case] mi: u32,
        #[case] expected: &str,
    ) {
        let t = NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, 0).unwrap();
        assert_eq!(format_time_string(&t), expected);
    }

    #[test]
    fn drift_and_offset_shift_local_time() {
        let host = Utc.with_ymd_and_hms(2025, 2, 21, 10, 30, 0).unwrap();
        let mut keeper = TimeKeeper::new(-5.0);
        assert!(!keeper.is_synced());

        keeper.apply_sync(host.timestamp() + 90, host);
        assert!(keeper.is_synced());
        assert_eq!(keeper.drift().num_seconds(), 90);
        assert_eq!(format_time_string(&keeper.local_at(host)), "Fri Feb 21 05:31");
    }

    #[test]
    fn fractional_offsets_are_supported() {
        let host = Utc.with_ymd_and_hms(2025, 2, 21, 10, 30, 0).unwrap();
        let keeper = TimeKeeper::new(5.5);
        assert_eq!(format_time_string(&keeper.local_at(host)), "Fri Feb 21 16:00");
    }

    #[rstest]
    #[case(Ok(()), Duration::from_secs(600))]
    #[case(Err(Error::Ntp("timed out".into())), Duration::from_secs(60))]
    fn resync_waits_interval_after_success_and_retry_after_failure(
        #[case] result: Result<()>,
        #[case] expected: Duration,
    ) {
        let delay = next_delay(&result, Duration::from_secs(600), Duration::from_secs(60));
        assert_eq!(delay, expected);
    }

    #[rstest]
    #[case("192.0.2.1:123", "0.0.0.0:0")]
    #[case("[2001:db8::1]:123", "[::]:0")]
    fn binds_same_address_family_as_server(#[case] server: &str, #[case] expected: &str) {
        let server: SocketAddr = server.parse().unwrap();
        assert_eq!(local_bind_addr(&server), expected.parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn provider_reads_shared_keeper() {
        let keeper = Arc::new(Mutex::new(TimeKeeper::new(0.0)));
        let line = time_provider(Arc::clone(&keeper));
        let text = line.resolve();
        // "Www Mmm D HH:MM"
        assert!(text.len() >= 14, "{text}");
        assert_eq!(&text[text.len() - 3..text.len() - 2], ":");
    }
}
