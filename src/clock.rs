//! Wall clock and network time sync.
//!
//! The Pi's system clock may be wrong right after boot, so the display keeps
//! its own correction on top of it. Sync reads the `Date` header of an HTTPS
//! response, which is good to a second and needs no extra protocol.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of the current UTC time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Make `now()` report `time` from this moment on.
    fn set(&self, time: NaiveDateTime);
}

/// System time plus a correction learned from the last sync.
///
/// The correction is a single atomic, so a resync on one thread never
/// leaves a reader with a half-written value.
#[derive(Debug, Default)]
pub struct SystemClock {
    correction_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn correction(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.correction_ms.load(Ordering::SeqCst))
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + self.correction()
    }

    fn set(&self, time: NaiveDateTime) {
        let diff = time.signed_duration_since(Utc::now().naive_utc());
        self.correction_ms
            .store(diff.num_milliseconds(), Ordering::SeqCst);
    }
}

/// Something that can resynchronize the clock on demand.
///
/// Called from the render loop, which stays paused until it returns.
pub trait TimeSync: Send {
    fn sync(&mut self) -> Result<()>;
}

// ── Network time ─────────────────────────────────────────────────────

/// Parse an HTTP `Date` header (`Sun, 06 Nov 1994 08:49:37 GMT`) as UTC.
pub fn parse_http_date(value: &str) -> Result<NaiveDateTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|t| t.naive_utc())
        .map_err(|e| Error::InvalidHttpDate(format!("{value:?}: {e}")))
}

/// Ask `url` for the current time via the `Date` response header.
pub async fn fetch_network_time(client: &reqwest::Client, url: &str) -> Result<NaiveDateTime> {
    let resp = client.head(url).send().await?;
    let header = resp
        .headers()
        .get(reqwest::header::DATE)
        .ok_or_else(|| Error::InvalidHttpDate(format!("no Date header from {url}")))?;
    let value = header
        .to_str()
        .map_err(|e| Error::InvalidHttpDate(e.to_string()))?;
    parse_http_date(value)
}

/// Set `clock` from the network, retrying up to `attempts` times.
pub async fn sync_clock(
    clock: &dyn WallClock,
    client: &reqwest::Client,
    url: &str,
    attempts: u32,
    retry_delay: Duration,
) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        match fetch_network_time(client, url).await {
            Ok(time) => {
                let before = clock.now();
                clock.set(time);
                tracing::info!(
                    "Clock synced to {} (was {}, attempt {})",
                    time,
                    before,
                    attempt
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Time sync attempt {}/{} failed: {}", attempt, attempts, e);
                last = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    Err(Error::TimeSyncExhausted { attempts, last })
}

/// Blocking resync for the render thread, driven on the tokio runtime
/// that hosts the HTTP server.
pub struct NetworkTimeSync {
    pub handle: tokio::runtime::Handle,
    pub client: reqwest::Client,
    pub clock: Arc<dyn WallClock>,
    pub url: String,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl TimeSync for NetworkTimeSync {
    fn sync(&mut self) -> Result<()> {
        self.handle.block_on(sync_clock(
            self.clock.as_ref(),
            &self.client,
            &self.url,
            self.attempts,
            self.retry_delay,
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<NaiveDateTime>,
    }

    impl ManualClock {
        pub fn new(now: NaiveDateTime) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, by: TimeDelta) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl WallClock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.now.lock().unwrap()
        }

        fn set(&self, time: NaiveDateTime) {
            *self.now.lock().unwrap() = time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_imf_fixdate() {
        let t = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        let expected = NaiveDate::from_ymd_opt(1994, 11, 6)
            .unwrap()
            .and_hms_opt(8, 49, 37)
            .unwrap();
        assert_eq!(t, expected);
    }

    #[test]
    fn parses_numeric_zone_as_utc() {
        let t = parse_http_date("Wed, 01 Jan 2025 02:00:00 +0200").unwrap();
        assert_eq!(t.to_string(), "2025-01-01 00:00:00");
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2025-01-01 00:00:00")]
    fn rejects_bad_dates(#[case] value: &str) {
        assert!(matches!(
            parse_http_date(value),
            Err(Error::InvalidHttpDate(_))
        ));
    }

    #[test]
    fn system_clock_set_applies_correction() {
        let clock = SystemClock::new();
        let target = Utc::now().naive_utc() + TimeDelta::hours(5);
        clock.set(target);

        let drift = clock.now().signed_duration_since(target);
        assert!(drift > TimeDelta::seconds(-1) && drift < TimeDelta::seconds(5));
        let minutes = clock.correction().num_minutes();
        assert!((299..=300).contains(&minutes));
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(TimeDelta::seconds(2));
        assert_eq!(clock.now(), start + TimeDelta::seconds(2));
    }

    #[tokio::test]
    async fn sync_gives_up_after_budget() {
        let clock = SystemClock::new();
        let client = reqwest::Client::new();
        // Nothing listens on the discard port locally
        let err = sync_clock(&clock, &client, "http://127.0.0.1:9/", 2, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TimeSyncExhausted { attempts: 2, .. }));
        assert_eq!(clock.correction(), TimeDelta::zero());
    }
}
