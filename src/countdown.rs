//! Countdown engine: deadline delta breakdown and the rotating label text.
//!
//! Once per wall-clock second the engine recomputes:
//! - the local time (wall clock shifted by the user's UTC offset),
//! - the remaining time to the deadline, split into fixed-width units,
//! - line 1, picked from eight labels by a 15-step phase schedule,
//! - line 2, the local time as `HH:MM:SS`.
//!
//! Between second edges the cached lines are reused, so the frame loop can
//! call `update()` as often as it likes.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, SubsecRound, TimeDelta, Timelike};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

pub const YEAR_SECS: i64 = 31_536_000;
pub const WEEK_SECS: i64 = 604_800;
pub const DAY_SECS: i64 = 86_400;
pub const HOUR_SECS: i64 = 3_600;
pub const MINUTE_SECS: i64 = 60;

/// Length of the line-1 rotation in seconds.
pub const PHASE_PERIOD: u8 = 15;

/// Number of distinct line-1 texts.
pub const LABEL_COUNT: usize = 8;

/// Offsets beyond a day either way make no sense for a wall clock.
pub const MAX_OFFSET_HOURS: i32 = 24;

// ── UTC offset ───────────────────────────────────────────────────────

/// User-adjustable UTC offset in whole hours.
///
/// Written from the HTTP control API while the render thread reads it every
/// second, so it is a plain atomic rather than part of the engine state.
#[derive(Debug, Default)]
pub struct UtcOffset {
    hours: AtomicI32,
}

impl UtcOffset {
    pub fn new(hours: i32) -> Self {
        Self {
            hours: AtomicI32::new(hours.clamp(-MAX_OFFSET_HOURS, MAX_OFFSET_HOURS)),
        }
    }

    pub fn hours(&self) -> i32 {
        self.hours.load(Ordering::SeqCst)
    }

    /// Shift the offset by `delta` hours, clamped. Returns the new value.
    pub fn adjust(&self, delta: i32) -> i32 {
        let step = |h: i32| h.saturating_add(delta).clamp(-MAX_OFFSET_HOURS, MAX_OFFSET_HOURS);
        match self
            .hours
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| Some(step(h)))
        {
            Ok(prev) | Err(prev) => step(prev),
        }
    }
}

// ── Deadline parsing ─────────────────────────────────────────────────

/// Parse `YYYY-MM-DD HH:MM:SS` by fixed field positions.
///
/// Surrounding whitespace is ignored (the remote file ends in a newline).
/// Anything else, including out-of-range fields, is rejected.
pub fn parse_deadline(input: &str) -> Result<NaiveDateTime> {
    let s = input.trim();
    let invalid = |reason: &str| Error::InvalidDeadlineFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let bytes = s.as_bytes();
    if bytes.len() != 19 || !s.is_ascii() {
        return Err(invalid("expected 19 characters in the form YYYY-MM-DD HH:MM:SS"));
    }
    for (pos, sep) in [(4, b'-'), (7, b'-'), (10, b' '), (13, b':'), (16, b':')] {
        if bytes[pos] != sep {
            return Err(invalid(&format!("expected '{}' at position {pos}", sep as char)));
        }
    }

    let field = |range: std::ops::Range<usize>, name: &str| -> Result<u32> {
        let digits = &s[range];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(&format!("{name} is not a number")));
        }
        digits
            .parse()
            .map_err(|_| invalid(&format!("{name} is not a number")))
    };

    let year = field(0..4, "year")?;
    let month = field(5..7, "month")?;
    let day = field(8..10, "day")?;
    let hour = field(11..13, "hour")?;
    let minute = field(14..16, "minute")?;
    let second = field(17..19, "second")?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| invalid("no such date"))?
        .and_hms_opt(hour, minute, second)
        .ok_or_else(|| invalid("no such time of day"))
}

// ── Breakdown ────────────────────────────────────────────────────────

/// Remaining time split into cascading fixed-width units.
///
/// Years are 365 days and there are no leap seconds; this is a rough
/// countdown, not a calendar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Breakdown {
    pub years: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// The deadline has passed; every unit is clamped to zero.
    pub past: bool,
}

impl Breakdown {
    /// Unit labels in display order, largest unit first.
    pub fn labels(&self) -> [String; 6] {
        [
            format!("{} YEARS", self.years),
            format!("{} WEEKS", self.weeks),
            format!("{} DAYS", self.days),
            format!("{} HOURS", self.hours),
            format!("{} MINUTES", self.minutes),
            format!("{:02} SECONDS", self.seconds),
        ]
    }
}

/// Split `delta_secs` into units. Negative deltas clamp to zero.
pub fn decompose(delta_secs: i64) -> Breakdown {
    let past = delta_secs < 0;
    let mut rest = delta_secs.max(0);
    let mut take = |unit: i64| {
        let n = rest / unit;
        rest %= unit;
        n
    };

    let years = take(YEAR_SECS);
    let weeks = take(WEEK_SECS);
    let days = take(DAY_SECS);
    let hours = take(HOUR_SECS);
    let minutes = take(MINUTE_SECS);

    Breakdown {
        years,
        weeks,
        days,
        hours,
        minutes,
        seconds: rest,
        past,
    }
}

/// Which of the eight labels the phase counter selects: one second each in
/// order, then the last one held for the rest of the period.
pub fn phase_index(counter: u64) -> usize {
    ((counter % PHASE_PERIOD as u64) as usize).min(LABEL_COUNT - 1)
}

/// Shift `now` by whole hours, rolling over days, months and years.
///
/// Falls back to `now` if the result would leave chrono's range.
pub fn apply_offset(now: NaiveDateTime, hours: i32) -> NaiveDateTime {
    match now.checked_add_signed(TimeDelta::hours(hours as i64)) {
        Some(t) => t,
        None => {
            tracing::warn!("UTC offset {} out of range at {}, ignoring it", hours, now);
            now
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────

/// The two fixed texts shown before the unit labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Titles {
    pub title: String,
    pub subtitle: String,
}

impl Default for Titles {
    fn default() -> Self {
        Self {
            title: "COUNTDOWN".to_string(),
            subtitle: "TO 1.5 DEGREES".to_string(),
        }
    }
}

pub struct CountdownEngine {
    deadline: NaiveDateTime,
    offset: Arc<UtcOffset>,
    applied_offset: i32,
    titles: Titles,
    last_second: Option<u32>,
    last_seen: Option<NaiveDateTime>,
    phase: u8,
    breakdown: Breakdown,
    local_time: Option<NaiveDateTime>,
    line1: String,
    line2: String,
}

impl CountdownEngine {
    pub fn new(deadline: NaiveDateTime, offset: Arc<UtcOffset>, titles: Titles) -> Self {
        Self {
            deadline,
            offset,
            applied_offset: 0,
            titles,
            last_second: None,
            last_seen: None,
            phase: 0,
            breakdown: Breakdown::default(),
            local_time: None,
            line1: String::new(),
            line2: String::new(),
        }
    }

    /// Feed the current wall-clock time. Returns `true` when a new second
    /// started and the display text was recomputed.
    ///
    /// A clock that jumps backwards (e.g. after a resync) always counts as a
    /// new second and restarts the label rotation.
    pub fn update(&mut self, now: NaiveDateTime) -> bool {
        let second = now.second();
        let went_back = self.last_seen.is_some_and(|prev| now < prev);
        self.last_seen = Some(now);

        if went_back {
            tracing::warn!("Wall clock went backwards to {}, restarting rotation", now);
            self.phase = 0;
        } else if self.last_second == Some(second) {
            return false;
        }
        self.last_second = Some(second);

        // Whole seconds only, or the breakdown lags line 2 by one
        let hours = self.offset.hours();
        let local = apply_offset(now.trunc_subsecs(0), hours);
        self.applied_offset = hours;
        let delta = self.deadline.signed_duration_since(local).num_seconds();
        self.breakdown = decompose(delta);

        let labels = self.labels();
        self.line1 = labels[phase_index(self.phase as u64)].clone();
        self.phase = (self.phase + 1) % PHASE_PERIOD;

        self.line2 = local.format("%H:%M:%S").to_string();
        self.local_time = Some(local);

        tracing::debug!(line1 = %self.line1, line2 = %self.line2, "countdown tick");
        true
    }

    /// All eight line-1 texts in rotation order.
    pub fn labels(&self) -> [String; LABEL_COUNT] {
        let [y, w, d, h, m, s] = self.breakdown.labels();
        [
            self.titles.title.clone(),
            self.titles.subtitle.clone(),
            y,
            w,
            d,
            h,
            m,
            s,
        ]
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    pub fn breakdown(&self) -> Breakdown {
        self.breakdown
    }

    /// Offset-adjusted time of the last second edge.
    pub fn local_time(&self) -> Option<NaiveDateTime> {
        self.local_time
    }

    /// Phase counter for the next second edge, in `0..PHASE_PERIOD`.
    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn deadline(&self) -> NaiveDateTime {
        self.deadline
    }

    pub fn offset(&self) -> &UtcOffset {
        &self.offset
    }

    /// Offset in hours that produced the current `local_time`.
    pub fn applied_offset(&self) -> i32 {
        self.applied_offset
    }
}
