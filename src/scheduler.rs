//! Frame loop: owns the display and drives fire, countdown and overlay.
//!
//! Runs on a dedicated thread. Each iteration:
//! 1. drain control commands (non-blocking)
//! 2. seed and diffuse the heat field
//! 3. draw the fire
//! 4. update the countdown from the wall clock
//! 5. draw the outlined text on top
//! 6. present, then sleep briefly
//!
//! Nothing in that path blocks except a user-requested resync, which pauses
//! the loop on purpose until the clock is set.

use crate::clock::{TimeSync, WallClock};
use crate::countdown::CountdownEngine;
use crate::heat::HeatField;
use crate::render::{DisplaySink, Renderer};
use crate::{Result, is_running};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Brightness change per up/down press.
pub const BRIGHTNESS_STEP: u8 = 5;

pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(10);

// ── Input ────────────────────────────────────────────────────────────

/// Button-style requests polled by the frame loop.
///
/// UTC offset changes are not here: they go straight to the shared
/// `UtcOffset` atomic and are picked up on the next second edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    BrightnessUp,
    BrightnessDown,
    /// Set display brightness (0-100)
    SetBrightness(u8),
    /// Resync the wall clock from the network
    Resync,
}

/// Non-blocking source of control commands.
pub trait InputSource {
    fn poll(&mut self) -> Option<ControlCommand>;
}

impl InputSource for Receiver<ControlCommand> {
    fn poll(&mut self) -> Option<ControlCommand> {
        self.try_recv().ok()
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of what the display shows, for the HTTP API.
///
/// Rust concept: try_lock
/// The frame loop publishes with `try_lock`, so a slow HTTP reader costs a
/// skipped update instead of a dropped frame.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DisplayStatus {
    /// Rotating label (title, subtitle, or one of the units)
    pub line1: String,
    /// Local time as HH:MM:SS
    pub line2: String,
    /// Offset-adjusted time of the last update
    pub local_time: Option<String>,
    /// Countdown target
    pub deadline: String,
    /// UTC offset in hours applied to `local_time`
    pub utc_offset: i32,
    /// Current brightness (0-100)
    pub brightness: u8,
    /// Deadline has passed
    pub past: bool,
    /// Frames presented since start
    pub frames: u64,
    /// Server version
    pub version: String,
}

impl DisplayStatus {
    pub fn new() -> Self {
        Self {
            line1: String::new(),
            line2: String::new(),
            local_time: None,
            deadline: String::new(),
            utc_offset: 0,
            brightness: crate::render::DEFAULT_BRIGHTNESS,
            past: false,
            frames: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for DisplayStatus {
    fn default() -> Self {
        Self::new()
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

pub struct FrameScheduler<S, I> {
    field: HeatField,
    renderer: Renderer,
    countdown: CountdownEngine,
    sink: S,
    input: I,
    clock: Arc<dyn WallClock>,
    resync: Option<Box<dyn TimeSync>>,
    status: Arc<Mutex<DisplayStatus>>,
    frame_delay: Duration,
    frames: u64,
}

impl<S: DisplaySink, I: InputSource> FrameScheduler<S, I> {
    /// Build a scheduler sized to `sink`. Fails if the panel is too small
    /// for the heat grid.
    pub fn new(
        sink: S,
        input: I,
        clock: Arc<dyn WallClock>,
        countdown: CountdownEngine,
        status: Arc<Mutex<DisplayStatus>>,
    ) -> Result<Self> {
        let panel = sink.size();
        Ok(Self {
            field: HeatField::new(panel)?,
            renderer: Renderer::new(panel),
            countdown,
            sink,
            input,
            clock,
            resync: None,
            status,
            frame_delay: DEFAULT_FRAME_DELAY,
            frames: 0,
        })
    }

    pub fn with_resync(mut self, sync: Box<dyn TimeSync>) -> Self {
        self.resync = Some(sync);
        self
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.renderer.set_brightness(brightness);
        self
    }

    /// Replace the heat field, e.g. with a deterministic one.
    pub fn with_field(mut self, field: HeatField) -> Self {
        self.field = field;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn countdown(&self) -> &CountdownEngine {
        &self.countdown
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Loop until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        tracing::info!(
            "Frame loop started ({}x{}, {}ms delay)",
            self.sink.size().cols,
            self.sink.size().rows,
            self.frame_delay.as_millis()
        );
        while is_running(running) {
            self.tick();
            thread::sleep(self.frame_delay);
        }
        tracing::info!("Frame loop stopped after {} frames", self.frames);
    }

    /// One full iteration without the trailing sleep.
    pub fn tick(&mut self) {
        while let Some(cmd) = self.input.poll() {
            self.handle(cmd);
        }

        self.field.seed();
        self.field.diffuse();
        self.renderer.draw(&self.field, &mut self.sink);

        let second_edge = self.countdown.update(self.clock.now());

        self.renderer.draw_overlay(
            &mut self.sink,
            self.countdown.line1(),
            self.countdown.line2(),
        );
        self.sink.present();
        self.frames = self.frames.wrapping_add(1);

        if second_edge {
            self.publish_status();
        }
    }

    fn handle(&mut self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::BrightnessUp => {
                let value = self.renderer.brightness().saturating_add(BRIGHTNESS_STEP);
                self.set_brightness(value);
            }
            ControlCommand::BrightnessDown => {
                let value = self.renderer.brightness().saturating_sub(BRIGHTNESS_STEP);
                self.set_brightness(value);
            }
            ControlCommand::SetBrightness(value) => self.set_brightness(value),
            ControlCommand::Resync => match self.resync.as_mut() {
                Some(sync) => {
                    tracing::info!("Manual resync requested");
                    if let Err(e) = sync.sync() {
                        tracing::warn!("Manual resync failed, keeping current clock: {}", e);
                    }
                }
                None => tracing::warn!("Resync requested but no time source is configured"),
            },
        }
    }

    fn set_brightness(&mut self, value: u8) {
        self.renderer.set_brightness(value);
        tracing::info!("Brightness set to {}", self.renderer.brightness());
        self.publish_status();
    }

    /// Copy the current state out for the API. Skipped if a reader holds
    /// the lock; the next second edge catches up.
    fn publish_status(&self) {
        let Ok(mut s) = self.status.try_lock() else {
            return;
        };
        s.line1 = self.countdown.line1().to_string();
        s.line2 = self.countdown.line2().to_string();
        s.local_time = self.countdown.local_time().map(|t| t.to_string());
        s.deadline = self.countdown.deadline().to_string();
        s.utc_offset = self.countdown.applied_offset();
        s.brightness = self.renderer.brightness();
        s.past = self.countdown.breakdown().past;
        s.frames = self.frames;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PanelConfig;
    use crate::clock::testing::ManualClock;
    use crate::countdown::{Titles, UtcOffset};
    use crate::sink::FrameBuffer;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Sender};

    fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    struct Rig {
        scheduler: FrameScheduler<FrameBuffer, Receiver<ControlCommand>>,
        tx: Sender<ControlCommand>,
        clock: Arc<ManualClock>,
        offset: Arc<UtcOffset>,
        status: Arc<Mutex<DisplayStatus>>,
    }

    fn rig() -> Rig {
        let panel = PanelConfig::new(11, 53);
        let (tx, rx) = mpsc::channel();
        let clock = Arc::new(ManualClock::new(at(1, 0, 0, 0)));
        let offset = Arc::new(UtcOffset::new(0));
        let status = Arc::new(Mutex::new(DisplayStatus::new()));
        let countdown = CountdownEngine::new(at(8, 0, 0, 0), offset.clone(), Titles::default());

        let scheduler = FrameScheduler::new(
            FrameBuffer::new(panel),
            rx,
            clock.clone(),
            countdown,
            status.clone(),
        )
        .unwrap()
        .with_field(HeatField::with_seed(panel, 3).unwrap());

        Rig {
            scheduler,
            tx,
            clock,
            offset,
            status,
        }
    }

    struct CountingSync {
        calls: Arc<AtomicUsize>,
        clock: Arc<ManualClock>,
        to: NaiveDateTime,
    }

    impl TimeSync for CountingSync {
        fn sync(&mut self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clock.set(self.to);
            Ok(())
        }
    }

    #[test]
    fn tick_presents_and_publishes() {
        let mut r = rig();
        r.scheduler.tick();

        assert_eq!(r.scheduler.sink().presented(), 1);
        assert_eq!(r.scheduler.frames(), 1);

        let s = r.status.lock().unwrap().clone();
        assert_eq!(s.line1, "COUNTDOWN");
        assert_eq!(s.line2, "00:00:00");
        assert_eq!(s.deadline, "2025-01-08 00:00:00");
        assert_eq!(s.local_time.as_deref(), Some("2025-01-01 00:00:00"));
        assert!(!s.past);
    }

    #[test]
    fn countdown_advances_once_per_second() {
        let mut r = rig();
        for _ in 0..10 {
            r.scheduler.tick();
        }
        assert_eq!(r.scheduler.countdown().phase(), 1);
        assert_eq!(r.scheduler.sink().presented(), 10);

        r.clock.advance(TimeDelta::seconds(1));
        r.scheduler.tick();
        assert_eq!(r.scheduler.countdown().line1(), "TO 1.5 DEGREES");
        assert_eq!(r.status.lock().unwrap().line2, "00:00:01");
    }

    #[test]
    fn overlay_lands_on_top_of_the_fire() {
        let mut r = rig();
        r.scheduler.tick();
        let fb = r.scheduler.sink();
        // Top-left of the "0" in "00:00:00" on line 2
        let x = crate::render::centered_x(fb.size(), 28);
        let white = crate::Color::WHITE.apply_brightness(r.scheduler.renderer().brightness());
        assert_eq!(fb.pixel(x, crate::render::LINE2_Y), Some(white));
    }

    #[test]
    fn brightness_commands_step_and_clamp() {
        let mut r = rig();
        r.tx.send(ControlCommand::BrightnessUp).unwrap();
        r.tx.send(ControlCommand::BrightnessUp).unwrap();
        r.tx.send(ControlCommand::BrightnessDown).unwrap();
        r.scheduler.tick();
        assert_eq!(r.scheduler.renderer().brightness(), 55);

        r.tx.send(ControlCommand::SetBrightness(250)).unwrap();
        r.tx.send(ControlCommand::BrightnessUp).unwrap();
        r.scheduler.tick();
        assert_eq!(r.scheduler.renderer().brightness(), 100);
        assert_eq!(r.status.lock().unwrap().brightness, 100);

        r.tx.send(ControlCommand::SetBrightness(3)).unwrap();
        r.tx.send(ControlCommand::BrightnessDown).unwrap();
        r.scheduler.tick();
        assert_eq!(r.scheduler.renderer().brightness(), 0);
    }

    #[test]
    fn resync_runs_time_sync_and_restarts_rotation() {
        let r = rig();
        let calls = Arc::new(AtomicUsize::new(0));
        let sync = CountingSync {
            calls: calls.clone(),
            clock: r.clock.clone(),
            to: at(1, 0, 0, 2),
        };
        let mut scheduler = r.scheduler.with_resync(Box::new(sync));

        for _ in 0..5 {
            r.clock.advance(TimeDelta::seconds(1));
            scheduler.tick();
        }
        assert_eq!(scheduler.countdown().phase(), 5);

        r.tx.send(ControlCommand::Resync).unwrap();
        scheduler.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Clock moved back from 00:00:05 to 00:00:02
        assert_eq!(scheduler.countdown().line2(), "00:00:02");
        assert_eq!(scheduler.countdown().line1(), "COUNTDOWN");
    }

    #[test]
    fn resync_without_source_is_ignored() {
        let mut r = rig();
        r.tx.send(ControlCommand::Resync).unwrap();
        r.scheduler.tick();
        assert_eq!(r.scheduler.frames(), 1);
    }

    #[test]
    fn offset_change_shows_up_on_next_second() {
        let mut r = rig();
        r.clock.set(at(1, 22, 0, 0));
        r.scheduler.tick();
        assert_eq!(r.scheduler.countdown().line2(), "22:00:00");

        r.offset.adjust(3);
        r.scheduler.tick();
        assert_eq!(r.scheduler.countdown().line2(), "22:00:00", "same second");

        r.clock.advance(TimeDelta::seconds(1));
        r.scheduler.tick();
        assert_eq!(r.scheduler.countdown().line2(), "01:00:01");
        assert_eq!(r.status.lock().unwrap().utc_offset, 3);
        assert_eq!(
            r.status.lock().unwrap().local_time.as_deref(),
            Some("2025-01-02 01:00:01")
        );
    }

    #[test]
    fn status_offset_matches_published_local_time() {
        let mut r = rig();
        r.clock.set(at(1, 22, 0, 0));
        r.scheduler.tick();

        // Brightness publishes mid-second, before the new offset is applied
        r.offset.adjust(2);
        r.tx.send(ControlCommand::SetBrightness(70)).unwrap();
        r.scheduler.tick();

        let s = r.status.lock().unwrap().clone();
        assert_eq!(s.brightness, 70);
        assert_eq!(s.utc_offset, 0);
        assert_eq!(s.local_time.as_deref(), Some("2025-01-01 22:00:00"));
    }

    #[test]
    fn run_returns_when_not_running() {
        let mut r = rig();
        let running = AtomicBool::new(false);
        r.scheduler.run(&running);
        assert_eq!(r.scheduler.frames(), 0);
    }

    #[test]
    fn status_skipped_while_locked() {
        let mut r = rig();
        {
            let _held = r.status.lock().unwrap();
            r.scheduler.tick();
        }
        assert_eq!(r.status.lock().unwrap().line1, "");
        assert_eq!(r.scheduler.countdown().line1(), "COUNTDOWN");
    }
}
