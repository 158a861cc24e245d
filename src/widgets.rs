//! Animation state for the dashboard widgets.
//!
//! Everything here is a function of a supplied value and the time read from
//! a [`TickSource`]; nothing touches the network or the cache. Drawing lives
//! in `app`.

use std::{collections::VecDeque, f64::consts::TAU, time::Duration};

use eframe::egui::Context;
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const ANIMATION_DURATION_SECS: f64 = 1.2;

pub const FEED_STAGGER_SECS: f64 = 0.12;
pub const FEED_FADE_SECS: f64 = 0.35;
pub const EMPTY_FEED_PLACEHOLDER: &str = "No recent activity";

pub const BOOT_LOG: &[&str] = &[
    "[SYSTEM] Connecting to GitHub API...",
    "[SYSTEM] Fetching diagnostic modules...",
];
pub const BOOT_LINE_INTERVAL_SECS: f64 = 0.4;

pub const UNAVAILABLE_MESSAGE: &str = "System metrics temporarily unavailable.";

pub const SIGNAL_WINDOW: usize = 48;
const SIGNAL_SAMPLE_SECS: f64 = 0.05;
const SIGNAL_PHASE_STEP: f64 = 0.35;
const SIGNAL_AMPLITUDE: f64 = 0.6;
const SIGNAL_JITTER: f64 = 0.2;

/// Monotonic time in seconds from an arbitrary fixed origin.
pub trait TickSource {
    fn now(&self) -> f64;
}

impl TickSource for Context {
    fn now(&self) -> f64 {
        self.input(|input| input.time)
    }
}

pub fn ease_out_quint(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(5)
}

/// Progress of a fixed-length animation that starts on its first sample.
#[derive(Clone, Debug, Default)]
struct Tween {
    started_at: Option<f64>,
}

impl Tween {
    fn restart(&mut self) {
        self.started_at = None;
    }

    fn progress(&mut self, ticks: &dyn TickSource) -> f64 {
        let now = ticks.now();
        let started_at = *self.started_at.get_or_insert(now);
        ((now - started_at) / ANIMATION_DURATION_SECS).clamp(0.0, 1.0)
    }

    fn is_finished(&self, ticks: &dyn TickSource) -> bool {
        self.started_at
            .is_some_and(|started_at| ticks.now() - started_at >= ANIMATION_DURATION_SECS)
    }
}

// -----------------------------------------------------------------------------
// Counter
// -----------------------------------------------------------------------------

/// Counts up from zero to its target. Starts on the first sample.
#[derive(Clone, Debug, Default)]
pub struct AnimatedCounter {
    target: u64,
    tween: Tween,
}

impl AnimatedCounter {
    #[cfg(test)]
    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn set_target(&mut self, target: u64) {
        if target != self.target {
            self.target = target;
            self.tween.restart();
        }
    }

    pub fn sample(&mut self, ticks: &dyn TickSource) -> u64 {
        let progress = self.tween.progress(ticks);
        if progress >= 1.0 {
            return self.target;
        }
        (self.target as f64 * ease_out_quint(progress)).floor() as u64
    }

    pub fn is_settled(&self, ticks: &dyn TickSource) -> bool {
        self.tween.is_finished(ticks)
    }
}

// -----------------------------------------------------------------------------
// Progress ring
// -----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ProgressRing {
    value: u64,
    max: u64,
    radius: f64,
    tween: Tween,
}

impl ProgressRing {
    pub fn new(value: u64, max: u64, radius: f64) -> Self {
        Self {
            value,
            max,
            radius,
            tween: Tween::default(),
        }
    }

    pub fn set_values(&mut self, value: u64, max: u64) {
        if (value, max) != (self.value, self.max) {
            self.value = value;
            self.max = max;
            self.tween.restart();
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.value as f64 / self.max as f64).min(1.0)
    }

    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// Share of the ring drawn at this moment, in `[0, ratio]`.
    pub fn filled_fraction(&mut self, ticks: &dyn TickSource) -> f64 {
        self.ratio() * ease_out_quint(self.tween.progress(ticks))
    }

    /// Dash offset in the SVG sense: the full circumference when empty.
    pub fn stroke_offset(&mut self, ticks: &dyn TickSource) -> f64 {
        self.circumference() * (1.0 - self.filled_fraction(ticks))
    }

    pub fn is_settled(&self, ticks: &dyn TickSource) -> bool {
        self.tween.is_finished(ticks)
    }
}

// -----------------------------------------------------------------------------
// Signal graph
// -----------------------------------------------------------------------------

/// Decorative waveform. Runs until [`SignalGraph::stop`]; no data input.
pub struct SignalGraph {
    samples: VecDeque<f32>,
    phase: f64,
    pending_secs: f64,
    last_tick: Option<f64>,
    rng: StdRng,
    running: bool,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            samples: std::iter::repeat_n(0.0, SIGNAL_WINDOW).collect(),
            phase: 0.0,
            pending_secs: 0.0,
            last_tick: None,
            rng,
            running: true,
        }
    }

    pub fn samples(&self) -> &VecDeque<f32> {
        &self.samples
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_tick = None;
    }

    pub fn tick(&mut self, ticks: &dyn TickSource) {
        if !self.running {
            return;
        }
        let now = ticks.now();
        let elapsed = self
            .last_tick
            .map(|last| (now - last).max(0.0))
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.pending_secs += elapsed;

        let due = (self.pending_secs / SIGNAL_SAMPLE_SECS).floor();
        self.pending_secs -= due * SIGNAL_SAMPLE_SECS;
        // After a long stall only the visible window matters.
        for _ in 0..(due as usize).min(SIGNAL_WINDOW) {
            self.push_sample();
        }
    }

    fn push_sample(&mut self) {
        self.phase = (self.phase + SIGNAL_PHASE_STEP) % TAU;
        let jitter = self.rng.random_range(-SIGNAL_JITTER..=SIGNAL_JITTER);
        let value = (self.phase.sin() * SIGNAL_AMPLITUDE + jitter).clamp(-1.0, 1.0);
        self.samples.push_back(value as f32);
        while self.samples.len() > SIGNAL_WINDOW {
            self.samples.pop_front();
        }
    }
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// Frame scheduling
// -----------------------------------------------------------------------------

/// Requests repaints for a live view. Once cancelled, it never schedules
/// another frame.
pub struct FrameScheduler {
    ctx: Option<Context>,
}

impl FrameScheduler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Some(ctx) }
    }

    pub fn request_next_frame(&self) {
        if let Some(ctx) = &self.ctx {
            ctx.request_repaint();
        }
    }

    pub fn request_frame_after(&self, delay: Duration) {
        if let Some(ctx) = &self.ctx {
            ctx.request_repaint_after(delay);
        }
    }

    pub fn cancel(&mut self) {
        self.ctx = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_none()
    }
}

// -----------------------------------------------------------------------------
// Feed and boot log timing
// -----------------------------------------------------------------------------

/// Opacity of the `index`th feed row `elapsed` seconds after the feed appeared.
pub fn entrance_opacity(index: usize, elapsed: f64) -> f32 {
    let local = elapsed - index as f64 * FEED_STAGGER_SECS;
    (local / FEED_FADE_SECS).clamp(0.0, 1.0) as f32
}

pub fn boot_log_lines(elapsed: f64) -> &'static [&'static str] {
    let shown = 1 + (elapsed.max(0.0) / BOOT_LINE_INTERVAL_SECS).floor() as usize;
    &BOOT_LOG[..shown.min(BOOT_LOG.len())]
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
