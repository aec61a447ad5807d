//! Gesture sources for running without a camera.

use std::f32::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, RecvTimeoutError};
use morphcloud_core::posed_hand;
use morphcloud_platform::{DetectionFrame, DetectionSink, GestureSource, Result};
use tracing::{debug, info, warn};

/// Two fabricated hands drifting apart and together while opening and closing.
pub struct SyntheticHands {
    interval: Duration,
    /// Seconds per full apart-and-back cycle.
    period: f32,
}

impl SyntheticHands {
    pub fn new(interval: Duration) -> Self {
        Self { interval, period: 8.0 }
    }

    /// The frame shown `t` seconds into the cycle.
    pub fn frame_at(&self, t: f32) -> DetectionFrame {
        let phase = TAU * t / self.period;
        let half_gap = 0.05 + 0.2 * (1.0 - phase.cos()) / 2.0;
        let openness = (1.0 + (2.0 * phase).sin()) / 2.0;
        DetectionFrame::with_hands(vec![
            posed_hand(0.5 - half_gap, 0.55, 0.12, openness),
            posed_hand(0.5 + half_gap, 0.55, 0.12, openness),
        ])
    }
}

impl GestureSource for SyntheticHands {
    fn run(self: Box<Self>, sink: &mut dyn DetectionSink, stop: &Receiver<()>) -> Result<()> {
        info!("synthetic hands at {:?} intervals", self.interval);
        let ticker = tick(self.interval);
        let started = Instant::now();
        loop {
            select! {
                recv(stop) -> _ => return Ok(()),
                recv(ticker) -> _ => sink.deliver(self.frame_at(started.elapsed().as_secs_f32())),
            }
        }
    }
}

/// Replays recorded detection frames, one JSON object per line.
pub struct ReplaySource {
    path: PathBuf,
    interval: Duration,
    looped: bool,
}

impl ReplaySource {
    pub fn new(path: PathBuf, interval: Duration, looped: bool) -> Self {
        Self { path, interval, looped }
    }
}

impl GestureSource for ReplaySource {
    fn run(self: Box<Self>, sink: &mut dyn DetectionSink, stop: &Receiver<()>) -> Result<()> {
        loop {
            let file = File::open(&self.path).map_err(|e| format!("cannot open {}: {e}", self.path.display()))?;
            info!("replaying {}", self.path.display());
            for (number, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let frame = serde_json::from_str::<DetectionFrame>(&line).unwrap_or_else(|e| {
                    debug!("{}:{}: unreadable frame: {e}", self.path.display(), number + 1);
                    DetectionFrame::empty()
                });
                sink.deliver(frame);
                match stop.recv_timeout(self.interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => return Ok(()),
                }
            }
            if !self.looped {
                warn!("replay {} exhausted", self.path.display());
                sink.deliver(DetectionFrame::empty());
                return Ok(());
            }
        }
    }
}
