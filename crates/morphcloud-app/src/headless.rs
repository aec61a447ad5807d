use std::time::{Duration, Instant};

use crossbeam_channel::tick;
use morphcloud_core::{EngineError, Formation, Parameter, ParticleEngine};
use morphcloud_platform::{RenderFrame, Renderer, Result};
use tracing::info;

/// Logs a summary of every `every`-th frame instead of drawing.
pub struct LogRenderer {
    every: u64,
    frames: u64,
}

impl LogRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }

    /// Counts a frame and reports whether it is one to log.
    fn due(&mut self) -> bool {
        self.frames += 1;
        self.frames % self.every == 0
    }
}

/// Formation cycling period from `--cycle` seconds. Zero, negative and
/// non-finite values disable cycling.
pub fn cycle_period(seconds: Option<f32>) -> Option<Duration> {
    seconds
        .filter(|s| s.is_finite() && *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f32(s).ok())
}

/// Per-axis minimum and maximum of an xyz buffer.
pub fn extents(positions: &[f32]) -> Option<([f32; 3], [f32; 3])> {
    let mut points = positions.chunks_exact(3);
    let first = points.next()?;
    let mut lo = [first[0], first[1], first[2]];
    let mut hi = lo;
    for p in points {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    Some((lo, hi))
}

impl Renderer for LogRenderer {
    fn init(&mut self) -> Result<()> {
        info!("headless renderer: logging every {} frames", self.every);
        Ok(())
    }

    fn render_frame(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        if self.due() {
            let t = frame.transform;
            if let Some((lo, hi)) = extents(frame.positions) {
                info!(
                    "frame {}: {} particles, scale {:.2}, rot ({:.2}, {:.2}), x {:.2}..{:.2} y {:.2}..{:.2} z {:.2}..{:.2}",
                    self.frames,
                    frame.particle_count(),
                    t.scale,
                    t.rotation_x,
                    t.rotation_y,
                    lo[0],
                    hi[0],
                    lo[1],
                    hi[1],
                    lo[2],
                    hi[2]
                );
            }
        }
        Ok(())
    }
}

/// Drive `engine` at `fps` for `ticks` frames, optionally cycling formations.
pub fn run(engine: &mut ParticleEngine, ticks: u64, fps: u32, cycle: Option<Duration>) -> std::result::Result<(), EngineError> {
    let ticker = tick(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
    let mut last = Instant::now();
    let mut switched = last;
    let mut next = Formation::ALL
        .iter()
        .position(|f| *f == engine.config().formation)
        .unwrap_or(0);

    for _ in 0..ticks {
        if ticker.recv().is_err() {
            break;
        }
        let now = Instant::now();
        engine.tick((now - last).as_secs_f32())?;
        last = now;

        if let Some(cycle) = cycle {
            if now - switched >= cycle {
                next = (next + 1) % Formation::ALL.len();
                engine.set_parameter(Parameter::Formation(Formation::ALL[next]))?;
                switched = now;
            }
        }
    }
    info!("headless run finished after {} ticks", engine.ticks());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_cover_every_point() {
        let (lo, hi) = extents(&[0.0, 1.0, -1.0, 2.0, -3.0, 0.5, -1.0, 0.0, 4.0]).unwrap();
        assert_eq!(lo, [-1.0, -3.0, -1.0]);
        assert_eq!(hi, [2.0, 1.0, 4.0]);
        assert!(extents(&[]).is_none());
    }

    #[test]
    fn logs_every_nth_frame() {
        let mut renderer = LogRenderer::new(3);
        let due: Vec<u64> = (1..=7).filter(|_| renderer.due()).collect();
        assert_eq!(due, vec![3, 6]);

        let mut every = LogRenderer::new(0);
        assert!(every.due() && every.due());
    }

    #[test]
    fn render_frame_accepts_empty_and_full_frames() {
        let mut renderer = LogRenderer::new(1);
        renderer.init().unwrap();
        let positions = [0.0f32, 1.0, 2.0, -1.0, 0.5, 3.0];
        let colors = [1.0f32; 6];
        let frame = RenderFrame {
            positions: &positions,
            colors: &colors,
            particle_size: 0.02,
            transform: Default::default(),
        };
        renderer.render_frame(&frame).unwrap();
        let empty = RenderFrame {
            positions: &[],
            colors: &[],
            ..frame
        };
        renderer.render_frame(&empty).unwrap();
        assert_eq!(renderer.frames, 2);
    }

    #[test]
    fn cycle_period_ignores_unusable_values() {
        assert_eq!(cycle_period(None), None);
        assert_eq!(cycle_period(Some(0.0)), None);
        assert_eq!(cycle_period(Some(-2.0)), None);
        assert_eq!(cycle_period(Some(f32::INFINITY)), None);
        assert_eq!(cycle_period(Some(f32::NAN)), None);
        assert_eq!(cycle_period(Some(2.5)), Some(Duration::from_millis(2500)));
    }
}
