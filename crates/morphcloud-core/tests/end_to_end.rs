use std::sync::{Arc, Mutex};

use glam::Vec3;
use morphcloud_core::{
    posed_hand, EngineConfig, EngineError, Formation, FormationGenerator, GestureConfig, GestureFeed,
    GestureSignalProcessor, GestureState, ParticleEngine, Phase, ShapeGenerator, SignalSlot,
};
use morphcloud_platform::{DetectionFrame, DetectionSink, RenderFrame, Renderer, Transform};
use rand::RngCore;

#[derive(Default)]
struct Log {
    frames: Vec<(usize, Transform)>,
    last_positions: Vec<f32>,
}

struct Recording(Arc<Mutex<Log>>);

impl Renderer for Recording {
    fn render_frame(&mut self, frame: &RenderFrame<'_>) -> morphcloud_platform::Result<()> {
        let mut log = self.0.lock().unwrap();
        log.frames.push((frame.particle_count(), frame.transform));
        log.last_positions = frame.positions.to_vec();
        Ok(())
    }
}

fn setup(config: EngineConfig) -> (ParticleEngine, GestureFeed, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
    let feed = GestureFeed::new(GestureSignalProcessor::new(config.gesture.clone()), signal.clone());
    let engine = ParticleEngine::new(config, Box::new(Recording(log.clone())), signal).unwrap();
    (engine, feed, log)
}

fn config(count: usize) -> EngineConfig {
    EngineConfig {
        particle_count: count,
        seed: Some(2024),
        ..Default::default()
    }
}

/// Remembers the last buffer the wrapped generator produced.
struct LastOutput {
    inner: ShapeGenerator,
    last: Arc<Mutex<Vec<Vec3>>>,
}

impl FormationGenerator for LastOutput {
    fn generate(&self, formation: Formation, count: usize, rng: &mut dyn RngCore) -> Vec<Vec3> {
        let points = self.inner.generate(formation, count, rng);
        *self.last.lock().unwrap() = points.clone();
        points
    }
}

#[test]
fn heart_settles_on_the_generated_buffer() {
    let mut config = config(1000);
    config.motion.float_amplitude = 0.0;
    let generated = Arc::new(Mutex::new(Vec::new()));
    let generator = LastOutput {
        inner: ShapeGenerator::new(config.shapes.clone()),
        last: generated.clone(),
    };
    let log = Arc::new(Mutex::new(Log::default()));
    let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
    let mut engine =
        ParticleEngine::with_generator(config, Box::new(generator), Box::new(Recording(log.clone())), signal).unwrap();

    let duration = engine.config().motion.transition_seconds;
    let mut elapsed = 0.0;
    while elapsed < duration {
        engine.tick(1.0 / 60.0).unwrap();
        elapsed += 1.0 / 60.0;
    }
    engine.tick(1.0 / 60.0).unwrap();

    assert_eq!(engine.formation_state().phase(), Phase::Idle);
    assert_eq!(engine.formation_state().formation(), Formation::Heart);
    assert_eq!(engine.transform().scale, 1.0);

    let generated = generated.lock().unwrap();
    assert_eq!(generated.len(), 1000);
    let log = log.lock().unwrap();
    assert!(log.frames.iter().all(|(count, _)| *count == 1000));
    assert_eq!(log.last_positions.len(), 3000);
    for (rendered, want) in log.last_positions.chunks_exact(3).zip(generated.iter()) {
        assert!((Vec3::from_slice(rendered) - *want).length() < 1e-5);
    }
    assert_eq!(engine.positions(), log.last_positions.as_slice());
}

#[test]
fn hands_far_apart_reach_maximum_expansion() {
    let (mut engine, mut feed, _log) = setup(config(500));
    let frame = DetectionFrame::with_hands(vec![posed_hand(0.2, 0.5, 0.1, 1.0), posed_hand(0.8, 0.5, 0.1, 1.0)]);
    let factor = GestureConfig::default().smoothing;
    let needed = ((0.01f32).ln() / (1.0 - factor).ln()).ceil() as usize;
    for _ in 0..needed * 2 {
        feed.deliver(frame.clone());
        engine.tick(1.0 / 60.0).unwrap();
    }
    let gesture = engine.gesture();
    assert!(gesture.detected);
    let max = engine.config().gesture.max_scale;
    assert!(engine.transform().scale >= max * 0.99);
}

#[test]
fn lost_hands_drift_back_to_neutral_scale() {
    let (mut engine, mut feed, _log) = setup(config(200));
    let close = DetectionFrame::with_hands(vec![posed_hand(0.45, 0.5, 0.1, 0.0), posed_hand(0.55, 0.5, 0.1, 0.0)]);
    for _ in 0..60 {
        feed.deliver(close.clone());
        engine.tick(0.016).unwrap();
    }
    assert!(engine.transform().scale < 0.5);
    for _ in 0..120 {
        feed.deliver(DetectionFrame::empty());
        engine.tick(0.016).unwrap();
    }
    assert!((engine.transform().scale - 1.0).abs() < 0.01);
}

#[test]
fn fireworks_reburst_after_reset_period() {
    let mut config = config(400);
    config.formation = Formation::Fireworks;
    let reset = config.fireworks.reset_seconds;
    let (mut engine, _feed, _log) = setup(config);
    assert_eq!(engine.formation_state().bursts(), 1);

    let step = 0.125;
    let ticks = (reset / step) as usize - 1;
    for _ in 0..ticks {
        engine.tick(step).unwrap();
    }
    assert_eq!(engine.formation_state().bursts(), 1);
    assert!(engine.formation_state().current().iter().any(|p| p.length() > 0.1));

    engine.tick(step).unwrap();
    assert_eq!(engine.formation_state().bursts(), 2);
    assert!(engine.formation_state().current().iter().all(|p| p.length() < 0.3));
}

#[test]
fn mid_transition_switch_continues_from_screen() {
    let (mut engine, _feed, _log) = setup(config(300));
    for _ in 0..20 {
        engine.tick(0.02).unwrap();
    }
    assert_eq!(engine.formation_state().phase(), Phase::Transitioning);
    let on_screen = engine.formation_state().current().to_vec();
    engine.set_parameter_named("formation", "saturn").unwrap();
    assert_eq!(engine.formation_state().start(), on_screen.as_slice());
    assert_eq!(engine.formation_state().progress(), 0.0);
}

struct Truncating;

impl FormationGenerator for Truncating {
    fn generate(&self, _formation: Formation, count: usize, _rng: &mut dyn RngCore) -> Vec<Vec3> {
        vec![Vec3::ZERO; count.saturating_sub(1)]
    }
}

#[test]
fn short_generator_output_is_fatal() {
    let config = config(64);
    let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
    let log = Arc::new(Mutex::new(Log::default()));
    let result = ParticleEngine::with_generator(config, Box::new(Truncating), Box::new(Recording(log)), signal);
    assert!(matches!(
        result,
        Err(EngineError::BufferLength { expected: 64, actual: 63, .. })
    ));
}
