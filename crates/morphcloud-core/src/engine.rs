//! The per-frame scheduler tying signal, formation state and renderer together.

use glam::Vec3;
use morphcloud_platform::{RenderFrame, Renderer, Rgb, Transform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, ParameterError};
use crate::gesture::GestureState;
use crate::morph::FormationState;
use crate::shapes::{Formation, FormationGenerator, ShapeGenerator};
use crate::slot::SignalSlot;

/// A runtime-adjustable control. Particle count is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameter {
    Formation(Formation),
    Color(Rgb),
    ParticleSize(f32),
    AutoRotate(bool),
    /// Radians of Y rotation added per tick.
    RotationSpeed(f32),
}

impl Parameter {
    /// Parse a `(name, value)` pair as sent by a control surface.
    pub fn parse(name: &str, value: &str) -> Result<Self, ParameterError> {
        let invalid = |name: &'static str| ParameterError::InvalidValue {
            name,
            value: value.to_string(),
        };
        let number = |name: &'static str| {
            value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(name))
        };

        match name {
            "formation" => value.parse().map(Self::Formation).map_err(|_| invalid("formation")),
            "color" | "colour" => Rgb::from_hex(value).map(Self::Color).map_err(|_| invalid("color")),
            "particleSize" | "particle_size" => {
                let size = number("particleSize")?;
                if size > 0.0 {
                    Ok(Self::ParticleSize(size))
                } else {
                    Err(invalid("particleSize"))
                }
            }
            "autoRotate" | "auto_rotate" => value
                .trim()
                .parse()
                .map(Self::AutoRotate)
                .map_err(|_| invalid("autoRotate")),
            "rotationSpeed" | "rotation_speed" => number("rotationSpeed").map(Self::RotationSpeed),
            other => Err(ParameterError::UnknownName(other.to_string())),
        }
    }
}

/// Runs one animation tick at a time for a fixed-size particle cloud.
pub struct ParticleEngine {
    config: EngineConfig,
    state: FormationState,
    signal: SignalSlot,
    renderer: Box<dyn Renderer>,
    gesture: GestureState,
    transform: Transform,
    render: Vec<Vec3>,
    colors: Vec<Vec3>,
    rng: StdRng,
    ticks: u64,
}

impl ParticleEngine {
    pub fn new(config: EngineConfig, renderer: Box<dyn Renderer>, signal: SignalSlot) -> Result<Self, EngineError> {
        let generator = Box::new(ShapeGenerator::new(config.shapes.clone()));
        Self::with_generator(config, generator, renderer, signal)
    }

    pub fn with_generator(
        config: EngineConfig,
        generator: Box<dyn FormationGenerator>,
        mut renderer: Box<dyn Renderer>,
        signal: SignalSlot,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let scatter = config.initial_scatter;
        let initial: Vec<Vec3> = (0..config.particle_count)
            .map(|_| (Vec3::new(rng.random(), rng.random(), rng.random()) * 2.0 - Vec3::ONE) * scatter)
            .collect();
        let state = FormationState::new(
            initial,
            config.formation,
            config.motion.transition_seconds,
            config.motion.max_tick_seconds,
            config.fireworks.clone(),
            generator,
            StdRng::from_rng(&mut rng),
        )?;

        renderer.init().map_err(|e| EngineError::Render(e.to_string()))?;
        info!(
            "particle engine ready: {} particles, starting as {}",
            config.particle_count, config.formation
        );

        let mut engine = Self {
            render: state.current().to_vec(),
            colors: Vec::new(),
            gesture: GestureState::neutral(&config.gesture),
            transform: Transform::default(),
            config,
            state,
            signal,
            renderer,
            rng,
            ticks: 0,
        };
        engine.recolor();
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn formation_state(&self) -> &FormationState {
        &self.state
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// The gesture signal read on the latest tick.
    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Flat xyz render buffer of the latest tick.
    pub fn positions(&self) -> &[f32] {
        bytemuck::cast_slice(&self.render)
    }

    /// Flat rgb buffer parallel to [`positions`](Self::positions).
    pub fn colors(&self) -> &[f32] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Advance by `dt` seconds and hand the result to the renderer.
    pub fn tick(&mut self, dt: f32) -> Result<(), EngineError> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.gesture = self.signal.latest();
        let scale = self.gesture.expansion(&self.config.gesture);
        self.state.advance(dt, scale);

        let motion = &self.config.motion;
        if motion.auto_rotate {
            self.transform.rotation_x += motion.rotation_step_x;
            self.transform.rotation_y += motion.rotation_step_y;
        }
        // Explosive mode spends the scale on velocity, not on positions.
        self.transform.scale = if self.state.is_explosive() { 1.0 } else { scale };
        self.fill_render_buffer();
        self.ticks += 1;

        let frame = RenderFrame {
            positions: bytemuck::cast_slice(&self.render),
            colors: bytemuck::cast_slice(&self.colors),
            particle_size: self.config.appearance.particle_size,
            transform: self.transform,
        };
        self.renderer.render_frame(&frame).map_err(|e| {
            warn!("renderer failed on tick {}: {e}", self.ticks);
            EngineError::Render(e.to_string())
        })
    }

    /// Apply a control-surface command.
    pub fn set_parameter(&mut self, parameter: Parameter) -> Result<(), EngineError> {
        match parameter {
            Parameter::Formation(formation) => {
                self.state.set_formation(formation)?;
                self.config.formation = formation;
            }
            Parameter::Color(color) => {
                self.config.appearance.color = color;
                self.recolor();
            }
            Parameter::ParticleSize(size) => {
                if !(size.is_finite() && size > 0.0) {
                    return Err(ParameterError::InvalidValue {
                        name: "particleSize",
                        value: size.to_string(),
                    }
                    .into());
                }
                self.config.appearance.particle_size = size;
            }
            Parameter::AutoRotate(on) => self.config.motion.auto_rotate = on,
            Parameter::RotationSpeed(step) => {
                if !step.is_finite() {
                    return Err(ParameterError::InvalidValue {
                        name: "rotationSpeed",
                        value: step.to_string(),
                    }
                    .into());
                }
                self.config.motion.rotation_step_y = step;
            }
        }
        Ok(())
    }

    pub fn set_parameter_named(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        let parameter = Parameter::parse(name, value)?;
        self.set_parameter(parameter)
    }

    fn fill_render_buffer(&mut self) {
        let current = self.state.current();
        if self.state.is_explosive() {
            self.render.copy_from_slice(current);
            return;
        }
        let scale = self.transform.scale;
        let motion = &self.config.motion;
        let t = self.state.clock() * motion.float_frequency;
        for (i, (out, p)) in self.render.iter_mut().zip(current).enumerate() {
            *out = *p * scale;
            out.y += (t + 3.0 * i as f32 * 0.01).sin() * motion.float_amplitude;
        }
    }

    fn recolor(&mut self) {
        let base = Vec3::from_array(self.config.appearance.color.to_array());
        let spread = self.config.appearance.color_variation;
        let rng = &mut self.rng;
        self.colors = (0..self.state.particle_count())
            .map(|_| {
                let factor = 1.0 + spread * (2.0 * rng.random::<f32>() - 1.0);
                (base * factor).clamp(Vec3::ZERO, Vec3::ONE)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::morph::Phase;

    #[derive(Default)]
    struct Captured {
        frames: usize,
        positions: Vec<f32>,
        colors: Vec<f32>,
        transform: Transform,
    }

    struct Capture(Arc<Mutex<Captured>>);

    impl Renderer for Capture {
        fn render_frame(&mut self, frame: &RenderFrame<'_>) -> morphcloud_platform::Result<()> {
            let mut c = self.0.lock().unwrap();
            c.frames += 1;
            c.positions = frame.positions.to_vec();
            c.colors = frame.colors.to_vec();
            c.transform = frame.transform;
            Ok(())
        }
    }

    struct Broken;

    impl Renderer for Broken {
        fn render_frame(&mut self, _frame: &RenderFrame<'_>) -> morphcloud_platform::Result<()> {
            Err("device lost".into())
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig {
            particle_count: 300,
            seed: Some(42),
            ..Default::default()
        };
        config.motion.float_amplitude = 0.0;
        config
    }

    fn engine(config: EngineConfig) -> (ParticleEngine, SignalSlot, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
        let engine = ParticleEngine::new(config, Box::new(Capture(captured.clone())), signal.clone()).unwrap();
        (engine, signal, captured)
    }

    #[test]
    fn parses_named_parameters() {
        assert_eq!(
            Parameter::parse("formation", "Saturn").unwrap(),
            Parameter::Formation(Formation::Saturn)
        );
        assert_eq!(
            Parameter::parse("color", "#ffffff").unwrap(),
            Parameter::Color(Rgb::new(1.0, 1.0, 1.0))
        );
        assert_eq!(Parameter::parse("particleSize", "0.05").unwrap(), Parameter::ParticleSize(0.05));
        assert_eq!(Parameter::parse("autoRotate", "false").unwrap(), Parameter::AutoRotate(false));
        assert_eq!(Parameter::parse("rotationSpeed", "0.01").unwrap(), Parameter::RotationSpeed(0.01));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            Parameter::parse("particleCount", "10"),
            Err(ParameterError::UnknownName(_))
        ));
        assert!(matches!(
            Parameter::parse("particleSize", "-1"),
            Err(ParameterError::InvalidValue { name: "particleSize", .. })
        ));
        assert!(Parameter::parse("particleSize", "NaN").is_err());
        assert!(Parameter::parse("formation", "cube").is_err());
        assert!(Parameter::parse("autoRotate", "maybe").is_err());
    }

    #[test]
    fn tick_hands_a_full_frame_to_the_renderer() {
        let (mut engine, _signal, captured) = engine(config());
        engine.tick(1.0 / 60.0).unwrap();
        let c = captured.lock().unwrap();
        assert_eq!(c.frames, 1);
        assert_eq!(c.positions.len(), 900);
        assert_eq!(c.colors.len(), 900);
        assert_eq!(c.positions.as_slice(), engine.positions());
    }

    #[test]
    fn neutral_signal_renders_canonical_positions() {
        let (mut engine, _signal, _captured) = engine(config());
        engine.tick(0.5).unwrap();
        assert!((engine.transform().scale - 1.0).abs() < 1e-6);
        let canonical: &[f32] = bytemuck::cast_slice(engine.formation_state().current());
        for (a, b) in engine.positions().iter().zip(canonical) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn float_shimmer_phase_advances_three_hundredths_per_particle() {
        let mut config = config();
        config.motion.float_amplitude = 0.05;
        config.motion.float_frequency = 2.0;
        let (mut engine, _signal, _captured) = engine(config);
        engine.tick(0.5).unwrap();

        let scale = engine.transform().scale;
        let t = engine.formation_state().clock() * 2.0;
        let current = engine.formation_state().current();
        for (i, (rendered, p)) in engine.positions().chunks_exact(3).zip(current).enumerate() {
            let expected = p.y * scale + (t + 3.0 * i as f32 * 0.01).sin() * 0.05;
            assert!((rendered[1] - expected).abs() < 1e-5, "particle {i}");
            assert!((rendered[0] - p.x * scale).abs() < 1e-5);
        }
    }

    #[test]
    fn scale_is_baked_into_render_buffer_only() {
        let (mut engine, signal, _captured) = engine(config());
        signal.publish(GestureState {
            distance: 1.0,
            openness: 1.0,
            detected: true,
            hands: 2,
            ..signal.latest()
        });
        engine.tick(0.1).unwrap();
        let scale = engine.transform().scale;
        assert_eq!(scale, engine.config().gesture.max_scale);
        let current = engine.formation_state().current().to_vec();
        let rendered: &[Vec3] = bytemuck::cast_slice(engine.positions());
        for (r, p) in rendered.iter().zip(&current) {
            assert!((*r - *p * scale).length() < 1e-5);
        }
    }

    #[test]
    fn auto_rotate_accumulates_per_tick() {
        let (mut engine, _signal, _captured) = engine(config());
        for _ in 0..10 {
            engine.tick(0.016).unwrap();
        }
        let step = engine.config().motion.rotation_step_y;
        assert!((engine.transform().rotation_y - 10.0 * step).abs() < 1e-6);

        engine.set_parameter_named("autoRotate", "false").unwrap();
        engine.tick(0.016).unwrap();
        assert!((engine.transform().rotation_y - 10.0 * step).abs() < 1e-6);
    }

    #[test]
    fn non_finite_rotation_speed_is_rejected() {
        let (mut engine, _signal, _captured) = engine(config());
        let before = engine.config().motion.rotation_step_y;
        assert!(matches!(
            engine.set_parameter(Parameter::RotationSpeed(f32::NAN)),
            Err(EngineError::Parameter(ParameterError::InvalidValue { name: "rotationSpeed", .. }))
        ));
        assert!(engine.set_parameter(Parameter::RotationSpeed(f32::INFINITY)).is_err());
        assert_eq!(engine.config().motion.rotation_step_y, before);

        engine.tick(0.016).unwrap();
        assert!(engine.positions().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn formation_parameter_starts_a_transition() {
        let (mut engine, _signal, _captured) = engine(config());
        engine.tick(10.0).unwrap();
        assert_eq!(engine.formation_state().phase(), Phase::Idle);
        engine.set_parameter(Parameter::Formation(Formation::Flower)).unwrap();
        assert_eq!(engine.formation_state().phase(), Phase::Transitioning);
        assert_eq!(engine.config().formation, Formation::Flower);
    }

    #[test]
    fn color_change_regenerates_varied_colours() {
        let (mut engine, _signal, captured) = engine(config());
        engine.set_parameter_named("color", "#808080").unwrap();
        engine.tick(0.016).unwrap();
        let colors = captured.lock().unwrap().colors.clone();
        let base = 128.0 / 255.0;
        let v = engine.config().appearance.color_variation;
        assert!(colors.iter().all(|c| *c >= base * (1.0 - v) - 1e-5 && *c <= base * (1.0 + v) + 1e-5));
        assert!(colors.iter().any(|c| (c - base).abs() > 1e-4));
    }

    #[test]
    fn renderer_failure_is_reported() {
        let config = config();
        let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
        let mut engine = ParticleEngine::new(config, Box::new(Broken), signal).unwrap();
        assert!(matches!(engine.tick(0.016), Err(EngineError::Render(msg)) if msg.contains("device lost")));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = config();
        config.gesture.smoothing = 0.0;
        let signal = SignalSlot::new(GestureState::neutral(&config.gesture));
        let captured = Arc::new(Mutex::new(Captured::default()));
        assert!(matches!(
            ParticleEngine::new(config, Box::new(Capture(captured)), signal),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn bad_dt_does_not_move_anything() {
        let (mut engine, _signal, _captured) = engine(config());
        let before = engine.formation_state().current().to_vec();
        engine.tick(f32::NAN).unwrap();
        engine.tick(-1.0).unwrap();
        assert_eq!(engine.formation_state().current(), before.as_slice());
    }

    #[test]
    fn explosive_fireworks_leave_positions_unscaled() {
        let mut config = config();
        config.formation = Formation::Fireworks;
        let (mut engine, _signal, _captured) = engine(config);
        engine.tick(0.05).unwrap();
        assert!(engine.formation_state().is_explosive());
        assert_eq!(engine.transform().scale, 1.0);
        let canonical: &[f32] = bytemuck::cast_slice(engine.formation_state().current());
        assert_eq!(engine.positions(), canonical);
    }
}
