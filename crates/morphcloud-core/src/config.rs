//! Engine configuration, loaded from TOML.

use std::path::Path;

use morphcloud_platform::Rgb;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::shapes::{Formation, ShapeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub color: Rgb,
    pub particle_size: f32,
    /// Per-particle brightness jitter, `±color_variation`.
    pub color_variation: f32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            color: Rgb::new(1.0, 107.0 / 255.0, 157.0 / 255.0),
            particle_size: 0.02,
            color_variation: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub transition_seconds: f32,
    pub auto_rotate: bool,
    /// Radians added per tick while auto-rotating.
    pub rotation_step_x: f32,
    pub rotation_step_y: f32,
    pub float_amplitude: f32,
    pub float_frequency: f32,
    /// Longest step fed to the explosive integrator.
    pub max_tick_seconds: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            transition_seconds: 1.5,
            auto_rotate: true,
            rotation_step_x: 0.0,
            rotation_step_y: 0.001,
            float_amplitude: 0.005,
            float_frequency: 2.0,
            max_tick_seconds: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpennessMode {
    /// Open (1.0) when at least 3 of 4 fingertips reach well past the palm
    /// centre along the wrist→palm axis, else closed (0.0).
    #[default]
    FingerCount,
    /// Mean fingertip reach relative to palm size, mapped through `extension_range`.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// EMA factor in `(0, 1]`.
    pub smoothing: f32,
    pub openness_mode: OpennessMode,
    pub neutral_openness: f32,
    pub neutral_distance: f32,
    /// Palm-to-palm calibration range mapped onto `[0, 1]`.
    pub distance_range: [f32; 2],
    /// Fingertip reach / palm length ratios for curled and extended hands.
    pub extension_range: [f32; 2],
    pub min_scale: f32,
    pub max_scale: f32,
    /// Scale multiplier for a fully closed hand.
    pub closed_scale: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.2,
            openness_mode: OpennessMode::FingerCount,
            neutral_openness: 1.0,
            neutral_distance: 0.5,
            distance_range: [0.1, 0.5],
            extension_range: [1.2, 2.0],
            min_scale: 0.5,
            max_scale: 1.5,
            closed_scale: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworksConfig {
    /// Run the burst simulation; when false Fireworks morphs like any formation.
    pub explosive: bool,
    pub reset_seconds: f32,
    pub gravity: f32,
    /// Exponential velocity decay rate, per second.
    pub drag: f32,
    pub speed_range: [f32; 2],
}

impl Default for FireworksConfig {
    fn default() -> Self {
        Self {
            explosive: true,
            reset_seconds: 5.0,
            gravity: 0.8,
            drag: 0.9,
            speed_range: [0.5, 1.8],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed for the engine's lifetime.
    pub particle_count: usize,
    /// Seed for every random draw; `None` seeds from the OS.
    pub seed: Option<u64>,
    pub formation: Formation,
    pub initial_scatter: f32,
    pub appearance: AppearanceConfig,
    pub motion: MotionConfig,
    pub gesture: GestureConfig,
    pub fireworks: FireworksConfig,
    pub shapes: ShapeParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            particle_count: 5000,
            seed: None,
            formation: Formation::Heart,
            initial_scatter: 2.5,
            appearance: AppearanceConfig::default(),
            motion: MotionConfig::default(),
            gesture: GestureConfig::default(),
            fireworks: FireworksConfig::default(),
            shapes: ShapeParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(
            "loaded config {} ({} particles, {})",
            path.display(),
            config.particle_count,
            config.formation
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let ordered = |[lo, hi]: [f32; 2]| lo.is_finite() && hi.is_finite() && lo < hi;

        if !(self.appearance.particle_size.is_finite() && self.appearance.particle_size > 0.0) {
            return invalid(format!("particle_size must be positive, got {}", self.appearance.particle_size));
        }
        if !(0.0..=1.0).contains(&self.appearance.color_variation) {
            return invalid("color_variation must lie in [0, 1]".into());
        }
        if !(self.initial_scatter.is_finite() && self.initial_scatter >= 0.0) {
            return invalid("initial_scatter must be non-negative".into());
        }
        if !(self.motion.transition_seconds.is_finite() && self.motion.transition_seconds >= 0.0) {
            return invalid("transition_seconds must be non-negative".into());
        }
        let m = &self.motion;
        if !(m.max_tick_seconds.is_finite() && m.max_tick_seconds > 0.0) {
            return invalid("max_tick_seconds must be positive".into());
        }
        for (name, value) in [
            ("rotation_step_x", m.rotation_step_x),
            ("rotation_step_y", m.rotation_step_y),
            ("float_amplitude", m.float_amplitude),
            ("float_frequency", m.float_frequency),
        ] {
            if !value.is_finite() {
                return invalid(format!("motion.{name} must be finite, got {value}"));
            }
        }

        let g = &self.gesture;
        if !(g.smoothing > 0.0 && g.smoothing <= 1.0) {
            return invalid(format!("gesture.smoothing must lie in (0, 1], got {}", g.smoothing));
        }
        if !(0.0..=1.0).contains(&g.neutral_openness) || !(0.0..=1.0).contains(&g.neutral_distance) {
            return invalid("gesture neutral values must lie in [0, 1]".into());
        }
        if !ordered(g.distance_range) {
            return invalid("gesture.distance_range must be increasing".into());
        }
        if !ordered(g.extension_range) {
            return invalid("gesture.extension_range must be increasing".into());
        }
        if !(g.min_scale > 0.0 && g.min_scale <= g.max_scale && g.max_scale.is_finite()) {
            return invalid("gesture scales need 0 < min_scale <= max_scale".into());
        }
        if !(0.0..=1.0).contains(&g.closed_scale) {
            return invalid("gesture.closed_scale must lie in [0, 1]".into());
        }

        let f = &self.fireworks;
        if !(f.reset_seconds.is_finite() && f.reset_seconds > 0.0) {
            return invalid("fireworks.reset_seconds must be positive".into());
        }
        if !(f.drag.is_finite() && f.drag >= 0.0) || !f.gravity.is_finite() {
            return invalid("fireworks.drag must be non-negative and gravity finite".into());
        }
        if !(f.speed_range[1].is_finite() && f.speed_range[0] >= 0.0 && f.speed_range[0] <= f.speed_range[1]) {
            return invalid("fireworks.speed_range must be non-negative and ordered".into());
        }

        let saturn = &self.shapes.saturn;
        if !ordered(saturn.planet_radius) || !ordered(saturn.ring_radius) {
            return invalid("saturn radius ranges must be increasing".into());
        }
        if saturn.planet_radius[1] >= saturn.ring_radius[0] {
            return invalid("saturn planet and ring radius ranges overlap".into());
        }
        if !(0.0..=1.0).contains(&saturn.planet_share) {
            return invalid("saturn.planet_share must lie in [0, 1]".into());
        }

        let buddha = &self.shapes.buddha;
        if buddha.sections.is_empty() {
            return invalid("buddha needs at least one section".into());
        }
        if buddha.sections.iter().any(|s| s.weight < 0.0)
            || buddha.sections.iter().map(|s| s.weight).sum::<f32>() <= 0.0
        {
            return invalid("buddha section weights must be non-negative with a positive sum".into());
        }

        if self.shapes.flower.bands == 0 {
            return invalid("flower.bands must be at least 1".into());
        }
        Ok(())
    }
}
