//! Morphcloud core engine: platform-agnostic formations, morphing, gesture
//! signal processing and the animation tick.

pub mod config;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod morph;
pub mod shapes;
pub mod slot;

pub use config::{AppearanceConfig, EngineConfig, FireworksConfig, GestureConfig, MotionConfig, OpennessMode};
pub use engine::{Parameter, ParticleEngine};
pub use error::{ConfigError, EngineError, ParameterError};
pub use gesture::{posed_hand, GestureSignalProcessor, GestureState};
pub use morph::{cubic_in_out, FormationState, Phase};
pub use shapes::{Formation, FormationGenerator, ShapeGenerator, ShapeParams, FORMATION_BOUNDS};
pub use slot::{spawn_gesture_source, GestureFeed, LandmarkSlot, SignalSlot, Slot, SourceHandle};
