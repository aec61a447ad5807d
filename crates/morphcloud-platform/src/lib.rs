//! Collaborator traits and boundary data so `morphcloud-core` stays host-agnostic.
//!
//! Everything the engine exchanges with the outside world lives here: the
//! hand-landmark frames produced by a detection model, the flat buffers handed
//! to a renderer, and the colour type shared with control surfaces.

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Points per hand in the MediaPipe hand topology.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Landmark indices used by the gesture pipeline.
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const INDEX_TIP: usize = 8;
    /// Middle-finger knuckle; used as the palm centre.
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;

    /// The four non-thumb fingertips.
    pub const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
}

/// Bones of the hand skeleton, as landmark index pairs. Used for overlays.
pub const HAND_CONNECTIONS: [(usize, usize); 23] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (0, 9), (9, 10), (10, 11), (11, 12),
    (0, 13), (13, 14), (14, 15), (15, 16),
    (0, 17), (17, 18), (18, 19), (19, 20),
    (5, 9), (9, 13), (13, 17),
];

/// One joint in normalized image space (`x`, `y` in `[0, 1]`, `y` pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Ordered landmark set describing one detected hand.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks {
    pub points: Vec<Landmark>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    /// Full topology with finite coordinates.
    pub fn is_well_formed(&self) -> bool {
        self.points.len() == HAND_LANDMARK_COUNT && self.points.iter().all(Landmark::is_finite)
    }
}

/// One detection result: zero, one or two hands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

impl DetectionFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hands(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("invalid colour {0:?}, expected #rrggbb")]
pub struct InvalidColor(pub String);

/// Linear RGB colour with channels in `[0, 1]`. Serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(text: &str) -> std::result::Result<Self, InvalidColor> {
        let digits = text.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidColor(text.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| InvalidColor(text.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(&self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl TryFrom<String> for Rgb {
    type Error = InvalidColor;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Rgb::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Whole-cloud transform derived each tick.
///
/// `scale` is already applied to the positions of the accompanying
/// [`RenderFrame`]; it is exposed so overlays can follow the cloud.
/// Rotations are radians and are left to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: f32,
    pub rotation_x: f32,
    pub rotation_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
        }
    }
}

/// Borrowed view of one finished tick, handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    /// `3 × particle_count` floats, xyz interleaved.
    pub positions: &'a [f32],
    /// `3 × particle_count` floats, rgb interleaved.
    pub colors: &'a [f32],
    pub particle_size: f32,
    pub transform: Transform,
}

impl RenderFrame<'_> {
    pub fn particle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Draws finished frames. The engine never issues draw calls itself.
pub trait Renderer: Send {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }
    fn render_frame(&mut self, frame: &RenderFrame<'_>) -> Result<()>;
}

/// Receives detection results from a [`GestureSource`].
pub trait DetectionSink: Send {
    fn deliver(&mut self, frame: DetectionFrame);
    /// The source cannot produce frames (camera denied, model missing, ...).
    fn unavailable(&mut self, reason: &str);
}

/// Producer of hand-landmark frames, run on its own thread.
pub trait GestureSource: Send + 'static {
    /// Produce frames into `sink` until `stop` fires or the source is exhausted.
    fn run(self: Box<Self>, sink: &mut dyn DetectionSink, stop: &Receiver<()>) -> Result<()>;
}
