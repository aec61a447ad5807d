//! Hand-landmark frames → smoothed control scalars.
//!
//! One [`DetectionFrame`] in, one whole [`GestureState`] out. Missing or
//! malformed input is never an error: it counts as "no hands", which pulls the
//! smoothed values toward the configured neutral defaults.

use glam::Vec2;
use morphcloud_platform::{landmark, DetectionFrame, HandLandmarks, Landmark, HAND_LANDMARK_COUNT};

use crate::config::{GestureConfig, OpennessMode};

/// Fingertip reach along the wrist→palm axis, in palm lengths, beyond which a
/// finger counts as extended.
const EXTENDED_REACH: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    pub openness_raw: f32,
    /// Smoothed openness in `[0, 1]`.
    pub openness: f32,
    pub distance_raw: f32,
    /// Smoothed two-hand distance in `[0, 1]`.
    pub distance: f32,
    pub detected: bool,
    pub hands: u8,
}

impl GestureState {
    pub fn neutral(config: &GestureConfig) -> Self {
        Self {
            openness_raw: config.neutral_openness,
            openness: config.neutral_openness,
            distance_raw: config.neutral_distance,
            distance: config.neutral_distance,
            detected: false,
            hands: 0,
        }
    }

    /// Uniform cloud scale for this signal.
    ///
    /// Distance spans `[min_scale, max_scale]`; a closed hand pulls the result
    /// down to `closed_scale` of that.
    pub fn expansion(&self, config: &GestureConfig) -> f32 {
        let spread = config.min_scale + (config.max_scale - config.min_scale) * self.distance;
        let grip = config.closed_scale + (1.0 - config.closed_scale) * self.openness;
        spread * grip
    }
}

pub struct GestureSignalProcessor {
    config: GestureConfig,
    state: GestureState,
}

impl GestureSignalProcessor {
    pub fn new(config: GestureConfig) -> Self {
        let state = GestureState::neutral(&config);
        Self { config, state }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = GestureState::neutral(&self.config);
    }

    /// Consume one detection event and return the updated state.
    pub fn process(&mut self, frame: &DetectionFrame) -> GestureState {
        let hands: Vec<&HandLandmarks> = frame.hands.iter().take(2).collect();
        let well_formed = !hands.is_empty() && hands.iter().all(|h| h.is_well_formed());

        let (openness_raw, distance_raw) = match hands.as_slice() {
            [one] if well_formed => (self.openness(one), self.config.neutral_distance),
            [a, b] if well_formed => (
                self.openness(a).max(self.openness(b)),
                self.hand_distance(a, b),
            ),
            _ => (self.config.neutral_openness, self.config.neutral_distance),
        };

        let factor = self.config.smoothing;
        let previous = self.state;
        self.state = GestureState {
            openness_raw,
            openness: smooth(previous.openness, openness_raw, factor),
            distance_raw,
            distance: smooth(previous.distance, distance_raw, factor),
            detected: well_formed,
            hands: if well_formed { hands.len() as u8 } else { 0 },
        };
        self.state
    }

    /// Openness of one hand in `[0, 1]`.
    pub fn openness(&self, hand: &HandLandmarks) -> f32 {
        let (Some(wrist), Some(palm)) = (hand.get(landmark::WRIST), hand.get(landmark::MIDDLE_MCP))
        else {
            return self.config.neutral_openness;
        };
        let wrist = planar(wrist);
        let axis = planar(palm) - wrist;
        let palm_length = axis.length();
        if palm_length <= f32::EPSILON {
            return self.config.neutral_openness;
        }
        let tips = landmark::FINGERTIPS
            .iter()
            .filter_map(|&i| hand.get(i))
            .map(planar);

        match self.config.openness_mode {
            OpennessMode::FingerCount => {
                let axis = axis / palm_length;
                let extended = tips
                    .filter(|tip| (*tip - wrist).dot(axis) > EXTENDED_REACH * palm_length)
                    .count();
                if extended >= 3 {
                    1.0
                } else {
                    0.0
                }
            }
            OpennessMode::Continuous => {
                let reaches: Vec<f32> = tips.map(|tip| tip.distance(wrist) / palm_length).collect();
                if reaches.is_empty() {
                    return self.config.neutral_openness;
                }
                let mean = reaches.iter().sum::<f32>() / reaches.len() as f32;
                let [curled, extended] = self.config.extension_range;
                ((mean - curled) / (extended - curled)).clamp(0.0, 1.0)
            }
        }
    }

    /// Palm-to-palm distance mapped from the calibration range onto `[0, 1]`.
    pub fn hand_distance(&self, a: &HandLandmarks, b: &HandLandmarks) -> f32 {
        let (Some(pa), Some(pb)) = (a.get(landmark::MIDDLE_MCP), b.get(landmark::MIDDLE_MCP)) else {
            return self.config.neutral_distance;
        };
        let [near, far] = self.config.distance_range;
        ((planar(pa).distance(planar(pb)) - near) / (far - near)).clamp(0.0, 1.0)
    }
}

/// One exponential-moving-average step.
pub fn smooth(current: f32, raw: f32, factor: f32) -> f32 {
    current + (raw - current) * factor
}

/// Image-plane position; landmark depth is relative and not comparable across hands.
fn planar(point: Landmark) -> Vec2 {
    Vec2::new(point.x, point.y)
}

/// A synthetic upright hand with its palm centre at (`palm_x`, `palm_y`).
///
/// `size` is the wrist-to-palm length in normalized image units and
/// `openness` runs from a fist (0) to a flat open hand (1).
pub fn posed_hand(palm_x: f32, palm_y: f32, size: f32, openness: f32) -> HandLandmarks {
    let openness = openness.clamp(0.0, 1.0);
    let wrist = Vec2::new(palm_x, palm_y + size);
    let finger_length = 0.95 * size;
    // Fingers fold back past their knuckles when closed.
    let extension = -0.3 + 1.3 * openness;
    let knuckles = [
        Vec2::new(-0.30, 0.05),
        Vec2::new(0.0, 0.0),
        Vec2::new(0.28, 0.04),
        Vec2::new(0.50, 0.12),
    ];

    let mut points = Vec::with_capacity(HAND_LANDMARK_COUNT);
    points.push(wrist);
    for k in 1..=4 {
        let t = k as f32 / 4.0;
        let reach = 0.4 + 0.4 * openness;
        points.push(wrist + Vec2::new(-0.45 - reach * t, -0.3 - 0.5 * t) * size);
    }
    for offset in knuckles {
        let knuckle = Vec2::new(palm_x, palm_y) + offset * size;
        points.push(knuckle);
        for k in 1..=3 {
            let t = k as f32 / 3.0;
            points.push(knuckle - Vec2::Y * finger_length * extension * t);
        }
    }

    HandLandmarks::new(points.into_iter().map(|p| Landmark::new(p.x, p.y, 0.0)).collect())
}
