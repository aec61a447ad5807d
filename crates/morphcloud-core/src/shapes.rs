//! Parametric formation generators.
//!
//! Every generator returns exactly `count` points inside [`FORMATION_BOUNDS`].
//! Randomness comes from the caller's RNG so seeded runs are reproducible.

use std::f32::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Half-extent of the box every formation stays inside, in normalized units.
pub const FORMATION_BOUNDS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Formation {
    #[default]
    Heart,
    Flower,
    Saturn,
    Buddha,
    Fireworks,
}

impl Formation {
    pub const ALL: [Formation; 5] = [
        Formation::Heart,
        Formation::Flower,
        Formation::Saturn,
        Formation::Buddha,
        Formation::Fireworks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Formation::Heart => "Heart",
            Formation::Flower => "Flower",
            Formation::Saturn => "Saturn",
            Formation::Buddha => "Buddha",
            Formation::Fireworks => "Fireworks",
        }
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Formation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formation::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown formation {s:?}"))
    }
}

impl TryFrom<String> for Formation {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Formation> for String {
    fn from(value: Formation) -> Self {
        value.name().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartParams {
    /// Multiplier applied to the classic 16/13 heart curve.
    pub scale: f32,
    /// Outline shrink range across the depth sweep (`min` at the faces, `max` at the rim).
    pub radial_range: [f32; 2],
    pub depth: f32,
    pub jitter: f32,
}

impl Default for HeartParams {
    fn default() -> Self {
        Self {
            scale: 0.1,
            radial_range: [0.7, 1.0],
            depth: 0.5,
            jitter: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowerParams {
    pub petals: u32,
    pub base_radius: f32,
    pub petal_amplitude: f32,
    /// Concentric layers; each inner band is smaller and raised.
    pub bands: u32,
    pub band_spacing: f32,
    pub height_jitter: f32,
    pub radial_jitter: f32,
}

impl Default for FlowerParams {
    fn default() -> Self {
        Self {
            petals: 6,
            base_radius: 0.8,
            petal_amplitude: 0.5,
            bands: 3,
            band_spacing: 0.12,
            height_jitter: 0.3,
            radial_jitter: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturnParams {
    /// Fraction of particles in the planet; the rest form the ring.
    pub planet_share: f32,
    pub planet_radius: [f32; 2],
    pub ring_radius: [f32; 2],
    pub ring_thickness: f32,
    pub ring_tilt_degrees: f32,
}

impl Default for SaturnParams {
    fn default() -> Self {
        Self {
            planet_share: 0.6,
            planet_radius: [0.4, 0.5],
            ring_radius: [0.9, 1.3],
            ring_thickness: 0.05,
            ring_tilt_degrees: 20.0,
        }
    }
}

/// One ellipsoid of the seated figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub weight: f32,
    pub center: Vec3,
    pub radii: Vec3,
    /// Sample the surface only instead of the volume.
    #[serde(default)]
    pub shell: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuddhaParams {
    pub sections: Vec<Section>,
}

impl Default for BuddhaParams {
    fn default() -> Self {
        let section = |name: &str, weight, center, radii, shell| Section {
            name: name.to_string(),
            weight,
            center,
            radii,
            shell,
        };
        Self {
            sections: vec![
                section("head", 0.25, Vec3::new(0.0, 0.9, 0.0), Vec3::splat(0.25), true),
                section("torso", 0.3, Vec3::new(0.0, 0.4, 0.0), Vec3::new(0.35, 0.21, 0.35), true),
                section("base", 0.35, Vec3::ZERO, Vec3::new(0.8, 0.1, 0.8), false),
                section("halo", 0.1, Vec3::new(0.0, 0.95, -0.15), Vec3::new(0.45, 0.45, 0.02), true),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FireworksParams {
    pub bursts: u32,
    /// Burst centres are uniform in `[-center_spread, center_spread]³`.
    pub center_spread: f32,
    pub burst_radius: f32,
    /// Radius of the volumetric scatter that absorbs the remainder.
    pub scatter_radius: f32,
}

impl Default for FireworksParams {
    fn default() -> Self {
        Self {
            bursts: 5,
            center_spread: 1.0,
            burst_radius: 0.5,
            scatter_radius: 1.5,
        }
    }
}

/// Generator parameters for every formation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParams {
    pub heart: HeartParams,
    pub flower: FlowerParams,
    pub saturn: SaturnParams,
    pub buddha: BuddhaParams,
    pub fireworks: FireworksParams,
}

/// Source of formation target buffers.
pub trait FormationGenerator: Send {
    fn generate(&self, formation: Formation, count: usize, rng: &mut dyn RngCore) -> Vec<Vec3>;
}

/// The built-in parametric generators.
#[derive(Debug, Clone, Default)]
pub struct ShapeGenerator {
    pub params: ShapeParams,
}

impl ShapeGenerator {
    pub fn new(params: ShapeParams) -> Self {
        Self { params }
    }
}

impl FormationGenerator for ShapeGenerator {
    fn generate(&self, formation: Formation, count: usize, rng: &mut dyn RngCore) -> Vec<Vec3> {
        let mut points = match formation {
            Formation::Heart => heart(&self.params.heart, count, rng),
            Formation::Flower => flower(&self.params.flower, count, rng),
            Formation::Saturn => saturn(&self.params.saturn, count, rng),
            Formation::Buddha => buddha(&self.params.buddha, count, rng),
            Formation::Fireworks => fireworks(&self.params.fireworks, count, rng),
        };
        let bound = Vec3::splat(FORMATION_BOUNDS);
        for p in &mut points {
            *p = p.clamp(-bound, bound);
        }
        points
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn centered<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random::<f32>() - 0.5
}

pub(crate) fn unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let phi = (2.0 * rng.random::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
    let theta = rng.random::<f32>() * TAU;
    Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
}

fn heart<R: Rng + ?Sized>(params: &HeartParams, count: usize, rng: &mut R) -> Vec<Vec3> {
    // u walks the outline, v walks the depth; laid out as a cols × rows grid.
    let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(cols).max(1);
    let [shrink_min, shrink_max] = params.radial_range;

    (0..count)
        .map(|i| {
            let u = TAU * (i % cols) as f32 / cols as f32;
            let v = PI * ((i / cols) as f32 + 0.5) / rows as f32;
            let outline = lerp(shrink_min, shrink_max, v.sin()) * params.scale;
            let x = 16.0 * u.sin().powi(3);
            let y = 13.0 * u.cos() - 5.0 * (2.0 * u).cos() - 2.0 * (3.0 * u).cos() - (4.0 * u).cos();
            let z = 0.5 * params.depth * v.cos();
            let jitter = Vec3::new(centered(rng), centered(rng), centered(rng)) * 2.0 * params.jitter;
            Vec3::new(x * outline, y * outline, z) + jitter
        })
        .collect()
}

fn flower<R: Rng + ?Sized>(params: &FlowerParams, count: usize, rng: &mut R) -> Vec<Vec3> {
    let bands = params.bands.max(1) as usize;
    let petals = params.petals as f32;

    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            let band = (i % bands) as f32;
            let r = (params.base_radius + params.petal_amplitude * (petals * angle).cos())
                * (1.0 - band * params.band_spacing)
                * (1.0 + rng.random::<f32>() * params.radial_jitter);
            let lift = (band - (bands - 1) as f32 * 0.5) * params.band_spacing;
            Vec3::new(
                r * angle.cos(),
                r * angle.sin(),
                lift + centered(rng) * params.height_jitter,
            )
        })
        .collect()
}

fn saturn<R: Rng + ?Sized>(params: &SaturnParams, count: usize, rng: &mut R) -> Vec<Vec3> {
    let planet = ((count as f32 * params.planet_share.clamp(0.0, 1.0)).floor() as usize).min(count);
    let tilt = params.ring_tilt_degrees.to_radians();
    let [planet_min, planet_max] = params.planet_radius;
    let [ring_min, ring_max] = params.ring_radius;

    let mut points = Vec::with_capacity(count);
    for _ in 0..planet {
        let r = lerp(planet_min, planet_max, rng.random());
        points.push(unit_sphere(rng) * r);
    }
    for _ in planet..count {
        let angle = rng.random::<f32>() * TAU;
        let r = lerp(ring_min, ring_max, rng.random());
        let flat = Vec3::new(r * angle.cos(), centered(rng) * params.ring_thickness, r * angle.sin());
        // Tilt the ring about the x axis.
        let (s, c) = tilt.sin_cos();
        points.push(Vec3::new(flat.x, flat.y * c - flat.z * s, flat.y * s + flat.z * c));
    }
    points
}

fn buddha<R: Rng + ?Sized>(params: &BuddhaParams, count: usize, rng: &mut R) -> Vec<Vec3> {
    let total: f32 = params.sections.iter().map(|s| s.weight.max(0.0)).sum();
    if params.sections.is_empty() || total <= 0.0 {
        return vec![Vec3::ZERO; count];
    }

    let mut cdf = Vec::with_capacity(params.sections.len());
    let mut cumulative = 0.0;
    for section in &params.sections {
        cumulative += section.weight.max(0.0) / total;
        cdf.push(cumulative);
    }

    (0..count)
        .map(|_| {
            let pick: f32 = rng.random();
            let idx = cdf.partition_point(|&c| c <= pick).min(params.sections.len() - 1);
            let section = &params.sections[idx];
            let depth = if section.shell {
                1.0
            } else {
                rng.random::<f32>().cbrt()
            };
            section.center + unit_sphere(rng) * section.radii * depth
        })
        .collect()
}

fn fireworks<R: Rng + ?Sized>(params: &FireworksParams, count: usize, rng: &mut R) -> Vec<Vec3> {
    let bursts = params.bursts as usize;
    let per_burst = if bursts == 0 { 0 } else { count / bursts };

    let mut points = Vec::with_capacity(count);
    for _ in 0..bursts {
        let center = Vec3::new(centered(rng), centered(rng), centered(rng)) * 2.0 * params.center_spread;
        for _ in 0..per_burst {
            points.push(center + unit_sphere(rng) * rng.random::<f32>() * params.burst_radius);
        }
    }
    while points.len() < count {
        points.push(unit_sphere(rng) * rng.random::<f32>() * params.scatter_radius);
    }
    points
}
