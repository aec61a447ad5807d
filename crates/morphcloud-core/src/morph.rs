//! Formation state: eased morphing between formations and the fireworks
//! burst simulation.
//!
//! `Idle → Transitioning → Idle` for ordinary formations. An explosive
//! Fireworks formation runs `Exploding` instead and re-bursts on a fixed period
//! until another formation is selected.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use crate::config::FireworksConfig;
use crate::error::EngineError;
use crate::shapes::{unit_sphere, Formation, FormationGenerator};

/// Cubic ease-in-out.
pub fn cubic_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transitioning,
    Exploding,
}

pub struct FormationState {
    formation: Formation,
    phase: Phase,
    current: Vec<Vec3>,
    target: Vec<Vec3>,
    start: Vec<Vec3>,
    velocity: Vec<Vec3>,
    progress: f32,
    started_at: f32,
    duration: f32,
    /// Simulated seconds since construction.
    clock: f32,
    burst_at: f32,
    bursts: u64,
    max_step: f32,
    fireworks: FireworksConfig,
    generator: Box<dyn FormationGenerator>,
    rng: StdRng,
}

impl FormationState {
    /// Start from `initial` positions and begin a transition into `formation`.
    pub fn new(
        initial: Vec<Vec3>,
        formation: Formation,
        transition_seconds: f32,
        max_step: f32,
        fireworks: FireworksConfig,
        generator: Box<dyn FormationGenerator>,
        rng: StdRng,
    ) -> Result<Self, EngineError> {
        let count = initial.len();
        let mut state = Self {
            formation,
            phase: Phase::Idle,
            target: initial.clone(),
            start: initial.clone(),
            velocity: vec![Vec3::ZERO; count],
            current: initial,
            progress: 1.0,
            started_at: 0.0,
            duration: transition_seconds,
            clock: 0.0,
            burst_at: 0.0,
            bursts: 0,
            max_step,
            fireworks,
            generator,
            rng,
        };
        state.set_formation(formation)?;
        Ok(state)
    }

    pub fn particle_count(&self) -> usize {
        self.current.len()
    }

    pub fn formation(&self) -> Formation {
        self.formation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    pub fn current(&self) -> &[Vec3] {
        &self.current
    }

    pub fn target(&self) -> &[Vec3] {
        &self.target
    }

    pub fn start(&self) -> &[Vec3] {
        &self.start
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocity
    }

    pub fn is_explosive(&self) -> bool {
        self.phase == Phase::Exploding
    }

    /// Switch formations.
    ///
    /// An in-flight transition is cancelled: the positions currently on screen
    /// become the new start buffer. The target is generated and length-checked
    /// before any buffer is touched.
    pub fn set_formation(&mut self, formation: Formation) -> Result<(), EngineError> {
        let count = self.current.len();
        let target = self.generator.generate(formation, count, &mut self.rng);
        if target.len() != count {
            return Err(EngineError::BufferLength {
                formation,
                expected: count,
                actual: target.len(),
            });
        }

        info!(
            "formation {} -> {} ({:?} at {:.0}%)",
            self.formation,
            formation,
            self.phase,
            self.progress * 100.0
        );
        self.formation = formation;
        self.target = target;

        if formation == Formation::Fireworks && self.fireworks.explosive {
            self.phase = Phase::Exploding;
            self.progress = 1.0;
            self.burst();
            return Ok(());
        }

        self.start.clone_from(&self.current);
        self.velocity.fill(Vec3::ZERO);
        self.started_at = self.clock;
        self.progress = 0.0;
        self.phase = Phase::Transitioning;
        if self.duration <= 0.0 {
            self.finish_transition();
        }
        Ok(())
    }

    /// Advance by `dt` seconds. `velocity_scale` multiplies burst velocities.
    pub fn advance(&mut self, dt: f32, velocity_scale: f32) {
        let dt = dt.max(0.0);
        self.clock += dt;
        match self.phase {
            Phase::Idle => {}
            Phase::Transitioning => self.interpolate(),
            Phase::Exploding => self.integrate(dt.min(self.max_step), velocity_scale),
        }
    }

    fn interpolate(&mut self) {
        let elapsed = self.clock - self.started_at;
        let progress = if self.duration > 0.0 {
            (elapsed / self.duration).min(1.0)
        } else {
            1.0
        };
        self.progress = self.progress.max(progress);
        if self.progress >= 1.0 {
            self.finish_transition();
            return;
        }

        let eased = cubic_in_out(self.progress);
        for ((current, start), target) in self.current.iter_mut().zip(&self.start).zip(&self.target) {
            *current = *start + (*target - *start) * eased;
        }
    }

    fn finish_transition(&mut self) {
        self.progress = 1.0;
        self.current.clone_from(&self.target);
        self.phase = Phase::Idle;
    }

    fn integrate(&mut self, dt: f32, velocity_scale: f32) {
        let gravity = Vec3::new(0.0, -self.fireworks.gravity * dt, 0.0);
        let damping = (-self.fireworks.drag * dt).exp();
        for (position, velocity) in self.current.iter_mut().zip(self.velocity.iter_mut()) {
            *position += *velocity * velocity_scale * dt;
            *velocity = (*velocity + gravity) * damping;
        }

        if self.clock - self.burst_at >= self.fireworks.reset_seconds {
            self.burst();
        }
    }

    /// Collapse every particle to the origin and launch it outward again.
    fn burst(&mut self) {
        let [slow, fast] = self.fireworks.speed_range;
        self.current.fill(Vec3::ZERO);
        for velocity in &mut self.velocity {
            let speed = slow + (fast - slow) * self.rng.random::<f32>();
            *velocity = unit_sphere(&mut self.rng) * speed;
        }
        self.burst_at = self.clock;
        self.bursts += 1;
        debug!("fireworks burst #{} at t={:.2}s", self.bursts, self.clock);
    }
}
