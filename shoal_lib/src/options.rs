use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, random::RandomSource};

/// Inclusive-exclusive range a per-agent random value is drawn from.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Span {
    pub min: f32,
    pub max: f32,
}

impl Span {
    pub const fn new(min: f32, max: f32) -> Self {
        Span { min, max }
    }

    pub fn sample(&self, rng: &mut dyn RandomSource) -> f32 {
        rng.range(self.min, self.max)
    }

    /// Samples the span as a number of milliseconds
    pub fn sample_ms(&self, rng: &mut dyn RandomSource) -> Duration {
        millis(self.sample(rng))
    }

    fn check(&self, name: &'static str) -> Result<(), ConfigError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(ConfigError::InvertedSpan {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Converts a (possibly fractional) count of milliseconds into a duration,
/// negative values saturate to zero and values too large for a duration to
/// [`Duration::MAX`].
pub fn millis(ms: f32) -> Duration {
    Duration::try_from_secs_f32(ms.max(0.) / 1000.).unwrap_or(Duration::MAX)
}

/// Relative weights of the three flocking rules.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct ForceWeights {
    pub alignment: f32,
    pub cohesion: f32,
    pub separation: f32,
}

impl ForceWeights {
    pub const UNIT: ForceWeights = ForceWeights {
        alignment: 1.,
        cohesion: 1.,
        separation: 1.,
    };

    pub fn scaled(&self, factor: f32) -> Self {
        ForceWeights {
            alignment: self.alignment * factor,
            cohesion: self.cohesion * factor,
            separation: self.separation * factor,
        }
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
// {"type": "Grid"}
pub enum NeighbourSearch {
    /// brute force O(n) per agent
    Naive,
    /// uniform grid, cell size derived from the perception radius
    Grid,
}

/// Size of the toroidal space the flock lives in, `[0, width) x [0, height)`.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct SpaceBounds {
    pub width: f32,
    pub height: f32,
}

impl SpaceBounds {
    pub fn new(width: f32, height: f32) -> Self {
        SpaceBounds { width, height }
    }

    pub(crate) fn check(&self) -> Result<(), ConfigError> {
        let finite = self.width.is_finite() && self.height.is_finite();
        if !(finite && self.width > 0. && self.height > 0.) {
            return Err(ConfigError::EmptySpace {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl Default for SpaceBounds {
    fn default() -> Self {
        SpaceBounds::new(800., 600.)
    }
}

/// Per-frame tunables, owned and mutated by whoever drives the flock
/// (control panel, CLI).
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct FlockParams {
    pub max_speed: f32,
    pub max_force: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub separation_weight: f32,
    pub audio_reactivity: f32,
}

impl FlockParams {
    pub fn weights(&self) -> ForceWeights {
        ForceWeights {
            alignment: self.alignment_weight,
            cohesion: self.cohesion_weight,
            separation: self.separation_weight,
        }
    }
}

impl Default for FlockParams {
    fn default() -> Self {
        FlockParams {
            max_speed: 0.5,
            max_force: 0.1,
            alignment_weight: 1.2,
            cohesion_weight: 1.0,
            separation_weight: 0.5,
            audio_reactivity: 0.5,
        }
    }
}

/// Output of an external audio analyser, both values roughly in `[0, 1]`.
#[derive(Debug, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Modulation {
    /// overall loudness, speeds the flock up
    pub amplitude: f32,
    /// low band energy, pushes agents apart
    pub bass: f32,
}

impl Modulation {
    pub fn amplitude(amplitude: f32) -> Self {
        Modulation {
            amplitude,
            bass: 0.,
        }
    }
}

/// Physics tuning of a flock. Read-only while a frame is computed.
///
/// Durations are expressed in milliseconds, angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub perception_radius: f32,
    pub max_neighbours: usize,
    pub neighbour_search: NeighbourSearch,

    /// blend factor from last frame's force towards this frame's (0..=1)
    pub force_smoothing: f32,
    /// blend factor from current velocity towards target velocity (0..=1)
    pub velocity_smoothing: f32,
    pub dead_zone_threshold: f32,

    pub damping_coefficient: f32,
    pub min_speed_for_damping: f32,

    /// neighbours closer than `perception_radius * separation_radius_factor` repel
    pub separation_radius_factor: f32,
    /// floor for the separation divisor
    pub separation_min_distance: f32,

    pub separation_high_threshold: f32,
    pub separation_med_threshold: f32,
    pub prioritize_high: ForceWeights,
    pub prioritize_medium: ForceWeights,

    pub overcrowding_neighbour_limit: usize,
    pub overcrowding_force_limit: f32,

    pub escape_duration_ms: Span,
    pub escape_cooldown_ms: Span,
    pub escape_angle: Span,
    /// escape target speed relative to max speed
    pub escape_speed_factor: f32,
    /// escape steering cap relative to max force
    pub escape_force_factor: f32,

    pub oscillation_detection: bool,
    pub oscillation_history_length: usize,
    pub oscillation_check_length: usize,
    pub oscillation_reversal_threshold: usize,

    pub independence_check_ms: Span,
    pub independence_chance: Span,
    pub independence_duration_ms: Span,

    pub scatter_ease_ms: f32,
    pub scatter_force_multiplier: f32,
    pub scatter_speed_boost: f32,
    pub scatter_individual_ms: Span,
    pub scatter_next_ms: Span,
    pub scatter_impulse: Span,
    /// share of agents that has to be scattering for the flock to count as
    /// globally scattered
    pub global_scatter_fraction: f32,
    pub global_scatter_intensity: f32,

    pub speed_multiplier: Span,
    pub size_multiplier: Span,
    pub initial_speed: Span,

    pub bass_separation_boost: f32,

    pub seed: Option<u64>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            perception_radius: 50.,
            max_neighbours: 8,
            neighbour_search: NeighbourSearch::Grid,

            force_smoothing: 0.25,
            velocity_smoothing: 0.15,
            dead_zone_threshold: 0.01,

            damping_coefficient: 0.45,
            min_speed_for_damping: 0.1,

            separation_radius_factor: 0.7,
            separation_min_distance: 8.,

            separation_high_threshold: 0.05,
            separation_med_threshold: 0.02,
            prioritize_high: ForceWeights {
                separation: 0.9,
                alignment: 0.1,
                cohesion: 0.1,
            },
            prioritize_medium: ForceWeights {
                separation: 0.7,
                alignment: 0.5,
                cohesion: 0.5,
            },

            overcrowding_neighbour_limit: 15,
            overcrowding_force_limit: 0.25,

            escape_duration_ms: Span::new(1500., 3000.),
            escape_cooldown_ms: Span::new(3000., 5000.),
            escape_angle: Span::new(FRAC_PI_4, FRAC_PI_2),
            escape_speed_factor: 1.2,
            escape_force_factor: 2.,

            oscillation_detection: true,
            oscillation_history_length: 10,
            oscillation_check_length: 6,
            oscillation_reversal_threshold: 3,

            independence_check_ms: Span::new(3000., 10000.),
            independence_chance: Span::new(0.05, 0.15),
            independence_duration_ms: Span::new(2000., 8000.),

            scatter_ease_ms: 2000.,
            scatter_force_multiplier: 5.,
            scatter_speed_boost: 0.3,
            scatter_individual_ms: Span::new(1000., 2500.),
            scatter_next_ms: Span::new(20000., 60000.),
            scatter_impulse: Span::new(0.8, 1.5),
            global_scatter_fraction: 0.5,
            global_scatter_intensity: 0.5,

            speed_multiplier: Span::new(0.6, 1.3),
            size_multiplier: Span::new(0.6, 1.4),
            initial_speed: Span::new(0.5, 1.5),

            bass_separation_boost: 1.5,

            seed: None,
        }
    }
}

impl PhysicsConfig {
    pub fn scatter_ease(&self) -> Duration {
        millis(self.scatter_ease_ms)
    }

    /// Radius inside which neighbours contribute to separation
    pub fn separation_radius(&self, perception_radius: f32) -> f32 {
        perception_radius * self.separation_radius_factor
    }

    /// Checks the knobs are mutually consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("force_smoothing", self.force_smoothing),
            ("velocity_smoothing", self.velocity_smoothing),
        ] {
            if !(value > 0. && value <= 1.) {
                return Err(ConfigError::Smoothing { name, value });
            }
        }

        if !(self.perception_radius > 0.) {
            return Err(ConfigError::PerceptionRadius(self.perception_radius));
        }

        if self.max_neighbours == 0 {
            return Err(ConfigError::NoNeighbours);
        }

        if self.separation_med_threshold > self.separation_high_threshold {
            return Err(ConfigError::SeparationBands {
                medium: self.separation_med_threshold,
                high: self.separation_high_threshold,
            });
        }

        if self.oscillation_check_length > self.oscillation_history_length {
            return Err(ConfigError::OscillationWindow {
                check: self.oscillation_check_length,
                history: self.oscillation_history_length,
            });
        }

        if !(self.scatter_ease_ms >= 0. && self.scatter_ease_ms.is_finite()) {
            return Err(ConfigError::Duration {
                name: "scatter_ease_ms",
                value: self.scatter_ease_ms,
            });
        }

        for (name, span) in [
            ("escape_duration_ms", self.escape_duration_ms),
            ("escape_cooldown_ms", self.escape_cooldown_ms),
            ("escape_angle", self.escape_angle),
            ("independence_check_ms", self.independence_check_ms),
            ("independence_chance", self.independence_chance),
            ("independence_duration_ms", self.independence_duration_ms),
            ("scatter_individual_ms", self.scatter_individual_ms),
            ("scatter_next_ms", self.scatter_next_ms),
            ("scatter_impulse", self.scatter_impulse),
            ("speed_multiplier", self.speed_multiplier),
            ("size_multiplier", self.size_multiplier),
            ("initial_speed", self.initial_speed),
        ] {
            span.check(name)?;
        }

        Ok(())
    }
}
