use thiserror::Error;

/// Reasons a [`PhysicsConfig`](crate::options::PhysicsConfig) or a flock
/// setup is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must lie in (0, 1], got {value}")]
    Smoothing { name: &'static str, value: f32 },
    #[error("perception radius must be positive, got {0}")]
    PerceptionRadius(f32),
    #[error("at least one neighbour has to be considered")]
    NoNeighbours,
    #[error("span {name} is inverted or not finite: [{min}, {max})")]
    InvertedSpan {
        name: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{name} must be a finite, non-negative duration, got {value}")]
    Duration { name: &'static str, value: f32 },
    #[error("medium separation threshold {medium} exceeds the high one {high}")]
    SeparationBands { medium: f32, high: f32 },
    #[error("oscillation window {check} is longer than the heading history {history}")]
    OscillationWindow { check: usize, history: usize },
    #[error("space bounds must be positive and finite, got {width}x{height}")]
    EmptySpace { width: f32, height: f32 },
}
