use std::{f32::consts::TAU, time::Duration};

use glam::Vec2;
use tracing::debug;

use crate::{
    math_helpers::{wrap_angle, VecExt},
    options::PhysicsConfig,
    random::RandomSource,
};

/// What currently drives an agent. Ordered by precedence, a state can only be
/// preempted by one ranked above it and always expires back to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorState {
    /// full flocking
    Normal,
    /// flocking suppressed, the agent drifts
    Independent { until: Duration },
    /// flocking blended with a random impulse; after `until` the impulse
    /// eases out over the configured ease time
    Scattering {
        until: Duration,
        impulse: Vec2,
        origin: ScatterOrigin,
    },
    /// flocking bypassed, the agent steers straight for `heading`
    Escaping { until: Duration, heading: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatterOrigin {
    Individual,
    Global,
}

impl BehaviorState {
    pub fn precedence(&self) -> u8 {
        match self {
            BehaviorState::Normal => 0,
            BehaviorState::Independent { .. } => 1,
            BehaviorState::Scattering { .. } => 2,
            BehaviorState::Escaping { .. } => 3,
        }
    }
}

/// A state change worth reacting to outside the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    EscapeEnded,
    ScatterStarted,
    ScatterEnded,
    IndependenceStarted,
    IndependenceEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeReason {
    Overcrowding,
    Oscillation,
}

/// Per-agent state machine: the current state plus the timers that outlive
/// any single state.
#[derive(Debug, Clone, PartialEq)]
pub struct Behavior {
    state: BehaviorState,
    /// probability of going independent at each check, fixed at creation
    independence_chance: f32,
    next_independence_check: Duration,
    next_scatter: Duration,
    escape_cooldown_until: Duration,
}

impl Behavior {
    pub fn new(now: Duration, config: &PhysicsConfig, rng: &mut dyn RandomSource) -> Self {
        Behavior {
            state: BehaviorState::Normal,
            independence_chance: config.independence_chance.sample(rng),
            next_independence_check: now.saturating_add(config.independence_check_ms.sample_ms(rng)),
            next_scatter: now.saturating_add(config.scatter_next_ms.sample_ms(rng)),
            escape_cooldown_until: Duration::ZERO,
        }
    }

    pub fn state(&self) -> &BehaviorState {
        &self.state
    }

    pub fn independence_chance(&self) -> f32 {
        self.independence_chance
    }

    pub fn escape_cooldown_until(&self) -> Duration {
        self.escape_cooldown_until
    }

    pub fn is_escaping(&self) -> bool {
        matches!(self.state, BehaviorState::Escaping { .. })
    }

    pub fn is_independent(&self) -> bool {
        matches!(self.state, BehaviorState::Independent { .. })
    }

    pub fn is_scattering(&self) -> bool {
        matches!(self.state, BehaviorState::Scattering { .. })
    }

    /// Escape may fire only outside an escape and past the cooldown
    pub fn can_escape(&self, now: Duration) -> bool {
        !self.is_escaping() && now >= self.escape_cooldown_until
    }

    /// 1 while the scatter holds, then a quadratic ease-out to 0
    pub fn scatter_intensity(&self, now: Duration, ease: Duration) -> f32 {
        match self.state {
            BehaviorState::Scattering { until, .. } => {
                if now < until {
                    1.
                } else if now < until.saturating_add(ease) && !ease.is_zero() {
                    let elapsed = (now - until).as_secs_f32() / ease.as_secs_f32();
                    let remaining = 1. - elapsed;
                    remaining * remaining
                } else {
                    0.
                }
            }
            _ => 0.,
        }
    }

    /// Impulse of the active scatter, if any
    pub fn scatter_impulse(&self) -> Option<Vec2> {
        match self.state {
            BehaviorState::Scattering { impulse, .. } => Some(impulse),
            _ => None,
        }
    }

    /// Closes out a state whose time is up and schedules what follows it
    pub fn expire(
        &mut self,
        now: Duration,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> Option<Transition> {
        match self.state {
            BehaviorState::Escaping { until, .. } if now >= until => {
                self.state = BehaviorState::Normal;
                self.escape_cooldown_until = now.saturating_add(config.escape_cooldown_ms.sample_ms(rng));
                debug!(cooldown_until = ?self.escape_cooldown_until, "escape over");
                Some(Transition::EscapeEnded)
            }
            BehaviorState::Scattering { until, .. } if now >= until.saturating_add(config.scatter_ease()) => {
                self.state = BehaviorState::Normal;
                self.next_scatter = now.saturating_add(config.scatter_next_ms.sample_ms(rng));
                Some(Transition::ScatterEnded)
            }
            BehaviorState::Independent { until } if now >= until => {
                self.state = BehaviorState::Normal;
                self.next_independence_check = now.saturating_add(config.independence_check_ms.sample_ms(rng));
                Some(Transition::IndependenceEnded)
            }
            _ => None,
        }
    }

    /// Random entries: individual scatter when it is due (and the flock is
    /// not already scattering as a whole), otherwise the periodic independence
    /// roll.
    pub fn roll(
        &mut self,
        now: Duration,
        global_scatter_active: bool,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> Option<Transition> {
        let rank = self.state.precedence();

        if rank < 2 && !global_scatter_active && now >= self.next_scatter {
            let duration = config.scatter_individual_ms.sample_ms(rng);
            let impulse = random_impulse(config, rng);
            self.state = BehaviorState::Scattering {
                until: now.saturating_add(duration),
                impulse,
                origin: ScatterOrigin::Individual,
            };
            debug!(?duration, "individual scatter");
            return Some(Transition::ScatterStarted);
        }

        if rank == 0 && now >= self.next_independence_check {
            self.next_independence_check = now.saturating_add(config.independence_check_ms.sample_ms(rng));
            if rng.uniform() < self.independence_chance {
                let duration = config.independence_duration_ms.sample_ms(rng);
                self.state = BehaviorState::Independent {
                    until: now.saturating_add(duration),
                };
                debug!(?duration, "going independent");
                return Some(Transition::IndependenceStarted);
            }
        }

        None
    }

    /// Starts a scatter of the given length unless the agent is escaping.
    pub fn start_scatter(
        &mut self,
        now: Duration,
        duration: Duration,
        impulse: Vec2,
        origin: ScatterOrigin,
    ) -> bool {
        if self.is_escaping() {
            return false;
        }
        self.state = BehaviorState::Scattering {
            until: now.saturating_add(duration),
            impulse,
            origin,
        };
        true
    }

    /// Picks a heading 45°-90° (by default) off the current one, to the left
    /// or right at random, and holds it for a random while. Returns whether
    /// the escape actually started.
    pub fn trigger_escape(
        &mut self,
        now: Duration,
        current_heading: f32,
        reason: EscapeReason,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> bool {
        if !self.can_escape(now) {
            return false;
        }

        let duration = config.escape_duration_ms.sample_ms(rng);
        let offset = config.escape_angle.sample(rng);
        let side = if rng.coin() { 1. } else { -1. };
        let heading = wrap_angle(current_heading + offset * side);

        self.state = BehaviorState::Escaping {
            until: now.saturating_add(duration),
            heading,
        };
        debug!(?reason, ?duration, heading, "escaping");
        true
    }

    /// Forces the state, bypassing precedence. Meant for setting up scenarios.
    pub fn set_state(&mut self, state: BehaviorState) {
        self.state = state;
    }

    pub fn set_escape_cooldown_until(&mut self, until: Duration) {
        self.escape_cooldown_until = until;
    }
}

/// Random direction, magnitude from the configured impulse span
pub fn random_impulse(config: &PhysicsConfig, rng: &mut dyn RandomSource) -> Vec2 {
    let angle = rng.range(0., TAU);
    let speed = config.scatter_impulse.sample(rng);
    Vec2::from_angle(angle, speed)
}

/// Counts direction reversals, i.e. sign flips between consecutive heading
/// changes, in a window of headings.
pub fn count_reversals<'a>(headings: impl Iterator<Item = &'a f32>) -> usize {
    let mut prev_heading: Option<f32> = None;
    let mut prev_change: Option<f32> = None;
    let mut reversals = 0;

    for h in headings {
        if let Some(p) = prev_heading {
            let change = wrap_angle(*h - p);
            if let Some(pc) = prev_change {
                if (change > 0. && pc < 0.) || (change < 0. && pc > 0.) {
                    reversals += 1;
                }
            }
            prev_change = Some(change);
        }
        prev_heading = Some(*h);
    }

    reversals
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use glam::Vec2;

    use super::{count_reversals, Behavior, BehaviorState, EscapeReason, ScatterOrigin, Transition};
    use crate::{options::PhysicsConfig, random::flock_rng};

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn starts_normal_with_timers_in_range() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let b = Behavior::new(secs(1.), &config, &mut rng);

        assert_eq!(*b.state(), BehaviorState::Normal);
        assert!((0.05..0.15).contains(&b.independence_chance()));
        assert!(b.next_independence_check >= secs(4.) && b.next_independence_check <= secs(11.));
        assert!(b.next_scatter >= secs(21.) && b.next_scatter <= secs(61.));
    }

    #[test]
    fn scatter_intensity_eases_out_quadratically() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);
        let ease = config.scatter_ease();

        b.start_scatter(Duration::ZERO, secs(3.), Vec2::X, ScatterOrigin::Global);

        assert_relative_eq!(b.scatter_intensity(secs(1.), ease), 1.);
        // halfway through the 2s ease: (1 - 0.5)^2
        assert_relative_eq!(b.scatter_intensity(secs(4.), ease), 0.25, epsilon = 1e-4);
        assert_relative_eq!(b.scatter_intensity(secs(5.), ease), 0.);
    }

    #[test]
    fn scatter_expires_after_ease() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);

        b.start_scatter(Duration::ZERO, secs(1.), Vec2::X, ScatterOrigin::Individual);

        assert_eq!(b.expire(secs(2.5), &config, &mut rng), None);
        assert_eq!(b.expire(secs(3.), &config, &mut rng), Some(Transition::ScatterEnded));
        assert_eq!(*b.state(), BehaviorState::Normal);
        assert!(b.next_scatter >= secs(23.));
    }

    #[test]
    fn unbounded_timers_saturate() {
        let config = PhysicsConfig {
            scatter_ease_ms: 1e30,
            ..Default::default()
        };
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::MAX, &config, &mut rng);
        assert_eq!(b.next_scatter, Duration::MAX);

        b.start_scatter(secs(1.), Duration::MAX, Vec2::X, ScatterOrigin::Global);
        assert_relative_eq!(b.scatter_intensity(Duration::MAX, config.scatter_ease()), 0.);
        assert_eq!(b.expire(Duration::MAX, &config, &mut rng), Some(Transition::ScatterEnded));
    }

    #[test]
    fn escape_outranks_scatter() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);

        b.start_scatter(secs(1.), secs(3.), Vec2::X, ScatterOrigin::Global);
        assert!(b.trigger_escape(secs(1.), 0., EscapeReason::Overcrowding, &config, &mut rng));
        assert!(b.is_escaping());

        // a scatter cannot take the agent back while it escapes
        assert!(!b.start_scatter(secs(1.5), secs(3.), Vec2::X, ScatterOrigin::Global));
        assert!(b.is_escaping());
    }

    #[test]
    fn escape_heading_is_offset_from_current() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(9));
        for _ in 0..50 {
            let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);
            b.trigger_escape(secs(1.), 0.3, EscapeReason::Oscillation, &config, &mut rng);
            match *b.state() {
                BehaviorState::Escaping { until, heading } => {
                    let offset = (heading - 0.3).abs();
                    assert!(offset >= config.escape_angle.min - 1e-4);
                    assert!(offset <= config.escape_angle.max + 1e-4);
                    assert!(until >= secs(2.5) && until <= secs(4.));
                }
                other => panic!("expected escape, got {:?}", other),
            }
        }
    }

    #[test]
    fn escape_cooldown_blocks_retrigger() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);

        assert!(b.trigger_escape(secs(1.), 0., EscapeReason::Overcrowding, &config, &mut rng));
        assert_eq!(b.expire(secs(5.), &config, &mut rng), Some(Transition::EscapeEnded));

        let cooldown = b.escape_cooldown_until();
        assert!(cooldown >= secs(8.) && cooldown <= secs(10.));

        assert!(!b.trigger_escape(secs(5.1), 0., EscapeReason::Overcrowding, &config, &mut rng));
        assert!(!b.trigger_escape(secs(7.9), 0., EscapeReason::Oscillation, &config, &mut rng));
        assert_eq!(*b.state(), BehaviorState::Normal);

        assert!(b.trigger_escape(cooldown, 0., EscapeReason::Overcrowding, &config, &mut rng));
    }

    #[test]
    fn independence_roll_respects_chance() {
        let config = PhysicsConfig {
            independence_chance: crate::options::Span::new(1., 1.),
            ..Default::default()
        };
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);

        assert_eq!(b.roll(secs(1.), false, &config, &mut rng), None);
        assert_eq!(
            b.roll(secs(10.), false, &config, &mut rng),
            Some(Transition::IndependenceStarted)
        );
        assert!(b.is_independent());

        // 8s is the longest an independence lasts
        assert_eq!(
            b.expire(secs(18.), &config, &mut rng),
            Some(Transition::IndependenceEnded)
        );
        assert_eq!(*b.state(), BehaviorState::Normal);
    }

    #[test]
    fn never_goes_independent_with_zero_chance() {
        let config = PhysicsConfig {
            independence_chance: crate::options::Span::new(0., 0.),
            ..Default::default()
        };
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);
        for s in 1..19 {
            assert_eq!(b.roll(secs(s as f32), false, &config, &mut rng), None);
        }
    }

    #[test]
    fn individual_scatter_waits_for_global_to_end() {
        let config = PhysicsConfig {
            independence_chance: crate::options::Span::new(0., 0.),
            ..Default::default()
        };
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);

        assert_eq!(b.roll(secs(61.), true, &config, &mut rng), None);
        assert!(!b.is_scattering());
        assert_eq!(b.roll(secs(61.), false, &config, &mut rng), Some(Transition::ScatterStarted));
        assert!(b.is_scattering());
    }

    #[test]
    fn individual_scatter_preempts_independence() {
        let config = PhysicsConfig::default();
        let mut rng = flock_rng(Some(1));
        let mut b = Behavior::new(Duration::ZERO, &config, &mut rng);
        b.set_state(BehaviorState::Independent { until: secs(100.) });

        assert_eq!(b.roll(secs(61.), false, &config, &mut rng), Some(Transition::ScatterStarted));
    }

    #[test]
    fn reversals_count_sign_flips() {
        let zigzag = [0., 0.1, 0., 0.1, 0., 0.1];
        assert_eq!(count_reversals(zigzag.iter()), 4);

        let turning = [0., 0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(count_reversals(turning.iter()), 0);
    }

    #[test]
    fn reversals_across_the_pi_seam() {
        // crossing ±π is a small left turn, not a reversal
        let seam = [3.0, 3.1, -3.1, -3.0];
        assert_eq!(count_reversals(seam.iter()), 0);
    }
}
