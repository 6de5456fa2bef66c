use std::time::Duration;

use shoal_lib::{
    clock::ManualClock,
    error::ConfigError,
    flock::Flock,
    options::{FlockParams, PhysicsConfig, SpaceBounds, Span},
    random::flock_rng,
    run_flock,
    stats::FrameStats,
};

fn seeded(seed: u64) -> PhysicsConfig {
    PhysicsConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

fn lively() -> FlockParams {
    FlockParams {
        max_speed: 2.,
        max_force: 0.1,
        ..Default::default()
    }
}

#[test]
fn flock_settles_without_blowing_up() {
    let bounds = SpaceBounds::new(800., 600.);
    let mut flock = Flock::new(50, bounds, seeded(2024)).unwrap();
    let params = lively();

    let mut neighbour_means = Vec::new();
    for _ in 0..600 {
        flock.update(&params, 0.);
        neighbour_means.push(FrameStats::measure(&flock).mean_neighbours);
    }

    for b in flock.boids() {
        assert!(b.position.is_finite() && b.velocity.is_finite());
        assert!((0. ..800.).contains(&b.position.x));
        assert!((0. ..600.).contains(&b.position.y));
    }

    let stats = FrameStats::measure(&flock);
    assert!(stats.mean_speed > 0.05, "flock stalled: {:?}", stats);

    let tail = &neighbour_means[500..];
    let mean = tail.iter().sum::<f32>() / tail.len() as f32;
    let variance = tail.iter().map(|m| (m - mean).powi(2)).sum::<f32>() / tail.len() as f32;
    assert!(variance < 4., "neighbour count swings: variance {}", variance);

    let biggest_jump = tail
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0., f32::max);
    assert!(biggest_jump < 1.5, "neighbour count jumped by {}", biggest_jump);
}

#[test]
fn speed_never_exceeds_its_cap() {
    let mut flock = Flock::new(40, SpaceBounds::default(), seeded(9)).unwrap();
    let params = lively();
    let config = flock.config().clone();

    for frame in 0..300 {
        let amplitude = if frame % 50 < 25 { 0.8 } else { 0. };
        let before: Vec<f32> = flock.boids().iter().map(|b| b.velocity.length()).collect();

        flock.update(&params, amplitude);

        let intensities = flock.scatter_intensities();
        for ((b, prev), intensity) in flock.boids().iter().zip(before).zip(intensities) {
            let cap = b.effective_max_speed(
                &params,
                &shoal_lib::options::Modulation::amplitude(amplitude),
                intensity,
                &config,
            );
            assert!(
                b.velocity.length() <= prev.max(cap) + 1e-4,
                "agent {} at {} over cap {}",
                b.id,
                b.velocity.length(),
                cap
            );
        }
    }
}

#[test]
fn global_scatter_rises_and_eases_out() {
    let mut flock = Flock::with_clock_and_rng(
        50,
        SpaceBounds::default(),
        PhysicsConfig::default(),
        ManualClock::new(),
        flock_rng(Some(31)),
    )
    .unwrap();
    let params = FlockParams::default();

    flock.clock_mut().set(Duration::from_secs(1));
    flock.trigger_global_scatter(Duration::from_millis(3000));

    flock.clock_mut().advance(Duration::from_millis(16));
    flock.update(&params, 0.);
    assert!(flock.scatter_intensities().iter().all(|i| *i > 0.));

    // duration plus ease time plus a margin
    flock.clock_mut().set(Duration::from_millis(1000 + 3000 + 2000 + 100));
    flock.update(&params, 0.);
    assert!(flock.scatter_intensities().iter().all(|i| *i == 0.));
    assert!(flock.boids().iter().all(|b| !b.behavior().is_scattering()));
}

#[test]
fn crowded_flock_escapes_and_recovers() {
    let mut flock = Flock::new(60, SpaceBounds::new(150., 150.), seeded(4)).unwrap();
    let params = lively();

    let mut peak_escaping = 0;
    for _ in 0..600 {
        flock.update(&params, 0.);
        peak_escaping = peak_escaping.max(FrameStats::measure(&flock).escaping);
    }

    assert!(peak_escaping > 0);
    assert!(flock.boids().iter().all(|b| b.position.is_finite()));
}

#[test]
fn replays_are_identical() {
    let run = || {
        run_flock(
            200,
            30,
            SpaceBounds::default(),
            seeded(12),
            &lively(),
            10,
        )
        .unwrap()
    };

    let first = run();
    assert_eq!(first.len(), 20);
    assert_eq!(first, run());
}

#[test]
fn endless_global_scatter_keeps_running() {
    let mut flock = Flock::new(20, SpaceBounds::default(), seeded(5)).unwrap();
    let params = FlockParams::default();

    flock.trigger_global_scatter(Duration::MAX);
    for _ in 0..30 {
        flock.update(&params, 0.);
    }

    for (b, intensity) in flock.boids().iter().zip(flock.scatter_intensities()) {
        assert!(b.is_escaping() || intensity == 1.);
        assert!(b.position.is_finite());
    }
}

#[test]
fn huge_timer_spans_saturate() {
    let config = PhysicsConfig {
        scatter_next_ms: Span::new(20000., 1e30),
        independence_check_ms: Span::new(3000., f32::MAX),
        ..seeded(6)
    };
    let mut flock = Flock::new(20, SpaceBounds::default(), config).unwrap();
    let params = FlockParams::default();

    for _ in 0..30 {
        flock.update(&params, 0.);
    }
    assert_eq!(flock.len(), 20);
}

#[test]
fn infinite_scatter_ease_is_rejected() {
    let config = PhysicsConfig {
        scatter_ease_ms: f32::INFINITY,
        ..seeded(7)
    };
    assert!(matches!(
        Flock::new(20, SpaceBounds::default(), config),
        Err(ConfigError::Duration {
            name: "scatter_ease_ms",
            ..
        })
    ));
}

#[test]
fn infinite_space_is_rejected() {
    let result = Flock::new(20, SpaceBounds::new(f32::INFINITY, 600.), seeded(8));
    assert!(matches!(result, Err(ConfigError::EmptySpace { .. })));
}
