use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use clap_serde_derive::{clap::Parser, ClapSerde};
use serde::de::DeserializeOwned;
use shoal_lib::{
    clock::{Clock, FrameClock},
    error::ConfigError,
    flock::Flock,
    options::{millis, FlockParams, Modulation, NeighbourSearch, PhysicsConfig, SpaceBounds},
    random::{flock_rng, RandomSource},
    stats::{FlockObserver, FrameStats},
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cliargs;
use cliargs::{Args, Config};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("error in configuration file {}:\n{source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("error in configuration file {}:\n{source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn main() -> Result<(), AppError> {
    // Parse whole args with clap
    let mut args = Args::parse();

    // Get config file, if there is none only what clap parsed is used
    let config = if args.config_path.exists() {
        let from_file: <Config as ClapSerde>::Opt = load(&args.config_path)?;
        Config::from(from_file).merge(&mut args.config)
    } else {
        Config::from(&mut args.config)
    };

    init_tracing(config.verbose);

    let mut physics = match &args.physics_path {
        Some(path) => load::<PhysicsConfig>(path)?,
        None => PhysicsConfig::default(),
    };
    if config.seed != 0 {
        physics.seed = Some(config.seed);
    }
    if config.naive {
        physics.neighbour_search = NeighbourSearch::Naive;
    }

    let params = FlockParams {
        max_speed: config.max_speed,
        max_force: config.max_force,
        alignment_weight: config.alignment_weight,
        cohesion_weight: config.cohesion_weight,
        separation_weight: config.separation_weight,
        audio_reactivity: config.audio_reactivity,
    };
    let bounds = SpaceBounds::new(config.init_width as f32, config.init_height as f32);

    info!(
        boids = config.no_boids,
        width = bounds.width,
        height = bounds.height,
        frames = config.frames,
        search = ?physics.neighbour_search,
        realtime = config.realtime,
        "starting shoal"
    );

    if config.realtime {
        let flock = Flock::realtime(config.no_boids, bounds, physics)?;
        run(flock, &config, &params);
    } else {
        let rng = flock_rng(physics.seed);
        let clock = FrameClock::new(millis(config.frame_ms));
        let flock = Flock::with_clock_and_rng(config.no_boids, bounds, physics, clock, rng)?;
        run(flock, &config, &params);
    }

    Ok(())
}

fn run<C: Clock, R: RandomSource>(mut flock: Flock<C, R>, config: &Config, params: &FlockParams) {
    let modulation = Modulation {
        amplitude: config.amplitude,
        bass: config.bass,
    };
    let mut observer = FlockObserver::new(config.sample_rate, 16);
    let pace = millis(config.frame_ms);

    for frame in 1..=config.frames {
        if frame == config.scatter_frame {
            flock.trigger_global_scatter(millis(config.scatter_ms));
        }

        flock.update_modulated(params, modulation);

        if let Some(stats) = observer.watch(&flock) {
            log_stats(&stats);
        }

        if config.realtime {
            thread::sleep(pace);
        }
    }

    let last = FrameStats::measure(&flock);
    if last.escaping * 2 > last.count {
        warn!(escaping = last.escaping, "most of the flock is escaping, forces may be overtuned");
    }
    info!(frames = last.frame, time = ?last.time, "done");
}

fn log_stats(stats: &FrameStats) {
    info!(
        frame = stats.frame,
        time = ?stats.time,
        mean_neighbours = stats.mean_neighbours,
        max_neighbours = stats.max_neighbours,
        mean_speed = stats.mean_speed,
        escaping = stats.escaping,
        scattering = stats.scattering,
        independent = stats.independent,
        "flock"
    );
}

/// Reads a TOML or YAML file, picked by extension
fn load<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_owned(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text).map_err(|source| AppError::Toml {
            path: path.to_owned(),
            source,
        }),
        _ => serde_yaml::from_str(&text).map_err(|source| AppError::Yaml {
            path: path.to_owned(),
            source,
        }),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
