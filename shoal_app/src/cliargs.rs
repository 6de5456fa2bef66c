use clap_serde_derive::{
    clap::{self, Parser},
    serde::Serialize,
    ClapSerde,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Headless koi shoal simulation, logs flock statistics as it runs.
pub struct Args {
    /// Config file, TOML when it ends in `.toml`, YAML otherwise
    #[arg(short, long = "config", default_value = "shoal.toml")]
    pub config_path: std::path::PathBuf,

    /// Physics tuning file, same formats as the config file
    #[arg(long = "physics")]
    pub physics_path: Option<std::path::PathBuf>,

    /// Rest of arguments
    #[command(flatten)]
    pub config: <Config as ClapSerde>::Opt,
}

#[derive(ClapSerde, Serialize)]
/// Programatic configuration
///
/// Uses defaults, which can be overwritten by specifying a filepath for the `-c` or `--config` arg option
pub struct Config {
    #[default(100)]
    #[arg(short = 'n', long)]
    /// number of koi
    pub no_boids: usize,

    #[default(800)]
    #[arg(short = 'x', long)]
    pub init_width: u32,

    #[default(600)]
    #[arg(short = 'y', long)]
    pub init_height: u32,

    #[default(600)]
    #[arg(short = 'f', long)]
    /// frames to simulate
    pub frames: u64,

    #[default(16.667)]
    #[arg(long = "frame_ms")]
    /// simulated time per frame, also the pacing in realtime mode
    pub frame_ms: f32,

    #[default(0)]
    #[arg(long)]
    /// 0 draws a fresh seed
    pub seed: u64,

    #[default(0.5)]
    #[arg(long = "max_speed")]
    pub max_speed: f32,
    #[default(0.1)]
    #[arg(long = "max_force")]
    pub max_force: f32,

    #[default(1.2)]
    #[arg(long = "ali_weight")]
    pub alignment_weight: f32,
    #[default(1.0)]
    #[arg(long = "coh_weight")]
    pub cohesion_weight: f32,
    #[default(0.5)]
    #[arg(long = "sep_weight")]
    pub separation_weight: f32,

    #[default(0.5)]
    #[arg(long = "reactivity")]
    pub audio_reactivity: f32,
    #[default(0.)]
    #[arg(long)]
    /// constant audio amplitude fed every frame
    pub amplitude: f32,
    #[default(0.)]
    #[arg(long)]
    /// constant bass level fed every frame
    pub bass: f32,

    #[default(0)]
    #[arg(long = "scatter_frame")]
    /// frame at which a global scatter fires, 0 for never
    pub scatter_frame: u64,
    #[default(3000.)]
    #[arg(long = "scatter_ms")]
    pub scatter_ms: f32,

    #[default(60)]
    #[arg(short = 'r', long)]
    /// log statistics every n-th frame
    pub sample_rate: u64,

    #[default(false)]
    #[arg(long)]
    /// brute force neighbour search instead of the grid
    pub naive: bool,

    #[default(false)]
    #[arg(long)]
    /// behaviour timers follow the wall clock
    pub realtime: bool,

    #[default(false)]
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
