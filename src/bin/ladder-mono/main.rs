//! ladder-mono - play a phrase on the monosynth
//!
//! Run with: cargo run -- play --notes C3,Eb3,G3,Bb3

mod app;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ladder-mono")]
#[command(author, version, about = "Analog-modelling monosynth", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a phrase on the default output device
    Play(PhraseArgs),

    /// Render a phrase offline and print level statistics
    Bounce(BounceArgs),
}

#[derive(Args, Clone)]
pub struct PhraseArgs {
    /// Comma-separated note names
    #[arg(long, default_value = "C3,Eb3,G3,Bb3,C4", value_delimiter = ',')]
    pub notes: Vec<String>,

    /// Length of each note in milliseconds
    #[arg(long, default_value_t = 400)]
    pub step_ms: u64,

    /// Play the phrase legato (no release between notes)
    #[arg(long)]
    pub legato: bool,

    /// Cutoff knob, -4 to 4
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub cutoff: f32,

    /// Emphasis knob, 0 to 10
    #[arg(long, default_value_t = 2.0)]
    pub emphasis: f32,

    /// Glide knob, 0 to 10 (enables glide)
    #[arg(long)]
    pub glide: Option<f32>,

    /// Mod wheel, 0 to 100
    #[arg(long, default_value_t = 0.0)]
    pub mod_wheel: f32,

    /// Route the modulation bus to pitch
    #[arg(long)]
    pub vibrato: bool,

    /// Mix in the A-440 reference tone
    #[arg(long)]
    pub tuner: bool,
}

#[derive(Args)]
pub struct BounceArgs {
    #[command(flatten)]
    pub phrase: PhraseArgs,

    /// Sample rate for the offline render
    #[arg(long, default_value_t = 48_000)]
    pub sample_rate: u32,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play(args) => app::play(&args),
        Commands::Bounce(args) => app::bounce(&args),
    }
}
