// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use snapcam::Config;
use snapcam::backends::camera::CameraBackendType;
use snapcam::constants::storage::CONFIG_DIR_NAME;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "snapcam")]
#[command(about = "Camera with photo and video capture")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera backend (overrides the configuration)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Grant camera and photo library access without asking
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Virtual,
    Gstreamer,
}

impl From<BackendArg> for CameraBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Virtual => CameraBackendType::Virtual,
            BackendArg::Gstreamer => CameraBackendType::GStreamer,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the terminal viewfinder (default)
    Terminal,

    /// List available cameras and microphones
    List,

    /// Take a photo and add it to the library
    Photo,

    /// Record a video and add it to the library
    Video {
        /// Recording duration in seconds (Ctrl+C stops early)
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },

    /// Inspect or reset camera and library access
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PermissionsAction {
    /// Show the recorded decisions
    Show,
    /// Forget all decisions so the next launch asks again
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration if none exists
    Init,
    /// Print the effective configuration
    Show,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let terminal_mode = matches!(cli.command, None | Some(Commands::Terminal));
    init_logging(terminal_mode);

    let mut config = Config::load();
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }

    match cli.command {
        None | Some(Commands::Terminal) => snapcam::terminal::run(config, cli.yes),
        Some(Commands::List) => cli::list_devices(&config),
        Some(Commands::Photo) => cli::take_photo(&config, cli.yes),
        Some(Commands::Video { duration }) => cli::record_video(&config, cli.yes, duration),
        Some(Commands::Permissions { action }) => match action {
            PermissionsAction::Show => cli::show_permissions(),
            PermissionsAction::Reset => cli::reset_permissions(),
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::init_config(),
            ConfigAction::Show => cli::show_config(&config),
        },
    }
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=snapcam=debug, RUST_LOG=info
///
/// The terminal viewfinder owns the screen, so its logs go to a file in the
/// cache directory instead of stderr.
fn init_logging(terminal_mode: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    if terminal_mode
        && let Some(dir) = dirs::cache_dir().map(|d| d.join(CONFIG_DIR_NAME))
        && std::fs::create_dir_all(&dir).is_ok()
        && let Ok(file) = std::fs::File::create(dir.join("snapcam.log"))
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
