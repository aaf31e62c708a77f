use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use volview::ViewerConfig;

#[derive(Parser)]
#[command(name = "volview")]
#[command(about = "Interactive GPU ray-marching viewer for .vol volumes")]
struct Cli {
    /// Volume file to open instead of the first preset
    volume: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open the preset at this index (0-3) at startup
    #[arg(short, long)]
    preset: Option<usize>,

    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,
}

impl Cli {
    fn into_config(self) -> volview::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load_from_path(path)?,
            None => ViewerConfig::default(),
        };

        if let Some(index) = self.preset {
            match config.preset_path(index) {
                Some(path) => config.volume.initial = Some(path),
                None => log::warn!("no preset at index {index}, ignoring --preset"),
            }
        }
        if let Some(volume) = self.volume {
            config.volume.initial = Some(volume);
        }
        if let Some(width) = self.width.filter(|&w| w > 0) {
            config.window.width = width;
        }
        if let Some(height) = self.height.filter(|&h| h > 0) {
            config.window.height = height;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("volview=info"))
        .init();

    let result = Cli::parse().into_config().and_then(volview::run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
