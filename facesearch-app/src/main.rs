mod app;
mod logging;
mod prompt;

use anyhow::{Context, Result};
use app::{App, SessionSetup};
use facesearch_experiment::ExperimentConfig;
use prompt::{ParticipantPrompt, TerminalPrompt};
use std::path::PathBuf;
use tracing::{error, info};

const CONFIG_FILE: &str = "facesearch.toml";

fn data_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the executable")?;
    Ok(exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

fn main() -> Result<()> {
    let data_root = data_root()?;
    let config = ExperimentConfig::load_or_default(&data_root.join(CONFIG_FILE));
    config.validate().context("invalid configuration")?;

    let Some(participant) = TerminalPrompt::stdio().ask()? else {
        println!("Cancelled.");
        return Ok(());
    };

    if let Some(log_file) = logging::init(&data_root, &participant.sub_id, config.debug_mode) {
        println!("Logging to {}", log_file.display());
    }
    info!("Subject {} ({:?})", participant.sub_id, participant);
    info!("Configuration: {config:?}");

    let font = facesearch_render::load_font(config.display.font_path.as_deref())
        .inspect_err(|e| error!("{e:#}"))?;

    let setup = SessionSetup {
        config,
        participant,
        font,
        data_root,
    };
    App::new(setup).run().inspect_err(|e| error!("Session failed: {e:#}"))
}
