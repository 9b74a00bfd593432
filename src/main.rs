mod action;
mod app;
mod auth;
mod config;
mod error;
mod event;
mod forge;
mod gitea;
mod github;
mod tui;
mod types;
mod ui;
mod worker;

use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::App;
use crate::config::{Config, ForgeConfig, ForgeType};
use crate::error::ArborError;
use crate::event::Event;
use crate::forge::Forge;
use crate::gitea::Gitea;
use crate::github::GitHub;
use crate::tui::EventHandler;
use crate::worker::Worker;

/// Browse a repository's readme, files and history from the terminal
#[derive(Parser, Debug)]
#[command(name = "arbor", version)]
struct Cli {
    /// Repository as owner/name. Defaults to the origin remote of the current checkout.
    repo: Option<String>,

    /// Forge to use, by name from the config file
    #[arg(long)]
    forge: Option<String>,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn build_forge(forge: &ForgeConfig) -> Result<Arc<dyn Forge>, ArborError> {
    let token = auth::load_token(forge)?;
    Ok(match forge.forge_type {
        ForgeType::GitHub => Arc::new(GitHub::new(token)?),
        ForgeType::Gitea => Arc::new(Gitea::new(forge.host.clone(), token)),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let config = Config::load();
    let origin = config::origin_url();

    let repo_name = cli
        .repo
        .clone()
        .or_else(|| origin.as_deref().and_then(config::extract_repo_path))
        .ok_or_else(|| {
            ArborError::Config(
                "no repository given and no origin remote to infer one from".to_string(),
            )
        })?;

    let forge_config = config.select_forge(cli.forge.as_deref(), origin.as_deref())?;
    let forge = build_forge(forge_config)?;
    tracing::info!(forge = forge.name(), repo = %repo_name, "starting");

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let app = App::new(repo_name, config.layout);

    // Run the application
    let result = run(app, forge).await;

    // Restore terminal
    tui::restore()?;

    result
}

async fn run(mut app: App, forge: Arc<dyn Forge>) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize terminal
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel();
    let worker = Worker::new(forge, action_tx);

    let (width, height) = crossterm::terminal::size()?;
    app.resize(width, height);

    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(render_rate);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    other => app.handle_event(other),
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        worker.submit_all(app.take_requests());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
