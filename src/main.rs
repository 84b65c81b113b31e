use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

mod api;
mod app;
mod config;
mod error;
mod handler;
mod logging;
mod state;
mod tui;
mod ui;
mod view;

use api::ChatClient;
use app::{App, Command};
use config::{Config, API_URL_ENV};
use tui::EventHandler;
use view::TerminalView;

#[derive(Parser)]
#[command(name = "messenger")]
#[command(version, about = "Terminal client for the DeepSeek Messenger chat API")]
struct Cli {
    /// Base URL of the chat API, including the /api prefix
    #[arg(short, long, env = API_URL_ENV)]
    base_url: Option<String>,

    /// Sampling temperature sent with every message (0.0 - 1.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Maximum number of chats shown in the sidebar
    #[arg(short, long)]
    limit: Option<u32>,

    /// System prompt sent with every message
    #[arg(short, long)]
    system_prompt: Option<String>,

    /// Verbose logging to the log file
    #[arg(long)]
    debug: bool,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(limit) = self.limit {
            config.list_limit = limit;
        }
        if let Some(system_prompt) = &self.system_prompt {
            config.system_prompt = Some(system_prompt.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.save {
        let path = config.save()?;
        println!("Saved settings to {}", path.display());
        return Ok(());
    }

    let log_path = logging::init(cli.debug)?;
    info!(log = %log_path.display(), "starting messenger");

    // The orchestrator shares the view through Rc, so everything runs on one thread
    let local = tokio::task::LocalSet::new();
    let result = local.run_until(run(config)).await;
    if let Err(e) = &result {
        error!(error = %e, "messenger exited with an error");
    }
    result
}

async fn run(config: Config) -> Result<()> {
    let mut client =
        ChatClient::new(&config.base_url).with_system_prompt(config.system_prompt.clone());
    if let Some(timeout) = config.request_timeout() {
        client = client
            .with_timeout(timeout)
            .context("Failed to build HTTP client")?;
    }
    info!(base_url = client.base_url(), "using chat service");

    let view = TerminalView::new();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let app = Rc::new(App::new(
        client,
        view.clone(),
        command_tx.clone(),
        config.chat_settings(),
    ));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(config.tick_rate());

    let startup = Rc::clone(&app);
    tokio::task::spawn_local(async move { startup.start().await });

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| ui::render(&mut view.state_mut(), frame)) {
            break Err(e.into());
        }

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(&view, &command_tx, event),
                None => break Ok(()),
            },
            command = command_rx.recv() => match command {
                Some(Command::Quit) | None => break Ok(()),
                Some(command) => {
                    let _ = app.dispatch(command);
                }
            },
        }
    };

    tui::restore()?;
    result
}
