//! Gurbani 24/7 terminal player

mod app;
mod cli;
mod logging;
mod ui;
mod visualizer;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use gbaudio::StreamEngine;
use gbconfig::{Config, get_config};
use gbradio::{HttpTitleSource, RadioSession};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::app::{Action, App};
use crate::cli::Args;

const TICK_RATE: Duration = Duration::from_millis(50);

type Session = RadioSession<StreamEngine, HttpTitleSource>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config_dir {
        Some(dir) => Arc::new(
            Config::load_config(&dir.to_string_lossy())
                .with_context(|| format!("Cannot load configuration from {}", dir.display()))?,
        ),
        None => get_config(),
    };

    logging::init_tracing(&args.log_file(&config), &config.get_log_min_level());

    // Restaurer le terminal même en cas de panique
    std::panic::set_hook(Box::new(|panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        eprintln!("\n\nGurbani247 panicked: {:?}", panic_info);
    }));

    let settings = args.radio_settings(&config);
    info!(
        stream_url = %settings.stream_url,
        metadata_url = %settings.metadata_url,
        poll_interval_secs = settings.poll_interval.as_secs(),
        "Starting Gurbani 24/7"
    );

    let engine = Arc::new(StreamEngine::new()?);
    let source = Arc::new(
        HttpTitleSource::new(settings.metadata_url.clone())
            .context("Cannot build the metadata HTTP client")?
            .timeout(settings.metadata_timeout),
    );
    let session = RadioSession::new(engine, source, &settings);
    session.start().await;

    let result = run_app(&session).await;
    session.shutdown();
    info!("Gurbani 24/7 stopped");

    result
}

async fn run_app(session: &Session) -> Result<()> {
    let mut guard = TerminalGuard {
        terminal: setup_terminal()?,
    };

    let mut app = App::new(session.current_title());
    let mut rng = rand::rng();
    let mut states = session.controller().subscribe();
    let mut titles = session.poller().subscribe();
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK_RATE);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let now = Instant::now();
        guard.terminal.draw(|f| ui::draw(f, &app, now))?;

        tokio::select! {
            _ = tick.tick() => app.on_tick(),
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                app.set_state(state, Instant::now(), &mut rng);
            }
            Ok(()) = titles.changed() => {
                let title = titles.borrow_and_update().clone();
                app.set_title(title);
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => match app.handle_key(key) {
                    Action::Toggle => {
                        let controller = Arc::clone(session.controller());
                        tokio::spawn(async move { controller.toggle().await });
                    }
                    Action::Quit => break,
                    Action::None => {}
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Terminal event error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    // Libérer l'audio avant de rendre le terminal
    session.shutdown();
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;
    Ok(terminal)
}

struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}
