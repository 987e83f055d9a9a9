mod state;
mod theme;
mod ui;
mod views;

use alex_core::{
    config::parse_bool_flag, spawn_supervisor, BusClient, BusConfig, ExponentialBackoff, TopicCache,
};
use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use state::App;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

const TICK_MS: u64 = 250;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = BusConfig::from_env().context("invalid broker configuration")?;
    info!(
        event = "dashboard_start",
        broker = %config.broker_label(),
        reconnect = config.reconnect
    );
    let reconnect = config.reconnect;
    let cache = Arc::new(TopicCache::new());
    let client = Arc::new(BusClient::new(config, cache));
    if reconnect {
        spawn_supervisor(Arc::clone(&client), ExponentialBackoff::default());
    }
    client.connect();

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, App::new(Arc::clone(&client))).await;
    restore_terminal(&mut terminal)?;

    if let Err(err) = client.disconnect() {
        info!(event = "dashboard_disconnect_skipped", reason = %err);
    }
    result
}

async fn run(terminal: &mut Tui, mut app: App) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));

    loop {
        app.on_tick(Instant::now());
        terminal.draw(|frame| ui::render(frame, &app))?;
        if app.should_quit() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => app.handle_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(event = "dashboard_input_error", error = %err);
                    }
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Logs are discarded unless `ALEX_LOG_FILE` or `ALEX_LOG_STDOUT` is set.
/// The file wins when both are.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = std::env::var("ALEX_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false);

    let file = std::env::var("ALEX_LOG_FILE")
        .ok()
        .filter(|path| !path.trim().is_empty())
        .and_then(|path| match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(Arc::new(Mutex::new(file))),
            Err(err) => {
                eprintln!("log_file_error: {path}: {err}");
                None
            }
        });

    let make_writer = match (file, stdout_enabled) {
        (Some(file), _) => BoxMakeWriter::new(move || SharedFile(Arc::clone(&file))),
        (None, true) => BoxMakeWriter::new(io::stdout),
        (None, false) => BoxMakeWriter::new(io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .try_init();
}

struct SharedFile(Arc<Mutex<std::fs::File>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut file) => file.write_all(buf).map(|()| buf.len()),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}
