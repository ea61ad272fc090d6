//! TUI entrypoint: steps through an f-I sweep, plotting each membrane trace
//! and the growing f-I curve.
//! Controls: [s] Step, [r] Run/Pause, [c] Restart, [q] Quit
//!
//! Configuration comes from the first argument, else `$HH_SWEEP_CONFIG`,
//! else `./fi_sweep.toml`, else built-in defaults. Set `HH_TUI_LOG` to a file
//! path to capture logs (stdout belongs to the UI).

mod backend;
mod app;
mod ui;

use anyhow::{Context, Result};
use backend::CoreBackend;
use app::App;
use ui::draw;

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute, terminal,
};
use hh_sweep::SweepConfig;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

fn restore_terminal() -> Result<()> {
    terminal::disable_raw_mode()?;
    // Leave alternate screen and show cursor
    execute!(io::stdout(), terminal::LeaveAlternateScreen)?;
    Ok(())
}

fn init_logging() -> Result<()> {
    if let Ok(path) = std::env::var("HH_TUI_LOG") {
        let file = std::fs::File::create(&path).with_context(|| format!("creating log file {}", path))?;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    // Load configuration before touching the terminal so errors stay readable
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SweepConfig::load(config_path.as_deref()).context("loading sweep configuration")?;
    let backend = CoreBackend::new(config)?;

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;
    terminal.clear()?;

    // Ensure terminal is restored on panic
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        default_hook(panic_info);
    }));

    let mut app = App::new(backend);
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    // Event loop
    loop {
        draw(&mut terminal, &app)?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_millis(0));

        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char('s') => app.step(),
                    KeyCode::Char('r') => app.toggle_running(),
                    KeyCode::Char('c') => app.restart(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if app.running {
                app.step();
            }
            last_tick = Instant::now();
        }
    }

    // Cleanup
    restore_terminal()?;
    Ok(())
}
