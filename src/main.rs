//! virt-keys - virtual key press emulator
//!
//! Loads the keymap, registers the virtual device, and exposes the list and
//! trigger operations on the command line, over stdin, or in a terminal panel.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{self, Event, KeyCode as CtKeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use std::io::{stdin, stdout, BufRead};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use virt_keys::{
    config::{self, Config},
    control,
    keyboard::{KeyEvent, KeyRegistry, KeyStateMachine},
    sink::{ChannelSink, EventSink, LogSink, Tee},
    ui::{App, AppState, EventLog, InputLine, KeyList, StatusBar},
    Control,
};

#[derive(Parser, Debug)]
#[command(name = "virt-keys", version, about = "Virtual key press emulator")]
struct Cli {
    /// Config file path (default: <config dir>/virt-keys/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where press/release events go
    #[arg(long, value_enum, default_value_t = SinkKind::Uinput)]
    sink: SinkKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the supported key codes
    List {
        /// Print a JSON array instead of the text listing
        #[arg(long)]
        json: bool,
    },
    /// Read key codes from stdin, one per line ("list" prints the keys)
    Run,
    /// Interactive terminal panel
    Tui,
    /// Write a sample config file
    WriteConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SinkKind {
    /// Virtual input device (Linux uinput)
    Uinput,
    /// Log events only
    Log,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Command::WriteConfig { force } = cli.command {
        return write_config(cli.config, force);
    }

    let config = load_config(cli.config.as_deref())?;
    let registry = KeyRegistry::load(&config.keys).with_context(|| {
        "invalid keymap; run `virt-keys write-config` for a sample".to_string()
    })?;

    match cli.command {
        Command::List { json } => {
            if json {
                let codes: Vec<u32> = registry.list_codes().iter().map(|c| c.as_u32()).collect();
                println!("{}", serde_json::to_string(&codes)?);
            } else {
                print!("{}", control::listing(&registry));
            }
            Ok(())
        }
        Command::Run => {
            let sink = open_sink(cli.sink, &registry, &config)?;
            let machine = KeyStateMachine::with_hold(registry, sink, config.hold_duration())?;
            run_stdin(Control::new(Arc::new(machine)))
        }
        Command::Tui => {
            let device = open_sink(cli.sink, &registry, &config)?;
            let (channel, event_rx) = ChannelSink::channel();
            let sink: Arc<dyn EventSink> = Arc::new(Tee::new(device, Arc::new(channel)));
            let machine = KeyStateMachine::with_hold(registry, sink, config.hold_duration())?;
            run_tui(Control::new(Arc::new(machine)), &config, event_rx)
        }
        Command::WriteConfig { .. } => Ok(()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

fn write_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => config::config_path()?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::sample().save_to(&path)?;
    println!("Config written to: {}", path.display());
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_sink(kind: SinkKind, registry: &KeyRegistry, config: &Config) -> Result<Arc<dyn EventSink>> {
    match kind {
        SinkKind::Uinput => {
            let sink = virt_keys::sink::UinputSink::new(registry, &config.device)
                .context("Unable to register input device")?;
            Ok(Arc::new(sink))
        }
        SinkKind::Log => Ok(Arc::new(LogSink)),
    }
}

#[cfg(not(target_os = "linux"))]
fn open_sink(kind: SinkKind, _registry: &KeyRegistry, _config: &Config) -> Result<Arc<dyn EventSink>> {
    if kind == SinkKind::Uinput {
        log::warn!("uinput is only available on Linux, logging events instead");
    }
    Ok(Arc::new(LogSink))
}

enum Input {
    Line(String),
    Eof,
    Interrupt,
}

fn run_stdin(control: Control) -> Result<()> {
    let (input_tx, input_rx) = mpsc::channel::<Input>();

    let interrupt_tx = input_tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupt);
    })
    .context("failed to install Ctrl-C handler")?;

    thread::spawn(move || {
        for line in stdin().lock().lines() {
            let Ok(line) = line else { break };
            if input_tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = input_tx.send(Input::Eof);
    });

    for input in input_rx {
        match input {
            Input::Line(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "list" {
                    print!("{}", control.read());
                    continue;
                }
                match control.write(&line) {
                    Ok(consumed) => println!("ok {}", consumed),
                    Err(err) => eprintln!("error: {}", err),
                }
            }
            Input::Eof | Input::Interrupt => break,
        }
    }

    control.machine().teardown();
    Ok(())
}

fn run_tui(control: Control, config: &Config, event_rx: mpsc::Receiver<KeyEvent>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let hold_ms = control.machine().hold_duration().as_millis();
    let mut app = App::new(control, config.ui.theme);
    let tick_rate = config.refresh_interval();

    let result = (|| -> Result<()> {
        loop {
            while let Ok(key_event) = event_rx.try_recv() {
                app.process_event(&key_event);
            }

            let rows = app.rows();
            terminal.draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Min(6),    // Keys + events
                        Constraint::Length(1), // Input line
                        Constraint::Length(1), // Status bar
                    ])
                    .split(frame.area());

                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Length(38), Constraint::Min(20)])
                    .split(chunks[0]);

                frame.render_widget(KeyList::new(&rows, app.selected, app.palette), columns[0]);
                frame.render_widget(EventLog::new(&app.log, app.palette), columns[1]);
                frame.render_widget(InputLine::new(&app.input, app.palette), chunks[1]);

                let elapsed = app.elapsed_formatted();
                let status = StatusBar::new(&elapsed, app.total_events, hold_ms, app.palette)
                    .message(app.get_status());
                frame.render_widget(status, chunks[2]);
            })?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match key.code {
                            CtKeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.quit()
                            }
                            CtKeyCode::Char('q') | CtKeyCode::Esc => app.quit(),
                            CtKeyCode::Up => app.select_prev(),
                            CtKeyCode::Down => app.select_next(),
                            CtKeyCode::Char(c) if c.is_ascii_digit() => app.push_digit(c),
                            CtKeyCode::Backspace => app.pop_digit(),
                            CtKeyCode::Enter if app.input.is_empty() => app.trigger_selected(),
                            CtKeyCode::Enter => app.submit_input(),
                            _ => {}
                        }
                    }
                }
            }

            if app.state == AppState::Quitting {
                return Ok(());
            }
        }
    })();

    app.control.machine().teardown();

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
