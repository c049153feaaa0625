mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppEvent, AppModel, RemoteSignal};
use crate::cli::{CliInvocation, CommandOutcome};
use crate::infra::{
    Config, ConfigOverrides, HttpMonitorService, LogTarget, MonitorService, init_logging,
    log_file_path, resolve_config,
};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::mpsc::{Sender, channel};
use std::time::{Duration, Instant};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Config(#[from] crate::infra::ConfigError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),
}

fn main() {
    match run_main() {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            std::process::exit(1);
        }
    }
}

fn run_main() -> Result<i32, MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(0)
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        CliInvocation::Tui {
            overrides,
            directory,
        } => {
            run_tui(&overrides, directory.as_deref())?;
            Ok(0)
        }
        CliInvocation::Command { overrides, command } => {
            let config = resolve_config(&overrides)?;
            if let Err(error) = init_logging(&LogTarget::Stderr, "warn") {
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "{error}");
            }
            let service = HttpMonitorService::new(config.base_url, config.timeout);
            match crate::cli::run(command, &service)? {
                CommandOutcome::Success => Ok(0),
                CommandOutcome::DirectoryInvalid => Ok(1),
            }
        }
    }
}

fn print_help() {
    let text = format!(
        "{name} - dashboard client for a file-change monitor service\n\nUSAGE:\n  {name} [--dir DIR] [FLAGS]            Start the dashboard (optionally pre-filling the directory)\n  {name} logs [--limit N] [--json]       Print change logs, newest first\n  {name} summary                         Print change counts per category\n  {name} validate DIR                    Check a directory (exit 1 when invalid)\n  {name} start DIR                       Validate DIR, then start monitoring it\n  {name} stop DIR                        Stop monitoring DIR\n  {name} clear                           Delete all logs on the service\n  {name} export [--out FILE]             Download logs as CSV (stdout without --out)\n  {name} --help | --version\n\nFLAGS:\n  --url URL           Monitor service base URL (default: http://localhost:5000)\n  --timeout-ms N      Per-request timeout in milliseconds (default: 5000)\n  --refresh-secs N    Dashboard auto-refresh period while monitoring, 0 disables (default: 3)\n\nOUTPUT:\n  logs: timestamp<TAB>category<TAB>message\n  summary: category<TAB>count\n\nENV:\n  FSMON_URL, FSMON_TIMEOUT_MS, FSMON_REFRESH_SECS   Same as the flags (flags win)\n  FSMON_STATE_DIR     Directory for {name}.log (default: ~/.fsmon)\n  FSMON_LOG           Log filter, e.g. debug or fsmon=trace\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

fn run_tui(
    overrides: &ConfigOverrides,
    directory: Option<&str>,
) -> Result<(), crate::app::AppError> {
    let config = resolve_config(overrides)?;
    let target = match &config.state_dir {
        Some(dir) => LogTarget::StateDir(dir.clone()),
        None => LogTarget::Discard,
    };
    let logging_notice = match init_logging(&target, "info") {
        Ok(()) => None,
        Err(error) => {
            let _ = init_logging(&LogTarget::Discard, "off");
            Some(app::Notice::error(format!("Logging disabled: {error}")))
        }
    };
    if let Some(dir) = &config.state_dir {
        tracing::info!(
            url = %config.base_url,
            log_file = %log_file_path(dir).display(),
            "dashboard starting"
        );
    }

    let service: Arc<dyn MonitorService> = Arc::new(HttpMonitorService::new(
        config.base_url.clone(),
        config.timeout,
    ));
    let mut model = AppModel::new(config.base_url.as_str()).with_notice(logging_notice);
    let mut initial = Vec::new();
    if let Some(directory) = directory {
        let (seeded, command) = model.with_initial_path(directory);
        model = seeded;
        initial.push(command);
    }
    initial.push(app::request_refresh(&mut model));

    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let result = run(&mut terminal, &mut model, &config, service, initial);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let _ = stdout.execute(EnableBracketedPaste);
    let keyboard_flags = KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
    let _ = stdout.execute(PushKeyboardEnhancementFlags(keyboard_flags));
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    let _ = execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        PopKeyboardEnhancementFlags
    );
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel,
    config: &Config,
    service: Arc<dyn MonitorService>,
    initial: Vec<AppCommand>,
) -> Result<(), app::AppError> {
    let (remote_tx, remote_rx) = channel::<RemoteSignal>();
    for command in initial {
        dispatch(command, &service, &remote_tx);
    }

    let mut next_refresh_at = config
        .refresh_interval
        .map(|interval| Instant::now() + interval);

    loop {
        while let Ok(signal) = remote_rx.try_recv() {
            let (next, command) = app::update(model.clone(), AppEvent::Remote(signal));
            *model = next;
            if dispatch(command, &service, &remote_tx) {
                return Ok(());
            }
        }

        if let (Some(interval), Some(due)) = (config.refresh_interval, next_refresh_at) {
            if Instant::now() >= due {
                next_refresh_at = Some(Instant::now() + interval);
                let (next, command) = app::update(model.clone(), AppEvent::RefreshDue);
                *model = next;
                dispatch(command, &service, &remote_tx);
            }
        }

        terminal.draw(|frame| ui::render(frame, model))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        let event = match event::read()? {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                AppEvent::Key(key)
            }
            Event::Paste(text) => AppEvent::Paste(text),
            Event::Resize(width, height) => AppEvent::Resize(width, height),
            _ => continue,
        };

        let (next, command) = app::update(model.clone(), event);
        *model = next;
        if dispatch(command, &service, &remote_tx) {
            return Ok(());
        }
    }
}

/// Runs the command's remote call on a worker thread. Returns `true` when the app should quit.
fn dispatch(
    command: AppCommand,
    service: &Arc<dyn MonitorService>,
    tx: &Sender<RemoteSignal>,
) -> bool {
    match command {
        AppCommand::None => false,
        AppCommand::Quit => true,
        AppCommand::Validate(ticket) => {
            tracing::debug!(path = %ticket.path, "validating directory");
            spawn_remote(service, tx, move |service| {
                let result = service.validate_directory(&ticket.path);
                RemoteSignal::Validated { ticket, result }
            });
            false
        }
        AppCommand::Session(request) => {
            tracing::info!(?request, "sending session request");
            spawn_remote(service, tx, move |service| {
                let result = match &request {
                    domain::SessionRequest::Start { directory } => service.start(directory),
                    domain::SessionRequest::Stop { directory } => service.stop(directory),
                };
                RemoteSignal::SessionToggled { request, result }
            });
            false
        }
        AppCommand::Refresh(ticket) => {
            tracing::debug!("refreshing logs");
            spawn_remote(service, tx, move |service| {
                let result = service.fetch_logs();
                RemoteSignal::Refreshed {
                    ticket,
                    result,
                    received_at: now_local(),
                }
            });
            false
        }
        AppCommand::Clear(ticket) => {
            tracing::info!("clearing logs");
            spawn_remote(service, tx, move |service| {
                let result = service.clear_logs();
                RemoteSignal::Cleared { ticket, result }
            });
            false
        }
    }
}

fn spawn_remote(
    service: &Arc<dyn MonitorService>,
    tx: &Sender<RemoteSignal>,
    call: impl FnOnce(&dyn MonitorService) -> RemoteSignal + Send + 'static,
) {
    let service = Arc::clone(service);
    let tx = tx.clone();
    std::thread::spawn(move || {
        let signal = call(service.as_ref());
        let _ = tx.send(signal);
    });
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
