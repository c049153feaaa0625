mod path_input;

use crate::domain::{
    ClearTicket, DirectoryValidator, LogEntry, LogStore, LogStoreError, RefreshTicket,
    RemoteError, SessionController, SessionError, SessionRequest, ValidationError,
    ValidationTicket, ValidationVerdict,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use thiserror::Error;
use time::OffsetDateTime;

pub use path_input::PathInput;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] crate::infra::ConfigError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClearConfirmSelection {
    Cancel,
    Clear,
}

impl ClearConfirmSelection {
    fn toggle(self) -> Self {
        match self {
            Self::Cancel => Self::Clear,
            Self::Clear => Self::Cancel,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClearConfirmDialog {
    pub entry_count: usize,
    pub selection: ClearConfirmSelection,
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub service_url: String,
    pub path_input: PathInput,
    pub validator: DirectoryValidator,
    pub session: SessionController,
    pub logs: LogStore,
    pub last_refreshed: Option<OffsetDateTime>,
    pub log_scroll: usize,
    pub terminal_size: (u16, u16),
    pub notice: Option<Notice>,
    pub help_open: bool,
    pub clear_confirm: Option<ClearConfirmDialog>,
}

impl AppModel {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            path_input: PathInput::default(),
            validator: DirectoryValidator::default(),
            session: SessionController::default(),
            logs: LogStore::default(),
            last_refreshed: None,
            log_scroll: 0,
            terminal_size: (0, 0),
            notice: None,
            help_open: false,
            clear_confirm: None,
        }
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        self
    }

    pub fn with_notice(mut self, notice: Option<Notice>) -> Self {
        self.notice = notice;
        self
    }

    /// Seeds the path field, e.g. from `--dir`, returning the validation to send.
    pub fn with_initial_path(mut self, path: &str) -> (Self, AppCommand) {
        self.path_input = PathInput::from_text(path);
        let command = revalidate_path(&mut self);
        (self, command)
    }
}

/// Outcome of a remote call, delivered back to the event loop by a worker.
#[derive(Clone, Debug)]
pub enum RemoteSignal {
    Validated {
        ticket: ValidationTicket,
        result: Result<ValidationVerdict, RemoteError>,
    },
    SessionToggled {
        request: SessionRequest,
        result: Result<String, RemoteError>,
    },
    Refreshed {
        ticket: RefreshTicket,
        result: Result<Vec<LogEntry>, RemoteError>,
        received_at: OffsetDateTime,
    },
    Cleared {
        ticket: ClearTicket,
        result: Result<(), RemoteError>,
    },
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
    Remote(RemoteSignal),
    /// The auto-refresh period elapsed.
    RefreshDue,
    Resize(u16, u16),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Validate(ValidationTicket),
    Session(SessionRequest),
    Refresh(RefreshTicket),
    Clear(ClearTicket),
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Paste(text) => update_on_paste(model, text),
        AppEvent::Remote(signal) => update_on_remote(model, signal),
        AppEvent::RefreshDue => update_on_refresh_due(model),
        AppEvent::Resize(width, height) => {
            let mut model = model.with_terminal_size(width, height);
            clamp_log_scroll(&mut model);
            (model, AppCommand::None)
        }
    }
}

/// Issues a refresh, superseding any refresh still in flight.
pub fn request_refresh(model: &mut AppModel) -> AppCommand {
    AppCommand::Refresh(model.logs.begin_refresh())
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    model.notice = None;

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        return (model, AppCommand::Quit);
    }

    if let Some(confirm) = model.clear_confirm.take() {
        return update_clear_confirm(model, confirm, key);
    }

    if model.help_open {
        if matches!(key.code, KeyCode::F(1) | KeyCode::Esc) {
            model.help_open = false;
        }
        return (model, AppCommand::None);
    }

    match key.code {
        KeyCode::F(1) => {
            model.help_open = true;
            (model, AppCommand::None)
        }
        KeyCode::F(5) => {
            let command = request_refresh(&mut model);
            (model, command)
        }
        KeyCode::Char('r') if ctrl => {
            let command = request_refresh(&mut model);
            (model, command)
        }
        KeyCode::Enter => toggle_monitoring(model),
        KeyCode::Char('s') if ctrl => toggle_monitoring(model),
        KeyCode::Char('l') if ctrl => {
            open_clear_confirm(&mut model);
            (model, AppCommand::None)
        }
        KeyCode::Char('w') if ctrl => {
            let changed = model.path_input.delete_segment_back();
            path_edited(model, changed)
        }
        KeyCode::Char('u') if ctrl => {
            let changed = model.path_input.clear();
            path_edited(model, changed)
        }
        KeyCode::Up => {
            model.log_scroll = model.log_scroll.saturating_sub(1);
            (model, AppCommand::None)
        }
        KeyCode::Down => {
            model.log_scroll = model.log_scroll.saturating_add(1);
            clamp_log_scroll(&mut model);
            (model, AppCommand::None)
        }
        KeyCode::PageUp => {
            let step = page_step(model.terminal_size);
            model.log_scroll = model.log_scroll.saturating_sub(step);
            (model, AppCommand::None)
        }
        KeyCode::PageDown => {
            let step = page_step(model.terminal_size);
            model.log_scroll = model.log_scroll.saturating_add(step);
            clamp_log_scroll(&mut model);
            (model, AppCommand::None)
        }
        KeyCode::Left => {
            model.path_input.move_left();
            (model, AppCommand::None)
        }
        KeyCode::Right => {
            model.path_input.move_right();
            (model, AppCommand::None)
        }
        KeyCode::Home => {
            model.path_input.move_home();
            (model, AppCommand::None)
        }
        KeyCode::End => {
            model.path_input.move_end();
            (model, AppCommand::None)
        }
        KeyCode::Backspace => {
            let changed = model.path_input.backspace();
            path_edited(model, changed)
        }
        KeyCode::Delete => {
            let changed = model.path_input.delete_forward();
            path_edited(model, changed)
        }
        KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
            let changed = model.path_input.insert_char(ch);
            path_edited(model, changed)
        }
        _ => (model, AppCommand::None),
    }
}

fn update_on_paste(mut model: AppModel, text: String) -> (AppModel, AppCommand) {
    if model.clear_confirm.is_some() || model.help_open {
        return (model, AppCommand::None);
    }
    let changed = model.path_input.insert_str(&text);
    path_edited(model, changed)
}

fn path_edited(mut model: AppModel, changed: bool) -> (AppModel, AppCommand) {
    if !changed {
        return (model, AppCommand::None);
    }
    let command = revalidate_path(&mut model);
    (model, command)
}

fn revalidate_path(model: &mut AppModel) -> AppCommand {
    let path = model.path_input.text().to_string();
    match model.validator.set_path(&path) {
        Some(ticket) => AppCommand::Validate(ticket),
        None => AppCommand::None,
    }
}

fn toggle_monitoring(mut model: AppModel) -> (AppModel, AppCommand) {
    let path = model.path_input.text().to_string();
    match model.session.toggle(&path, &model.validator) {
        Ok(request) => {
            let text = match &request {
                SessionRequest::Start { directory } => {
                    format!("Starting monitoring of {directory}…")
                }
                SessionRequest::Stop { directory } => {
                    format!("Stopping monitoring of {directory}…")
                }
            };
            model.notice = Some(Notice::info(text));
            (model, AppCommand::Session(request))
        }
        Err(error) => {
            tracing::debug!(%error, "toggle rejected");
            model.notice = Some(Notice::error(capitalize(&error.to_string())));
            (model, AppCommand::None)
        }
    }
}

fn open_clear_confirm(model: &mut AppModel) {
    if model.logs.is_clearing() {
        model.notice = Some(Notice::info("Clearing logs…"));
        return;
    }
    model.clear_confirm = Some(ClearConfirmDialog {
        entry_count: model.logs.len(),
        selection: ClearConfirmSelection::Cancel,
    });
}

fn update_clear_confirm(
    mut model: AppModel,
    mut confirm: ClearConfirmDialog,
    key: KeyEvent,
) -> (AppModel, AppCommand) {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('n') | KeyCode::Char('N') => {
            return (model, AppCommand::None);
        }
        KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
            confirm.selection = confirm.selection.toggle();
        }
        KeyCode::Enter => {
            if confirm.selection == ClearConfirmSelection::Clear {
                let ticket = model.logs.begin_clear();
                return (model, AppCommand::Clear(ticket));
            }
            return (model, AppCommand::None);
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let ticket = model.logs.begin_clear();
            return (model, AppCommand::Clear(ticket));
        }
        _ => {}
    }

    model.clear_confirm = Some(confirm);
    (model, AppCommand::None)
}

fn update_on_refresh_due(mut model: AppModel) -> (AppModel, AppCommand) {
    if !model.session.is_monitoring() || model.logs.is_refreshing() {
        return (model, AppCommand::None);
    }
    let command = request_refresh(&mut model);
    (model, command)
}

fn update_on_remote(mut model: AppModel, signal: RemoteSignal) -> (AppModel, AppCommand) {
    match signal {
        RemoteSignal::Validated { ticket, result } => {
            match model.validator.apply(&ticket, result) {
                Ok(verdict) => {
                    tracing::debug!(path = %ticket.path, ?verdict, "directory validated");
                }
                Err(ValidationError::Stale(_)) => {
                    tracing::debug!(path = %ticket.path, "discarded stale validation");
                }
                Err(error @ ValidationError::CouldNotCheck { .. }) => {
                    tracing::warn!(%error, "directory validation failed");
                    model.notice = Some(Notice::error(capitalize(&error.to_string())));
                }
            }
        }
        RemoteSignal::SessionToggled { request, result } => {
            match model.session.complete(&request, result) {
                Ok(status) => {
                    tracing::info!(
                        directory = request.directory(),
                        state = model.session.label(),
                        "session transition"
                    );
                    model.notice = Some(Notice::info(status));
                }
                Err(SessionError::Unexpected) => {
                    tracing::debug!(?request, "ignored unmatched session response");
                }
                Err(error) => {
                    tracing::warn!(%error, "session request failed");
                    model.notice = Some(Notice::error(capitalize(&error.to_string())));
                }
            }
        }
        RemoteSignal::Refreshed {
            ticket,
            result,
            received_at,
        } => match model.logs.apply_refresh(ticket, result) {
            Ok(count) => {
                tracing::debug!(count, "logs refreshed");
                model.last_refreshed = Some(received_at);
                clamp_log_scroll(&mut model);
            }
            Err(LogStoreError::Stale(_)) => {
                tracing::debug!("discarded stale log refresh");
            }
            Err(LogStoreError::Remote(error)) => {
                tracing::warn!(%error, "log refresh failed");
                model.notice = Some(Notice::error(format!("Failed to fetch logs: {error}")));
            }
        },
        RemoteSignal::Cleared { ticket, result } => match model.logs.apply_clear(ticket, result) {
            Ok(()) => {
                tracing::info!("logs cleared");
                model.log_scroll = 0;
                model.notice = Some(Notice::info("Logs cleared successfully!"));
            }
            Err(error) => {
                tracing::warn!(%error, "clearing logs failed");
                model.notice = Some(Notice::error(format!("Failed to clear logs: {error}")));
            }
        },
    }
    (model, AppCommand::None)
}

fn clamp_log_scroll(model: &mut AppModel) {
    if model.logs.is_empty() {
        model.log_scroll = 0;
        return;
    }
    let max = model.logs.len().saturating_sub(1);
    model.log_scroll = model.log_scroll.min(max);
}

fn page_step(terminal_size: (u16, u16)) -> usize {
    // Roughly the height left for the log list once header, cards and chart are drawn.
    (terminal_size.1 as usize).saturating_sub(22).max(5)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
