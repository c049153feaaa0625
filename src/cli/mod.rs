use crate::domain::{
    ChangeCategory, DirectoryValidator, RemoteError, SessionController, SessionError,
    SessionRequest, ValidationError, ValidationVerdict, classify, display_order,
};
use crate::infra::{ConfigOverrides, MonitorService};
use humansize::{DECIMAL, format_size};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui {
        overrides: ConfigOverrides,
        directory: Option<String>,
    },
    Command {
        overrides: ConfigOverrides,
        command: CliCommand,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Logs { limit: Option<usize>, json: bool },
    Summary,
    Validate { directory: String },
    Start { directory: String },
    Stop { directory: String },
    Clear,
    Export { out: Option<PathBuf> },
}

/// How a successfully executed command should exit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Success,
    /// `validate` ran fine but the service said the directory is not usable.
    DirectoryInvalid,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("missing directory argument for `{0}`")]
    MissingDirectory(String),
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("directory is not valid for monitoring: {0}")]
    InvalidDirectory(String),

    #[error("failed to encode logs as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    WriteExport { path: String, source: io::Error },

    #[error(transparent)]
    WriteOutput(#[from] io::Error),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut overrides = ConfigOverrides::default();
    let mut directory: Option<String> = None;
    let mut iter = args.iter().skip(1).peekable();
    while let Some(arg) = iter.peek() {
        match arg.as_str() {
            "--dir" | "-d" => {
                let _ = iter.next();
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--dir".to_string()))?;
                directory = Some(value.to_string());
            }
            "--" => {
                let _ = iter.next();
                break;
            }
            flag if flag.starts_with('-') => {
                let flag = flag.to_string();
                let _ = iter.next();
                if !parse_config_flag(&flag, &mut iter, &mut overrides)? {
                    return Err(CliParseError::UnknownFlag(flag));
                }
            }
            _ => break,
        }
    }

    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Tui {
            overrides,
            directory,
        });
    };
    if let Some(directory) = directory {
        return Err(CliParseError::UnexpectedArgument(format!("--dir {directory}")));
    }

    let mut positional: Vec<String> = Vec::new();
    let mut limit: Option<usize> = None;
    let mut json = false;
    let mut out: Option<PathBuf> = None;

    let mut args = iter.peekable();
    while let Some(arg) = args.next() {
        match (subcommand.as_str(), arg.as_str()) {
            ("logs", "--limit" | "-l") => {
                let value = args
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--limit".to_string()))?;
                limit = Some(parse_usize_flag("--limit", value)?);
            }
            ("logs", "--json") => {
                json = true;
            }
            ("export", "--out" | "-o") => {
                let value = args
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--out".to_string()))?;
                out = Some(PathBuf::from(value));
            }
            (_, flag) if flag.starts_with('-') => {
                if !parse_config_flag(flag, &mut args, &mut overrides)? {
                    return Err(CliParseError::UnknownFlag(flag.to_string()));
                }
            }
            _ => positional.push(arg.to_string()),
        }
    }

    let command = match subcommand.as_str() {
        "logs" => {
            no_positional(&positional)?;
            CliCommand::Logs { limit, json }
        }
        "summary" => {
            no_positional(&positional)?;
            CliCommand::Summary
        }
        "clear" => {
            no_positional(&positional)?;
            CliCommand::Clear
        }
        "export" => {
            no_positional(&positional)?;
            CliCommand::Export { out }
        }
        "validate" => CliCommand::Validate {
            directory: single_directory("validate", positional)?,
        },
        "start" => CliCommand::Start {
            directory: single_directory("start", positional)?,
        },
        "stop" => CliCommand::Stop {
            directory: single_directory("stop", positional)?,
        },
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };

    Ok(CliInvocation::Command { overrides, command })
}

/// Consumes a `--url`/`--timeout-ms`/`--refresh-secs` flag. Returns `false` for any other flag.
fn parse_config_flag<'a>(
    flag: &str,
    args: &mut impl Iterator<Item = &'a String>,
    overrides: &mut ConfigOverrides,
) -> Result<bool, CliParseError> {
    let name = match flag {
        "--url" | "-u" => "--url",
        "--timeout-ms" => "--timeout-ms",
        "--refresh-secs" => "--refresh-secs",
        _ => return Ok(false),
    };
    let value = args
        .next()
        .ok_or_else(|| CliParseError::MissingFlagValue(name.to_string()))?;
    match name {
        "--url" => overrides.base_url = Some(value.to_string()),
        "--timeout-ms" => overrides.timeout_ms = Some(parse_u64_flag(name, value)?),
        _ => overrides.refresh_secs = Some(parse_u64_flag(name, value)?),
    }
    Ok(true)
}

fn no_positional(positional: &[String]) -> Result<(), CliParseError> {
    match positional.first() {
        Some(extra) => Err(CliParseError::UnexpectedArgument(extra.clone())),
        None => Ok(()),
    }
}

fn single_directory(subcommand: &str, positional: Vec<String>) -> Result<String, CliParseError> {
    let mut positional = positional.into_iter();
    let directory = positional
        .next()
        .ok_or_else(|| CliParseError::MissingDirectory(subcommand.to_string()))?;
    if let Some(extra) = positional.next() {
        return Err(CliParseError::UnexpectedArgument(extra));
    }
    Ok(directory)
}

pub fn run(
    command: CliCommand,
    service: &dyn MonitorService,
) -> Result<CommandOutcome, CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let outcome = run_with(command, service, &mut out)?;
    out.flush()?;
    Ok(outcome)
}

pub fn run_with(
    command: CliCommand,
    service: &dyn MonitorService,
    out: &mut impl Write,
) -> Result<CommandOutcome, CliRunError> {
    match command {
        CliCommand::Logs { limit, json } => {
            let entries = service.fetch_logs()?;
            let mut newest_first = display_order(&entries);
            if let Some(limit) = limit {
                newest_first.truncate(limit);
            }

            if json {
                let payload = serde_json::to_string_pretty(&newest_first)?;
                write_line(out, &payload)?;
                return Ok(CommandOutcome::Success);
            }
            for entry in &newest_first {
                let line = format!(
                    "{}\t{}\t{}",
                    entry.timestamp,
                    entry.category().label(),
                    entry.message
                );
                if !write_line(out, &line)? {
                    break;
                }
            }
            Ok(CommandOutcome::Success)
        }
        CliCommand::Summary => {
            let entries = service.fetch_logs()?;
            let counts = classify(&entries);
            let width = ChangeCategory::ALL
                .iter()
                .map(|category| category.label().len())
                .max()
                .unwrap_or(0);
            for (category, count) in counts.iter() {
                if !write_line(out, &format!("{:<width$}\t{count}", category.label()))? {
                    return Ok(CommandOutcome::Success);
                }
            }
            write_line(out, &format!("{:<width$}\t{}", "Total", counts.total()))?;
            Ok(CommandOutcome::Success)
        }
        CliCommand::Validate { directory } => {
            let verdict = check_directory(service, &directory)?;
            match verdict {
                ValidationVerdict::Valid => {
                    write_line(out, "valid")?;
                    Ok(CommandOutcome::Success)
                }
                ValidationVerdict::Invalid => {
                    write_line(out, "invalid")?;
                    Ok(CommandOutcome::DirectoryInvalid)
                }
            }
        }
        CliCommand::Start { directory } => {
            let mut validator = DirectoryValidator::default();
            if let Some(ticket) = validator.set_path(&directory) {
                let result = service.validate_directory(&ticket.path);
                validator.apply(&ticket, result)?;
            }

            let mut session = SessionController::default();
            let request = match session.toggle(&directory, &validator) {
                Ok(request) => request,
                Err(SessionError::NotValidated) => {
                    return Err(CliRunError::InvalidDirectory(directory));
                }
                Err(error) => return Err(error.into()),
            };
            let status = drive(&mut session, service, request)?;
            write_line(out, &status)?;
            Ok(CommandOutcome::Success)
        }
        CliCommand::Stop { directory } => {
            let mut session = SessionController::attached(directory.clone());
            let request = session.toggle(&directory, &DirectoryValidator::default())?;
            let status = drive(&mut session, service, request)?;
            write_line(out, &status)?;
            Ok(CommandOutcome::Success)
        }
        CliCommand::Clear => {
            service.clear_logs()?;
            write_line(out, "Logs cleared successfully!")?;
            Ok(CommandOutcome::Success)
        }
        CliCommand::Export { out: path } => {
            let csv = service.download_logs_csv()?;
            match path {
                Some(path) => {
                    fs::write(&path, &csv).map_err(|source| CliRunError::WriteExport {
                        path: path.display().to_string(),
                        source,
                    })?;
                    let size = format_size(csv.len() as u64, DECIMAL);
                    write_line(out, &format!("Saved {size} to {}", path.display()))?;
                }
                None => {
                    out.write_all(&csv)?;
                }
            }
            Ok(CommandOutcome::Success)
        }
    }
}

fn check_directory(
    service: &dyn MonitorService,
    directory: &str,
) -> Result<ValidationVerdict, CliRunError> {
    let mut validator = DirectoryValidator::default();
    let Some(ticket) = validator.set_path(directory) else {
        return Ok(ValidationVerdict::Invalid);
    };
    let result = service.validate_directory(&ticket.path);
    Ok(validator.apply(&ticket, result)?)
}

fn drive(
    session: &mut SessionController,
    service: &dyn MonitorService,
    request: SessionRequest,
) -> Result<String, CliRunError> {
    tracing::debug!(?request, "sending session request");
    let result = match &request {
        SessionRequest::Start { directory } => service.start(directory),
        SessionRequest::Stop { directory } => service.stop(directory),
    };
    Ok(session.complete(&request, result)?)
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

fn parse_usize_flag(flag: &str, value: &str) -> Result<usize, CliParseError> {
    value
        .parse::<usize>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}

fn parse_u64_flag(flag: &str, value: &str) -> Result<u64, CliParseError> {
    value
        .parse::<u64>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}
