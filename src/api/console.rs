/*!
 * Console Control Plane
 *
 * Line protocol for driving the supervisor: one command per line, one JSON
 * response per line.
 *
 *   upload <tenant> <name> <path-to-zip>
 *   start|stop|restart|delete|status <tenant> <name>
 *   list <tenant>
 *   help | quit
 */

use crate::core::SupervisorError;
use crate::lifecycle::Supervisor;
use crate::monitoring::CommandSpan;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub const HELP: &str = "commands: upload <tenant> <name> <zip-path> | start|stop|restart|delete|status <tenant> <name> | list <tenant> | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Upload {
        tenant: String,
        name: String,
        path: PathBuf,
    },
    Start { tenant: String, name: String },
    Stop { tenant: String, name: String },
    Restart { tenant: String, name: String },
    Delete { tenant: String, name: String },
    Status { tenant: String, name: String },
    List { tenant: String },
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((verb, args)) = parts.split_first() else {
            return Err(ParseError::Empty);
        };

        let pair = |usage: &'static str| match args {
            [tenant, name] => Ok((tenant.to_string(), name.to_string())),
            _ => Err(ParseError::Usage(usage)),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "upload" => match args {
                [tenant, name, path] => ConsoleCommand::Upload {
                    tenant: tenant.to_string(),
                    name: name.to_string(),
                    path: PathBuf::from(path),
                },
                _ => return Err(ParseError::Usage("upload <tenant> <name> <zip-path>")),
            },
            "start" | "run" => {
                let (tenant, name) = pair("start <tenant> <name>")?;
                ConsoleCommand::Start { tenant, name }
            }
            "stop" => {
                let (tenant, name) = pair("stop <tenant> <name>")?;
                ConsoleCommand::Stop { tenant, name }
            }
            "restart" => {
                let (tenant, name) = pair("restart <tenant> <name>")?;
                ConsoleCommand::Restart { tenant, name }
            }
            "delete" => {
                let (tenant, name) = pair("delete <tenant> <name>")?;
                ConsoleCommand::Delete { tenant, name }
            }
            "status" => {
                let (tenant, name) = pair("status <tenant> <name>")?;
                ConsoleCommand::Status { tenant, name }
            }
            "list" => match args {
                [tenant] => ConsoleCommand::List {
                    tenant: tenant.to_string(),
                },
                _ => return Err(ParseError::Usage("list <tenant>")),
            },
            "help" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ConsoleCommand::Upload { .. } => "upload",
            ConsoleCommand::Start { .. } => "start",
            ConsoleCommand::Stop { .. } => "stop",
            ConsoleCommand::Restart { .. } => "restart",
            ConsoleCommand::Delete { .. } => "delete",
            ConsoleCommand::Status { .. } => "status",
            ConsoleCommand::List { .. } => "list",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }
}

/// One JSON response line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsoleResponse {
    pub ok: bool,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ConsoleResponse {
    pub fn success(command: &str, data: Value) -> Self {
        Self {
            ok: true,
            command: command.to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(command: &str, error: Value) -> Self {
        Self {
            ok: false,
            command: command.to_string(),
            data: None,
            error: Some(error),
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"serialize: {}"}}"#, e))
    }
}

/// Execute a parsed command against the supervisor. Blocking.
pub fn execute(supervisor: &Supervisor, command: &ConsoleCommand) -> ConsoleResponse {
    let verb = command.verb();
    let span = CommandSpan::new(verb);
    let _guard = span.enter();

    let result: Result<Value, SupervisorError> = match command {
        ConsoleCommand::Upload { tenant, name, path } => std::fs::read(path)
            .map_err(|e| SupervisorError::storage(format!("read {}", path.display()), e))
            .and_then(|bytes| supervisor.upload_archive(tenant, name, &bytes))
            .map(|app| json!(app)),
        ConsoleCommand::Start { tenant, name } => {
            supervisor.start(tenant, name).map(|started| json!(started))
        }
        ConsoleCommand::Stop { tenant, name } => supervisor
            .stop(tenant, name)
            .map(|stopped| json!({ "stopped": stopped })),
        ConsoleCommand::Restart { tenant, name } => {
            supervisor.restart(tenant, name).map(|started| json!(started))
        }
        ConsoleCommand::Delete { tenant, name } => supervisor
            .delete(tenant, name)
            .map(|()| json!({ "deleted": true })),
        ConsoleCommand::Status { tenant, name } => {
            supervisor.status(tenant, name).map(|status| json!(status))
        }
        ConsoleCommand::List { tenant } => supervisor
            .list_applications(tenant)
            .map(|apps| json!(apps)),
        ConsoleCommand::Help => Ok(json!(HELP)),
        ConsoleCommand::Quit => Ok(json!({ "running": supervisor.running_count() })),
    };

    match result {
        Ok(data) => {
            span.record_result(true);
            info!(command = verb, trace_id = %span.trace_id(), "Command succeeded");
            ConsoleResponse::success(verb, data)
        }
        Err(error) => {
            span.record_error(&error.to_string());
            ConsoleResponse::failure(verb, json!(error))
        }
    }
}
