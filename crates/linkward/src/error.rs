//! CLI error type with miette diagnostics and process exit codes.

use linkward_config::ConfigError;
use linkward_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Request ──────────────────────────────────────────────────────

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(linkward::validation))]
    Validation { field: String, reason: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(linkward::not_found),
        help("Run `linkward {list_command}` to see what exists.")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}': {reason}")]
    #[diagnostic(code(linkward::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
        reason: String,
    },

    #[error("No free VLAN id left in pool [{start}, {end})")]
    #[diagnostic(
        code(linkward::pool_exhausted),
        help("Delete unused networks or widen [pool] in the config file.")
    )]
    PoolExhausted { start: u16, end: u16 },

    // ── Actions ──────────────────────────────────────────────────────

    #[error("Action {action_id} failed: {diagnostic}")]
    #[diagnostic(
        code(linkward::action_failed),
        help("The NIC's attachments were left unchanged.")
    )]
    ActionFailed {
        action_id: String,
        diagnostic: String,
    },

    #[error("Action {action_id} still pending after {seconds}s")]
    #[diagnostic(
        code(linkward::timeout),
        help("Check it later with `linkward action status {action_id}`.")
    )]
    WaitTimedOut { action_id: String, seconds: u64 },

    // ── Switch ───────────────────────────────────────────────────────

    #[error("Switch error: {message}")]
    #[diagnostic(code(linkward::switch))]
    Switch { message: String },

    #[error("Could not reach switch: {message}")]
    #[diagnostic(
        code(linkward::connection_failed),
        help("Check the switch URL and that its management API is reachable.")
    )]
    ConnectionFailed { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No credentials configured for switch '{switch}'")]
    #[diagnostic(
        code(linkward::no_credentials),
        help(
            "Set username and password_env (or password) under [switches.{switch}] in the config file."
        )
    )]
    NoCredentials { switch: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(linkward::config),
        help("Run `linkward config path` to locate the config file.")
    )]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("Storage error: {message}")]
    #[diagnostic(
        code(linkward::storage),
        help("Only one linkward process may open the database at a time.")
    )]
    Storage { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(linkward::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(linkward::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(linkward::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::PoolExhausted { .. } => exit_code::CONFLICT,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::WaitTimedOut { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

fn list_command(entity_type: &str) -> String {
    match entity_type {
        "nic" => "node show <node>".into(),
        "switch" => "config show".into(),
        other => format!("{other} list"),
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => CliError::Validation {
                field: "request".into(),
                reason: message,
            },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type.into(),
                identifier,
                list_command: list_command(entity_type),
            },

            CoreError::Conflict {
                entity_type,
                identifier,
                reason,
            } => CliError::Conflict {
                resource_type: entity_type.into(),
                identifier,
                reason,
            },

            CoreError::CancelRejected { action_id, reason } => CliError::Conflict {
                resource_type: "action".into(),
                identifier: action_id,
                reason,
            },

            CoreError::AllocationExhausted { start, end } => {
                CliError::PoolExhausted { start, end }
            }

            CoreError::Switch { message, .. } => CliError::Switch { message },

            CoreError::TransportTransient { message } => CliError::ConnectionFailed { message },

            CoreError::Config { message } => CliError::Config { message },

            e @ (CoreError::Storage(_) | CoreError::Corrupt { .. }) => CliError::Storage {
                message: e.to_string(),
            },

            CoreError::ProtocolContract { message } => CliError::Internal { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { switch } => CliError::NoCredentials { switch },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let not_found: CliError = CoreError::NotFound {
            entity_type: "network",
            identifier: "net9".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let cancel: CliError = CoreError::CancelRejected {
            action_id: "a1".into(),
            reason: "already claimed".into(),
        }
        .into();
        assert_eq!(cancel.exit_code(), exit_code::CONFLICT);

        let transient: CliError = CoreError::TransportTransient {
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(transient.exit_code(), exit_code::CONNECTION);

        let invalid: CliError = CoreError::Validation {
            message: "illegal channel".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn missing_nic_points_at_node_show() {
        let err: CliError = CoreError::NotFound {
            entity_type: "nic",
            identifier: "nodeA/nic9".into(),
        }
        .into();
        match err {
            CliError::NotFound { list_command, .. } => {
                assert_eq!(list_command, "node show <node>");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
