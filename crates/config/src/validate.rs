//! Configuration validation.
//!
//! Validates TOML configuration against the known schema, detects
//! unknown/misspelled fields and reports values that would make the closure
//! workflow misbehave.

use std::{collections::HashMap, path::Path};

use tickets_common::GuildId;

use crate::{
    env_subst::substitute_env,
    schema::{MAX_PAGE_SIZE, TicketsConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "bounds",
    /// "guild-id", "credentials", "env"
    pub category: &'static str,
    /// Dotted path, e.g. "closure.page_size"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Expected shape of the configuration.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Dynamic keys (guild ids) whose values have a known shape.
    Map(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    let guild_fields = || {
        Struct(HashMap::from([
            ("store_transcripts", Leaf),
            ("feedback_enabled", Leaf),
            ("archive_channel", Leaf),
            ("ticket_notification_channel", Leaf),
            ("allowed_categories", Leaf),
            ("max_transcript_messages", Leaf),
            ("autoclose_after_hours", Leaf),
            ("admin_users", Leaf),
            ("admin_roles", Leaf),
            ("support_users", Leaf),
            ("support_roles", Leaf),
        ]))
    };

    Struct(HashMap::from([
        (
            "database",
            Struct(HashMap::from([("url", Leaf), ("max_connections", Leaf)])),
        ),
        (
            "discord",
            Struct(HashMap::from([
                ("token", Leaf),
                ("api_base", Leaf),
                ("bot_user_id", Leaf),
                ("request_timeout_secs", Leaf),
            ])),
        ),
        (
            "archive",
            Struct(HashMap::from([
                ("backend", Leaf),
                ("url", Leaf),
                ("auth_token", Leaf),
                ("dir", Leaf),
            ])),
        ),
        (
            "closure",
            Struct(HashMap::from([
                ("page_size", Leaf),
                ("thread_archive_delay_ms", Leaf),
                ("force_close_delay_ms", Leaf),
                ("transcript_url", Leaf),
                ("autoclose_reason", Leaf),
            ])),
        ),
        ("metrics", Struct(HashMap::from([("enabled", Leaf)]))),
        ("defaults", guild_fields()),
        ("guilds", Map(Box::new(guild_fields()))),
    ]))
}

/// Validate the config file at `path`, or the discovered one when `None`.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::loader::find_or_default_config_path);

    match std::fs::read_to_string(&config_path) {
        Ok(raw) => {
            let mut result = validate_toml_str(&raw);
            result.config_path = Some(config_path);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read {}: {e}", config_path.display()),
            }],
            config_path: Some(config_path),
        },
    }
}

/// Validate TOML text.
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_unresolved_env(toml_str, &mut diagnostics);

    let substituted = substitute_env(toml_str);
    let value: toml::Value = match toml::from_str(&substituted) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: e.to_string(),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<TicketsConfig>(&substituted) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: e.to_string(),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(table) = value.as_table() else {
        return;
    };
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };

    match schema {
        KnownKeys::Struct(fields) => {
            for (key, child) in table {
                match fields.get(key.as_str()) {
                    Some(shape) => check_unknown_fields(child, shape, &join(key), diagnostics),
                    None => diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        category: "unknown-field",
                        path: join(key),
                        message: format!("unknown field \"{key}\""),
                    }),
                }
            }
        },
        KnownKeys::Map(shape) => {
            for (key, child) in table {
                check_unknown_fields(child, shape, &join(key), diagnostics);
            }
        },
        KnownKeys::Leaf => {},
    }
}

fn check_semantics(config: &TicketsConfig, diagnostics: &mut Vec<Diagnostic>) {
    let page_size = config.closure.page_size;
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "bounds",
            path: "closure.page_size".into(),
            message: format!("page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"),
        });
    }

    if config.closure.thread_archive_delay_ms < 100 {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "bounds",
            path: "closure.thread_archive_delay_ms".into(),
            message: "delays under 100ms are often rejected when archiving threads".into(),
        });
    }

    if !config.discord.has_token() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "credentials",
            path: "discord.token".into(),
            message: "no bot token configured; gateway calls will fail".into(),
        });
    }

    if config.defaults.max_transcript_messages == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "bounds",
            path: "defaults.max_transcript_messages".into(),
            message: "max_transcript_messages must be positive".into(),
        });
    }

    for (key, overrides) in &config.guilds {
        if key.parse::<GuildId>().is_err() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "guild-id",
                path: format!("guilds.{key}"),
                message: format!("\"{key}\" is not a guild id"),
            });
        }
        if overrides.max_transcript_messages == Some(0) {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "bounds",
                path: format!("guilds.{key}.max_transcript_messages"),
                message: "max_transcript_messages must be positive".into(),
            });
        }
    }
}

fn check_unresolved_env(toml_str: &str, diagnostics: &mut Vec<Diagnostic>) {
    let substituted = substitute_env(toml_str);
    for (idx, line) in substituted.lines().enumerate() {
        if line.contains("${") && !line.trim_start().starts_with('#') {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "env",
                path: format!("line {}", idx + 1),
                message: "unresolved environment variable placeholder".into(),
            });
        }
    }
}
