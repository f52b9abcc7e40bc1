//! Configuration loading, validation and env substitution.
//!
//! Config files: `tickets.toml`, `tickets.yaml` or `tickets.json`,
//! searched in `./` then `~/.config/tickets/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_or_default_config_path, load_config},
    schema::{
        ArchiveConfig, ClosureConfig, DatabaseConfig, DiscordConfig, GuildOverrides,
        GuildSettings, MAX_PAGE_SIZE, MetricsConfig, TicketsConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
