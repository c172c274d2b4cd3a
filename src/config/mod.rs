//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (TOML file, if given)
//!     → cli.rs (command-line overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Values are literal; nothing is computed from the file's contents
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::{
    HttpListenerConfig, ListenerConfig, LogLevel, LogMode, LoggingConfig, ProxyConfig, TlsListenerConfig,
};
pub use validation::{validate_config, ValidationError};
