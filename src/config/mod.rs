//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → CLI flag overrides applied in main
//!     → shared with the pool manager and membership controller
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no ambient singletons, constructors
//!   take the pieces they need explicitly
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CoreConfig, DockerConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, ResourcesConfig,
};
