//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → address.rs turns http.addr/http.port into a BindTarget at run time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; it is read once when the app runs
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod address;
pub mod loader;
pub mod schema;
pub mod validation;

pub use address::{AddressError, BindTarget, Network};
pub use loader::{load_config, ConfigError};
pub use schema::{HttpConfig, ObservabilityConfig, ServerConfig, WatchConfig};
