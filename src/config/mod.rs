//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → moved into one Guard at construction
//! ```
//!
//! # Design Decisions
//! - Config is fixed once a guard is built; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdmissionConfig, AdmissionMode, CircuitConfig, ClientConfig, GuardConfig,
    ObservabilityConfig, WindowConfig,
};
pub use validation::{validate_config, ValidationError};
