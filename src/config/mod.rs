//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → cloned into producer / subscriber at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{resolve_config, ConfigError};
pub use schema::{
    Acks, BrokerConfig, ConsumerConfig, GeneratorConfig, ObservabilityConfig, OffsetReset,
    PipelineConfig, ProducerConfig,
};
