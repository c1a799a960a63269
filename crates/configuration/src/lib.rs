// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{
    BrokerConfig, CacheConfig, Config, ExhaustionConfig, ExhaustionPolicy, RiskConfig,
    ScoringConfig, StateConfig, TelegramConfig, TradingConfig,
};

/// Loads and validates the application configuration.
///
/// This function is the primary entry point for this crate. It reads the
/// configuration file, layers `ZONEFLOW_*` environment variables on top
/// (useful for notifier credentials), deserializes the result into our
/// strongly-typed `Config` struct, and validates it. An invalid
/// configuration is fatal: the caller is expected to refuse to run.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("ZONEFLOW").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
