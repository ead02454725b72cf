//! YAML configuration loading.

use sim_core::{validate_config, GameConfig, ValidationError};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Parse and validate a YAML config. Missing keys take their defaults.
pub fn parse_config(text: &str) -> Result<GameConfig, ConfigError> {
    let cfg: GameConfig = if text.trim().is_empty() {
        GameConfig::default()
    } else {
        serde_yaml::from_str(text)?
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GameConfig, ConfigError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let cfg = parse_config(&text)?;
    info!(
        path = %path.as_ref().display(),
        desk_capacity = cfg.desk_capacity,
        victory_quarter = cfg.victory_quarter,
        "loaded game config"
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = parse_config(
            "desk_capacity: 30\neconomy:\n  baseline_salary: 12000\n  price_elasticity: -2.0\n",
        )
        .unwrap();
        assert_eq!(cfg.desk_capacity, 30);
        assert_eq!(cfg.victory_quarter, 40);
        assert_eq!(cfg.economy.baseline_salary, Decimal::new(12_000, 0));
        assert_eq!(cfg.economy.price_elasticity, -2.0);
        assert_eq!(cfg.economy.units_per_engineer, 400);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let cfg = parse_config(include_str!("../../../config/game.yaml")).unwrap();
        assert_eq!(cfg, GameConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(parse_config("").unwrap(), GameConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse_config("desk_capacity: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("desk_capacity: [1, 2]\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config("/nonexistent/startup-tycoon.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
