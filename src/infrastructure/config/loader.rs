use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::{GeneConfig, PipelineConfig};

/// Project configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "phylogen.yaml";

/// Optional local overrides, merged over [`CONFIG_FILE`]
pub const LOCAL_CONFIG_FILE: &str = "phylogen.local.yaml";

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "PHYLOGEN_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid mingaps for gene {gene}: {value}. Must be between 0 and 1")]
    InvalidMingaps { gene: String, value: f64 },

    #[error("Invalid minoverlap for gene {gene}: must be positive")]
    InvalidMinoverlap { gene: String },

    #[error("Invalid maxtrys for gene {gene}: must be positive")]
    InvalidGeneMaxtrys { gene: String },

    #[error("Invalid maxseedtrys for gene {gene}: must be positive")]
    InvalidMaxseedtrys { gene: String },

    #[error("Invalid seed size for gene {gene}: minseedsize {min} must be at least 2 and not above maxseedsize {max}")]
    InvalidSeedSize { gene: String, min: usize, max: usize },

    #[error("Invalid rttstat: {0}. Must be positive")]
    InvalidRttstat(f64),

    #[error("Invalid naligns: must be positive")]
    InvalidNaligns,

    #[error("Invalid nphylos: must be positive")]
    InvalidNphylos,

    #[error("Invalid maxtrys: must be positive")]
    InvalidMaxtrys,

    #[error("Invalid threads: must be positive")]
    InvalidThreads,

    #[error("Invalid min_species: {0}. Must be at least 3")]
    InvalidMinSpecies(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Tool executable for {0} cannot be empty")]
    EmptyToolPath(&'static str),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the working directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. phylogen.yaml
    /// 3. phylogen.local.yaml (optional overrides)
    /// 4. Environment variables (PHYLOGEN_* prefix, highest priority)
    pub fn load() -> Result<PipelineConfig> {
        Self::load_in(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`], looking for the files in `dir`
    pub fn load_in(dir: &Path) -> Result<PipelineConfig> {
        let config: PipelineConfig = Figment::new()
            .merge(Serialized::defaults(PipelineConfig::default()))
            .merge(Yaml::file(dir.join(CONFIG_FILE)))
            .merge(Yaml::file(dir.join(LOCAL_CONFIG_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<PipelineConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: PipelineConfig = Figment::new()
            .merge(Serialized::defaults(PipelineConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
        if config.naligns == 0 {
            return Err(ConfigError::InvalidNaligns);
        }
        if config.nphylos == 0 {
            return Err(ConfigError::InvalidNphylos);
        }
        if config.maxtrys == 0 {
            return Err(ConfigError::InvalidMaxtrys);
        }
        if config.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        if config.rttstat.is_nan() || config.rttstat <= 0.0 {
            return Err(ConfigError::InvalidRttstat(config.rttstat));
        }
        if config.min_species < 3 {
            return Err(ConfigError::InvalidMinSpecies(config.min_species));
        }

        Self::validate_gene("default", &config.default_gene)?;
        for (name, gene) in &config.genes {
            Self::validate_gene(name, gene)?;
        }

        if config.tools.mafft.is_empty() {
            return Err(ConfigError::EmptyToolPath("mafft"));
        }
        if config.tools.raxml.is_empty() {
            return Err(ConfigError::EmptyToolPath("raxml"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }

    fn validate_gene(name: &str, gene: &GeneConfig) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&gene.mingaps) {
            return Err(ConfigError::InvalidMingaps {
                gene: name.to_string(),
                value: gene.mingaps,
            });
        }
        if gene.minoverlap == 0 {
            return Err(ConfigError::InvalidMinoverlap {
                gene: name.to_string(),
            });
        }
        if gene.maxtrys == 0 {
            return Err(ConfigError::InvalidGeneMaxtrys {
                gene: name.to_string(),
            });
        }
        if gene.maxseedtrys == 0 {
            return Err(ConfigError::InvalidMaxseedtrys {
                gene: name.to_string(),
            });
        }
        if gene.minseedsize < 2 || gene.maxseedsize < gene.minseedsize {
            return Err(ConfigError::InvalidSeedSize {
                gene: name.to_string(),
                min: gene.minseedsize,
                max: gene.maxseedsize,
            });
        }
        Ok(())
    }
}
