//! Pipeline configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Syrup;

/// Default ingredient description file.
pub const DEFAULT_INGREDIENTS_FILE: &str = "data/ingredients.txt";

/// Default name denylist file.
pub const DEFAULT_DENYLIST_FILE: &str = "data/name_denylist.txt";

/// Inclusive range order codes are drawn from.
pub const ORDER_CODE_MIN: u32 = 100_000;
pub const ORDER_CODE_MAX: u32 = 999_999;

/// Object store prefix for cocktail images.
pub const IMAGE_KEY_PREFIX: &str = "cocktails";

/// Style hint used when the caller gives none.
pub const DEFAULT_STYLE_HINT: &str = "casual and approachable";

/// Percentage ceilings the recipe prompt asks for and normalization enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioLimits {
    /// Upper bound for every syrup.
    pub ceiling: u8,
    /// Lower upper bound for the white syrup, which overpowers the others.
    pub capped_ceiling: u8,
}

impl RatioLimits {
    pub fn limit_for(&self, syrup: Syrup) -> u8 {
        match syrup {
            Syrup::White => self.capped_ceiling.min(self.ceiling),
            _ => self.ceiling,
        }
    }
}

impl Default for RatioLimits {
    fn default() -> Self {
        Self {
            ceiling: 25,
            capped_ceiling: 10,
        }
    }
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ingredients_file: PathBuf,
    pub denylist_file: PathBuf,
    pub text_timeout: Duration,
    pub image_timeout: Duration,
    /// Local name recombination attempts before asking the model again.
    pub max_name_retries: usize,
    /// Order code candidates tried before giving up.
    pub max_code_attempts: usize,
    pub target_width: u32,
    pub target_height: u32,
    /// Size requested from the image service, e.g. "1024x1536".
    pub image_size: String,
    pub image_quality: String,
    pub ratio_limits: RatioLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingredients_file: PathBuf::from(DEFAULT_INGREDIENTS_FILE),
            denylist_file: PathBuf::from(DEFAULT_DENYLIST_FILE),
            text_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(60),
            max_name_retries: 3,
            max_code_attempts: 10,
            target_width: 720,
            target_height: 1080,
            image_size: "1024x1536".to_string(),
            image_quality: "low".to_string(),
            ratio_limits: RatioLimits::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `SHAKER_INGREDIENTS_FILE` (default: "data/ingredients.txt")
    /// - `SHAKER_DENYLIST_FILE` (default: "data/name_denylist.txt")
    /// - `SHAKER_TEXT_TIMEOUT_SECS` (default: 30)
    /// - `SHAKER_IMAGE_TIMEOUT_SECS` (default: 60)
    /// - `SHAKER_MAX_NAME_RETRIES` (default: 3)
    /// - `SHAKER_MAX_CODE_ATTEMPTS` (default: 10)
    /// - `SHAKER_TARGET_WIDTH` / `SHAKER_TARGET_HEIGHT` (default: 720 x 1080)
    /// - `SHAKER_IMAGE_SIZE` (default: "1024x1536")
    /// - `SHAKER_IMAGE_QUALITY` (default: "low")
    /// - `SHAKER_RATIO_CEILING` (default: 25)
    /// - `SHAKER_CAPPED_RATIO_CEILING` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            ingredients_file: env::var("SHAKER_INGREDIENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.ingredients_file),
            denylist_file: env::var("SHAKER_DENYLIST_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.denylist_file),
            text_timeout: Duration::from_secs(parse_var(
                "SHAKER_TEXT_TIMEOUT_SECS",
                defaults.text_timeout.as_secs(),
            )?),
            image_timeout: Duration::from_secs(parse_var(
                "SHAKER_IMAGE_TIMEOUT_SECS",
                defaults.image_timeout.as_secs(),
            )?),
            max_name_retries: parse_var("SHAKER_MAX_NAME_RETRIES", defaults.max_name_retries)?,
            max_code_attempts: parse_var("SHAKER_MAX_CODE_ATTEMPTS", defaults.max_code_attempts)?,
            target_width: parse_var("SHAKER_TARGET_WIDTH", defaults.target_width)?,
            target_height: parse_var("SHAKER_TARGET_HEIGHT", defaults.target_height)?,
            image_size: env::var("SHAKER_IMAGE_SIZE").unwrap_or(defaults.image_size),
            image_quality: env::var("SHAKER_IMAGE_QUALITY").unwrap_or(defaults.image_quality),
            ratio_limits: RatioLimits {
                ceiling: parse_var("SHAKER_RATIO_CEILING", defaults.ratio_limits.ceiling)?,
                capped_ceiling: parse_var(
                    "SHAKER_CAPPED_RATIO_CEILING",
                    defaults.ratio_limits.capped_ceiling,
                )?,
            },
        };

        if config.max_code_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SHAKER_MAX_CODE_ATTEMPTS".to_string(),
                value: "0".to_string(),
            });
        }
        if config.target_width == 0 || config.target_height == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SHAKER_TARGET_WIDTH/SHAKER_TARGET_HEIGHT".to_string(),
                value: format!("{}x{}", config.target_width, config.target_height),
            });
        }

        Ok(config)
    }
}

/// Read and parse an optional variable. Unset means default; unparseable is an error.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
