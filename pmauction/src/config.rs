//! Application configuration management.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables.

use pm_core::models::{MarketBasis, MarketBasisError};
use pm_han::HanCodec;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

/// The configuration of every subcommand
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    /// The market basis used wherever a scenario does not bring its own
    #[serde(default)]
    pub market: MarketConfig,

    /// How HAN messages are translated
    #[serde(default)]
    pub codec: CodecConfig,
}

/// A market basis, spelled out field by field so that each can be overridden
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    pub commodity: String,
    pub currency: String,
    pub price_steps: usize,
    pub minimum_price: f64,
    pub maximum_price: f64,
    pub market_ref: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            commodity: "electricity".to_owned(),
            currency: "EUR".to_owned(),
            price_steps: 255,
            minimum_price: -127.0,
            maximum_price: 127.0,
            market_ref: 0,
        }
    }
}

impl MarketConfig {
    pub fn basis(&self) -> Result<MarketBasis, MarketBasisError> {
        MarketBasis::new(
            self.commodity.as_str(),
            self.currency.as_str(),
            self.price_steps,
            self.minimum_price,
            self.maximum_price,
            self.market_ref,
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodecConfig {
    /// Translate decoded messages onto the configured market basis.
    /// When disabled, decoded messages keep the symmetric wire basis.
    pub map_to_market: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            map_to_market: true,
        }
    }
}

impl CodecConfig {
    /// A fresh codec for the configured market
    pub fn build(&self, market: &Arc<MarketBasis>) -> HanCodec {
        HanCodec::with_internal_basis(self.map_to_market.then(|| market.clone()))
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. The config file, if given
    /// 3. Default values (lowest priority)
    ///
    /// Environment variables are mapped using the pattern:
    /// `PM_<SECTION>__<KEY>` maps to `<section>.<key>`
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Trade in dollars
    /// export PM_MARKET__CURRENCY="USD"
    ///
    /// # Announce the market under reference 3
    /// export PM_MARKET__MARKET_REF=3
    ///
    /// # Keep decoded messages in the wire basis
    /// export PM_CODEC__MAP_TO_MARKET=false
    /// ```
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Start with default values
        config = config.add_source(config::Config::try_from(&Self::default())?);

        // Layer on config file if it is specified and exists
        if let Some(path) = path {
            if path.exists() {
                config = config.add_source(config::File::from(path))
            } else {
                return Err(anyhow::anyhow!(
                    "Config file {} does not exist",
                    path.display()
                ));
            }
        }

        // Override with environment variables
        // This maps PM_MARKET__PRICE_STEPS to market.price_steps
        config = config.add_source(
            config::Environment::with_prefix("PM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let built_config = config.build()?;
        built_config.try_deserialize().map_err(Into::into)
    }
}
