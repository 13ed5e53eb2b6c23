use crate::domain::flow::BillingFeature;
use crate::domain::outcome::ResponseCode;
use crate::domain::product::ProductDetails;
use crate::domain::purchase::Purchase;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Store operations whose response code can be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    Connect,
    QueryProductDetails,
    QueryPurchases,
    Launch,
    /// Code carried by the purchase update pushed after a launch.
    Purchase,
    Consume,
    Acknowledge,
}

/// Configuration of the in-memory store, usually read from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub products: Vec<ProductDetails>,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
    #[serde(default)]
    pub unsupported_features: Vec<BillingFeature>,
    #[serde(default)]
    pub responses: BTreeMap<StoreOperation, ResponseCode>,
    #[serde(default)]
    pub connect_delay_ms: u64,
}

impl StoreConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: StoreConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn response(&self, operation: StoreOperation) -> ResponseCode {
        self.responses.get(&operation).copied().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for product in &self.products {
            if !seen.insert((product.product_type, product.product_id.as_str())) {
                return Err(BridgeError::ConfigError(format!(
                    "duplicate product '{}'",
                    product.product_id
                )));
            }
        }

        let mut tokens = HashSet::new();
        for purchase in &self.purchases {
            if !tokens.insert(purchase.purchase_token.as_str()) {
                return Err(BridgeError::ConfigError(format!(
                    "duplicate purchase token '{}'",
                    purchase.purchase_token
                )));
            }
        }
        Ok(())
    }
}
