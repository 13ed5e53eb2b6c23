use super::product::ProductType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseState {
    #[default]
    Purchased,
    Pending,
    Unspecified,
}

/// A purchase owned by the user, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(default)]
    pub order_id: Option<String>,
    pub product_ids: Vec<String>,
    pub product_type: ProductType,
    pub purchase_token: String,
    #[serde(default)]
    pub purchase_state: PurchaseState,
    #[serde(default)]
    pub purchase_time: u64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub obfuscated_account_id: Option<String>,
    #[serde(default)]
    pub obfuscated_profile_id: Option<String>,
    #[serde(default)]
    pub original_json: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Purchase {
    pub fn new(
        product_id: impl Into<String>,
        product_type: ProductType,
        purchase_token: impl Into<String>,
    ) -> Self {
        Self {
            order_id: None,
            product_ids: vec![product_id.into()],
            product_type,
            purchase_token: purchase_token.into(),
            purchase_state: PurchaseState::Purchased,
            purchase_time: 0,
            quantity: default_quantity(),
            acknowledged: false,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
            original_json: None,
            signature: None,
        }
    }
}
