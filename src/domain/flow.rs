use super::product::ProductDetails;
use serde::{Deserialize, Serialize};

/// Optional identifiers attached verbatim to a purchase-flow launch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PurchaseOptions {
    #[serde(default)]
    pub obfuscated_account_id: Option<String>,
    #[serde(default)]
    pub obfuscated_profile_id: Option<String>,
}

impl PurchaseOptions {
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.obfuscated_account_id = Some(account_id.into());
        self
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.obfuscated_profile_id = Some(profile_id.into());
        self
    }
}

/// Data needed to replace an existing subscription.
///
/// `replacement_mode` is the vendor's integer code, passed through unchecked
/// (1 = with time proration, 2 = charge prorated price, 3 = without proration,
/// 5 = charge full price, 6 = deferred).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeParameters {
    pub old_purchase_token: String,
    pub replacement_mode: i32,
}

impl UpgradeParameters {
    pub fn new(old_purchase_token: impl Into<String>, replacement_mode: i32) -> Self {
        Self {
            old_purchase_token: old_purchase_token.into(),
            replacement_mode,
        }
    }
}

/// The assembled request handed to the store's purchase-flow launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowParameters {
    pub product: ProductDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<UpgradeParameters>,
}

impl FlowParameters {
    pub fn new(product: ProductDetails) -> Self {
        Self {
            product,
            offer_token: None,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
            upgrade: None,
        }
    }

    pub fn with_offer_token(mut self, offer_token: impl Into<String>) -> Self {
        self.offer_token = Some(offer_token.into());
        self
    }

    /// Copies only the identifiers that are present; absent ones stay unset.
    pub fn with_options(mut self, options: &PurchaseOptions) -> Self {
        if let Some(account_id) = &options.obfuscated_account_id {
            self.obfuscated_account_id = Some(account_id.clone());
        }
        if let Some(profile_id) = &options.obfuscated_profile_id {
            self.obfuscated_profile_id = Some(profile_id.clone());
        }
        self
    }

    pub fn with_upgrade(mut self, upgrade: UpgradeParameters) -> Self {
        self.upgrade = Some(upgrade);
        self
    }
}

/// Store capabilities that can be probed without a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFeature {
    ProductDetails,
    Subscriptions,
    SubscriptionsUpdate,
}
