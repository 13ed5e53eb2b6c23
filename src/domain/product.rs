use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    OneTime,
    Subscription,
}

/// A product lookup: one product type, any number of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub product_type: ProductType,
    pub product_ids: BTreeSet<String>,
}

impl ProductQuery {
    pub fn new<I, S>(product_type: ProductType, product_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            product_type,
            product_ids: product_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(product_type: ProductType, product_id: impl Into<String>) -> Self {
        Self::new(product_type, [product_id.into()])
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.product_ids.contains(product_id)
    }
}

/// Converts a vendor price expressed in micro-units into an exact decimal.
pub fn price_from_micros(micros: i64) -> Decimal {
    Decimal::new(micros, 6).normalize()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeOffer {
    pub price_amount_micros: i64,
    pub formatted_price: String,
    pub price_currency_code: String,
}

impl OneTimeOffer {
    pub fn price(&self) -> Decimal {
        price_from_micros(self.price_amount_micros)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPhase {
    pub billing_period: String,
    pub formatted_price: String,
    pub price_amount_micros: i64,
    pub price_currency_code: String,
    #[serde(default)]
    pub billing_cycle_count: u32,
    #[serde(default)]
    pub recurrence_mode: i32,
}

impl PricingPhase {
    pub fn price(&self) -> Decimal {
        price_from_micros(self.price_amount_micros)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOffer {
    pub offer_token: String,
    pub base_plan_id: String,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub offer_tags: Vec<String>,
    #[serde(default)]
    pub pricing_phases: Vec<PricingPhase>,
}

/// Product record as returned by the store. Only the flow orchestration looks
/// inside it; everything else passes it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product_id: String,
    pub product_type: ProductType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub one_time_offer: Option<OneTimeOffer>,
    #[serde(default)]
    pub subscription_offers: Vec<SubscriptionOffer>,
}

impl ProductDetails {
    pub fn new(product_id: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            product_id: product_id.into(),
            product_type,
            title: String::new(),
            name: String::new(),
            description: String::new(),
            one_time_offer: None,
            subscription_offers: Vec::new(),
        }
    }

    pub fn with_offer(mut self, offer: SubscriptionOffer) -> Self {
        self.subscription_offers.push(offer);
        self
    }

    /// The offer used when launching a subscription flow: always the first
    /// one listed.
    pub fn first_offer(&self) -> Option<&SubscriptionOffer> {
        self.subscription_offers.first()
    }
}
