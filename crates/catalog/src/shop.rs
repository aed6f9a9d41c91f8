use serde::{Deserialize, Serialize};

use storefront_core::{Entity, ShopId};

/// External storefront platform a shop publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Bulk asynchronous mutations through a staged JSONL upload.
    Shopify,
    /// Synchronous per-resource REST calls.
    WooCommerce,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Shopify => "shopify",
            ProviderKind::WooCommerce => "woocommerce",
        }
    }
}

impl core::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopStatus {
    Draft,
    Active,
    Closed,
}

/// Provider credentials for one shop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Base URL of the store, e.g. `https://acme.myshopify.com`.
    pub store_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub access_token: Option<String>,
}

impl Credentials {
    pub fn store_url(&self) -> &str {
        self.store_url.trim_end_matches('/')
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("store_url", &self.store_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A shop: one external storefront with its provider and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub provider: ProviderKind,
    pub status: ShopStatus,
    pub credentials: Credentials,
}

impl Shop {
    pub fn is_active(&self) -> bool {
        self.status == ShopStatus::Active
    }
}

impl Entity for Shop {
    type Id = ShopId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
