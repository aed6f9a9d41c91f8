//! Workflow step implementations over [`PublishContext`].

mod emit;
mod images;
mod metadata;
mod naming;
mod pricing;

use storefront_workflow::StepRegistry;

use crate::context::PublishContext;

pub use emit::EmitToShopStep;
pub use images::SyncImagesStep;
pub use metadata::SetImageMetadataStep;
pub use naming::{NameTemplateStep, RewriteNameStep, render_template};
pub use pricing::{AdjustPriceStep, FilterByPriceStep};

/// Implementations for every standard component.
pub fn standard_steps() -> StepRegistry<PublishContext> {
    StepRegistry::new()
        .with(SyncImagesStep)
        .with(SetImageMetadataStep)
        .with(RewriteNameStep)
        .with(NameTemplateStep)
        .with(AdjustPriceStep)
        .with(FilterByPriceStep)
        .with(EmitToShopStep)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::Value;
    use storefront_catalog::{Credentials, Price, Product, ProviderKind, Shop, ShopStatus};
    use storefront_core::{ProductId, ShopId};
    use storefront_workflow::{ComponentCode, ComponentRegistry, StepInputs, decode_inputs};

    use crate::context::{PublishContext, Services};
    use crate::providers::WooCommerceAdapter;
    use crate::providers::memory::InMemoryWooCommerce;
    use crate::repository::InMemoryCatalogRepository;

    pub struct Fixture {
        pub repo: Arc<InMemoryCatalogRepository>,
        pub api: Arc<InMemoryWooCommerce>,
        pub ctx: PublishContext,
    }

    pub fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryCatalogRepository::new());
        fixture_with(Services::in_memory(repo.clone()), repo)
    }

    pub fn fixture_with(services: Services, repo: Arc<InMemoryCatalogRepository>) -> Fixture {
        let shop = Shop {
            id: ShopId::new(),
            name: "Corner".into(),
            provider: ProviderKind::WooCommerce,
            status: ShopStatus::Active,
            credentials: Credentials {
                store_url: "https://corner.example".into(),
                api_key: "ck".into(),
                api_secret: "cs".into(),
                access_token: None,
            },
        };
        repo.insert_shop(shop.clone());
        let api = Arc::new(InMemoryWooCommerce::new());
        let adapter = Arc::new(WooCommerceAdapter::new(api.clone(), services.media_sync()));
        Fixture {
            repo,
            api,
            ctx: PublishContext::new(shop, adapter, services),
        }
    }

    pub fn product(repo: &InMemoryCatalogRepository, name: &str, cents: u64) -> Product {
        let product = Product::new(ProductId::new(), name, Price::new(cents, "EUR")).unwrap();
        repo.insert_product(product.clone());
        product
    }

    pub fn inputs(code: ComponentCode, raw: Value) -> StepInputs {
        let registry = ComponentRegistry::standard();
        let raw = raw.as_object().cloned().unwrap_or_default();
        decode_inputs(registry.get(code).unwrap(), &raw).unwrap()
    }
}
