use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, ImageId, ProductId};

use crate::collection::Collection;
use crate::variants::{AttributeDomains, VariantMatrix, expand};

/// Price in smallest currency unit (e.g., cents) plus ISO currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount_minor: u64,
    pub currency: String,
}

impl Price {
    pub fn new(amount_minor: u64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    /// Decimal rendering with two fraction digits, e.g. `1999` → `"19.99"`.
    ///
    /// Both storefront APIs take prices as decimal strings.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.amount_minor / 100, self.amount_minor % 100)
    }

    /// Apply a percentage change, rounding half away from zero.
    ///
    /// Negative results clamp to zero.
    pub fn adjusted_by_percent(&self, percent: f64) -> Self {
        let scaled = (self.amount_minor as f64) * (1.0 + percent / 100.0);
        Self {
            amount_minor: scaled.round().max(0.0) as u64,
            currency: self.currency.clone(),
        }
    }
}

/// A product image.
///
/// `source` is where the image came from (remote URL or `data:` URI from an
/// import). `durable_url` is set once the image has been synced to media
/// storage; providers only ever see durable URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub source: String,
    pub durable_url: Option<String>,
    /// Opaque storage reference (public id) returned by the media storage.
    pub storage_ref: Option<String>,
    pub position: u32,
}

impl Image {
    pub fn new(source: impl Into<String>, position: u32) -> Self {
        Self {
            id: ImageId::new(),
            source: source.into(),
            durable_url: None,
            storage_ref: None,
            position,
        }
    }

    pub fn is_data_uri(&self) -> bool {
        self.source.starts_with("data:")
    }

    pub fn is_synced(&self) -> bool {
        self.durable_url.is_some()
    }

    pub fn mark_synced(&mut self, url: impl Into<String>, storage_ref: impl Into<String>) {
        self.durable_url = Some(url.into());
        self.storage_ref = Some(storage_ref.into());
    }
}

/// One `(product, attribute name, attribute value)` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantAttribute {
    pub product_id: ProductId,
    pub name: String,
    pub value: String,
}

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub description_html: Option<String>,
    pub category_path: Vec<String>,
    pub images: Vec<Image>,
    pub collections: Vec<Collection>,
    /// Units on hand, applied to every variant when the shop has a location.
    #[serde(default)]
    pub stock: u32,
    variant_attributes: Vec<VariantAttribute>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Price) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if price.currency.trim().is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }

        Ok(Self {
            id,
            name,
            price,
            description: String::new(),
            description_html: None,
            category_path: Vec::new(),
            images: Vec::new(),
            collections: Vec::new(),
            stock: 0,
            variant_attributes: Vec::new(),
        })
    }

    pub fn with_description(mut self, text: impl Into<String>, html: Option<String>) -> Self {
        self.description = text.into();
        self.description_html = html;
        self
    }

    pub fn with_category_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_image(mut self, source: impl Into<String>) -> Self {
        let position = self.images.len() as u32;
        self.images.push(Image::new(source, position));
        self
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        if !self.collections.iter().any(|c| c.name == collection.name) {
            self.collections.push(collection);
        }
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_variant_attribute(name, value);
        self
    }

    /// Add a variant attribute row; returns `false` if the exact row already exists.
    pub fn add_variant_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let row = VariantAttribute {
            product_id: self.id,
            name: name.into(),
            value: value.into(),
        };
        if self.variant_attributes.contains(&row) {
            return false;
        }
        self.variant_attributes.push(row);
        true
    }

    pub fn variant_attributes(&self) -> &[VariantAttribute] {
        &self.variant_attributes
    }

    /// Distinct attribute names in first-occurrence order.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.variant_attributes {
            if !names.contains(&row.name.as_str()) {
                names.push(&row.name);
            }
        }
        names
    }

    pub fn attribute_domains(&self) -> AttributeDomains {
        AttributeDomains::from_rows(
            self.variant_attributes
                .iter()
                .map(|row| (row.name.clone(), row.value.clone())),
        )
    }

    pub fn variants(&self) -> VariantMatrix {
        expand(&self.attribute_domains())
    }

    /// Collection names followed by category path entries, deduplicated.
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self
            .collections
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.category_path.iter().map(String::as_str))
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
