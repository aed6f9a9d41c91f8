//! Request bodies for product and variation creates.

use std::collections::BTreeMap;

use serde::Serialize;

use storefront_catalog::Product;

use crate::providers::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductAttribute {
    pub id: u64,
    pub visible: bool,
    pub variation: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<String>,
    pub description: String,
    pub categories: Vec<IdRef>,
    pub images: Vec<ImageRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ProductAttribute>,
    pub manage_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
}

impl ProductPayload {
    pub fn is_variable(&self) -> bool {
        self.kind == "variable"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariationAttribute {
    pub id: u64,
    pub option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariationPayload {
    pub regular_price: String,
    pub manage_stock: bool,
    pub stock_quantity: u32,
    pub attributes: Vec<VariationAttribute>,
}

/// Parse a remote id; WooCommerce ids are integers.
pub fn parse_id(raw: &str) -> Result<u64, ProviderError> {
    raw.parse()
        .map_err(|_| ProviderError::Decode(format!("`{raw}` is not a WooCommerce id")))
}

/// Ids of the categories `product` belongs to: its collections then its
/// category path, deduplicated.
pub fn category_refs(
    product: &Product,
    categories: &BTreeMap<String, String>,
) -> Result<Vec<IdRef>, ProviderError> {
    let mut refs: Vec<IdRef> = Vec::new();
    let names = product
        .collection_names()
        .into_iter()
        .chain(product.category_path.iter().map(String::as_str));
    for name in names {
        if let Some(raw) = categories.get(name) {
            let id = parse_id(raw)?;
            if !refs.iter().any(|r| r.id == id) {
                refs.push(IdRef { id });
            }
        }
    }
    Ok(refs)
}

/// Product body plus its variations. Variations are empty for a simple product.
pub fn product_payload(
    product: &Product,
    categories: &BTreeMap<String, String>,
    attributes: &BTreeMap<String, String>,
    image_urls: Vec<String>,
) -> Result<(ProductPayload, Vec<VariationPayload>), ProviderError> {
    let price = product.price.to_decimal_string();
    let matrix = product.variants();

    let mut payload = ProductPayload {
        name: product.name.clone(),
        kind: "simple",
        regular_price: Some(price.clone()),
        description: product
            .description_html
            .clone()
            .unwrap_or_else(|| product.description.clone()),
        categories: category_refs(product, categories)?,
        images: image_urls.into_iter().map(|src| ImageRef { src }).collect(),
        attributes: Vec::new(),
        manage_stock: true,
        stock_quantity: Some(product.stock),
    };

    if matrix.is_empty() {
        return Ok((payload, Vec::new()));
    }

    let mut attribute_ids = Vec::with_capacity(matrix.attribute_names.len());
    for name in &matrix.attribute_names {
        let raw = attributes
            .get(name)
            .ok_or_else(|| ProviderError::Decode(format!("attribute `{name}` was not resolved")))?;
        attribute_ids.push(parse_id(raw)?);
    }

    let domains = product.attribute_domains();
    payload.kind = "variable";
    payload.regular_price = None;
    payload.manage_stock = false;
    payload.stock_quantity = None;
    payload.attributes = matrix
        .attribute_names
        .iter()
        .zip(&attribute_ids)
        .map(|(name, id)| ProductAttribute {
            id: *id,
            visible: true,
            variation: true,
            options: domains.values(name).map(<[String]>::to_vec).unwrap_or_default(),
        })
        .collect();

    let variations = matrix
        .combinations
        .iter()
        .map(|combo| VariationPayload {
            regular_price: price.clone(),
            manage_stock: true,
            stock_quantity: product.stock,
            attributes: attribute_ids
                .iter()
                .zip(combo)
                .map(|(id, option)| VariationAttribute {
                    id: *id,
                    option: option.clone(),
                })
                .collect(),
        })
        .collect();

    Ok((payload, variations))
}
