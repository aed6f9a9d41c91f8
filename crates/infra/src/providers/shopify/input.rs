//! JSONL payload for the bulk `productCreate` mutation.

use std::collections::BTreeMap;

use serde::Serialize;

use storefront_catalog::Product;

/// Mutation run once per JSONL line by `bulkOperationRunMutation`.
pub const PRODUCT_CREATE_MUTATION: &str = r#"mutation call($input: ProductInput!, $media: [CreateMediaInput!]) {
  productCreate(input: $input, media: $media) {
    product { id title }
    userErrors { field message }
  }
}"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuantity {
    pub location_id: String,
    pub available_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub price: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inventory_quantities: Vec<InventoryQuantity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: String,
    pub description_html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub variants: Vec<VariantInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections_to_join: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMediaInput {
    pub original_source: String,
    pub media_content_type: &'static str,
}

impl CreateMediaInput {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            original_source: url.into(),
            media_content_type: "IMAGE",
        }
    }
}

/// Variables of one `productCreate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductLine {
    pub input: ProductInput,
    pub media: Vec<CreateMediaInput>,
}

/// Build the line for `product`.
///
/// `collection_ids` maps collection names to remote ids; names missing from
/// it are skipped. Inventory quantities are set only when `location` is known.
pub fn product_line(
    product: &Product,
    collection_ids: &BTreeMap<String, String>,
    location: Option<&str>,
    media_urls: Vec<String>,
) -> ProductLine {
    let price = product.price.to_decimal_string();
    let inventory = |stock: u32| -> Vec<InventoryQuantity> {
        location
            .map(|id| InventoryQuantity {
                location_id: id.to_string(),
                available_quantity: i64::from(stock),
            })
            .into_iter()
            .collect()
    };

    let matrix = product.variants();
    let (options, variants) = if matrix.is_empty() {
        (
            Vec::new(),
            vec![VariantInput {
                options: Vec::new(),
                price,
                inventory_quantities: inventory(product.stock),
            }],
        )
    } else {
        let variants = matrix
            .combinations
            .iter()
            .map(|combo| VariantInput {
                options: combo.clone(),
                price: price.clone(),
                inventory_quantities: inventory(product.stock),
            })
            .collect();
        (matrix.attribute_names.clone(), variants)
    };

    let mut collections_to_join: Vec<String> = Vec::new();
    for name in product.collection_names() {
        if let Some(id) = collection_ids.get(name) {
            if !collections_to_join.contains(id) {
                collections_to_join.push(id.clone());
            }
        }
    }

    ProductLine {
        input: ProductInput {
            title: product.name.clone(),
            description_html: product
                .description_html
                .clone()
                .unwrap_or_else(|| product.description.clone()),
            options,
            variants,
            collections_to_join,
        },
        media: media_urls.into_iter().map(CreateMediaInput::image).collect(),
    }
}

/// One JSON object per line, newline terminated.
pub fn to_jsonl(lines: &[ProductLine]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for line in lines {
        out.push_str(&serde_json::to_string(line)?);
        out.push('\n');
    }
    Ok(out)
}
