use async_trait::async_trait;

use storefront_catalog::Product;
use storefront_workflow::{ComponentCode, Step, StepError, StepInputs};

use crate::context::PublishContext;

/// Rewrites product names through the language-model collaborator.
pub struct RewriteNameStep;

#[async_trait]
impl Step<PublishContext> for RewriteNameStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::RewriteName
    }

    async fn run(
        &self,
        ctx: &PublishContext,
        mut batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let instructions = inputs.text("instructions")?;
        let max_length = usize::try_from(inputs.integer("max_length")?)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| StepError::Input("max_length must be positive".to_string()))?;

        for product in &mut batch {
            let rewritten = ctx
                .services
                .rewriter
                .rewrite(&product.name, instructions, max_length)
                .await
                .map_err(|e| StepError::Collaborator(e.to_string()))?;
            let rewritten = rewritten.trim();
            // An empty answer keeps the current name.
            if !rewritten.is_empty() {
                product.name = rewritten.chars().take(max_length).collect();
            }
        }
        Ok(batch)
    }
}

/// Replace `{name}`, `{price}`, `{currency}` and `{collection}` in `template`.
pub fn render_template(template: &str, product: &Product) -> String {
    let collection = product
        .collections
        .first()
        .map(|c| c.name.as_str())
        .unwrap_or("");
    template
        .replace("{name}", &product.name)
        .replace("{price}", &product.price.to_decimal_string())
        .replace("{currency}", &product.price.currency)
        .replace("{collection}", collection)
}

/// Renames products from a template.
pub struct NameTemplateStep;

#[async_trait]
impl Step<PublishContext> for NameTemplateStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::NameTemplate
    }

    async fn run(
        &self,
        _ctx: &PublishContext,
        mut batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let template = inputs.text("template")?;
        for product in &mut batch {
            let name = render_template(template, product);
            let name = name.trim();
            if name.is_empty() {
                return Err(StepError::Input(format!(
                    "template renders an empty name for product {}",
                    product.id
                )));
            }
            product.name = name.to_string();
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{fixture, inputs, product};
    use serde_json::json;
    use storefront_catalog::Collection;

    #[test]
    fn template_placeholders_are_replaced() {
        let f = fixture();
        let p = product(&f.repo, "Linen tee", 2450)
            .with_collection(Collection::new("Summer", "").unwrap());
        assert_eq!(
            render_template("{collection}: {name} ({price} {currency})", &p),
            "Summer: Linen tee (24.50 EUR)"
        );
    }

    #[tokio::test]
    async fn name_template_renames_every_product() {
        let f = fixture();
        let batch = vec![product(&f.repo, "A", 100), product(&f.repo, "B", 200)];

        let out = NameTemplateStep
            .run(&f.ctx, batch, &inputs(ComponentCode::NameTemplate, json!({"template": "Acme {name}"})))
            .await
            .unwrap();

        let names: Vec<_> = out.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Acme A", "Acme B"]);
    }

    #[tokio::test]
    async fn blank_template_result_is_rejected() {
        let f = fixture();
        let err = NameTemplateStep
            .run(
                &f.ctx,
                vec![product(&f.repo, "A", 100)],
                &inputs(ComponentCode::NameTemplate, json!({"template": "{collection}"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Input(_)));
    }

    #[tokio::test]
    async fn rewrite_respects_max_length() {
        let f = fixture();
        let out = RewriteNameStep
            .run(
                &f.ctx,
                vec![product(&f.repo, "  Very   long product name ", 100)],
                &inputs(
                    ComponentCode::RewriteName,
                    json!({"instructions": "shorter", "max_length": 9}),
                ),
            )
            .await
            .unwrap();
        assert_eq!(out[0].name, "Very long");
    }
}
