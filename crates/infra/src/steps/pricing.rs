use async_trait::async_trait;
use tracing::debug;

use storefront_catalog::Product;
use storefront_workflow::{ComponentCode, Step, StepError, StepInputs};

use crate::context::PublishContext;

/// Scales prices by a percentage.
pub struct AdjustPriceStep;

#[async_trait]
impl Step<PublishContext> for AdjustPriceStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::AdjustPrice
    }

    async fn run(
        &self,
        _ctx: &PublishContext,
        mut batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let percent = inputs.decimal("percent")?;
        if !percent.is_finite() {
            return Err(StepError::Input("percent must be finite".to_string()));
        }
        for product in &mut batch {
            product.price = product.price.adjusted_by_percent(percent);
        }
        Ok(batch)
    }
}

/// Keeps products whose price lies within `[min, max]` (in major units).
pub struct FilterByPriceStep;

#[async_trait]
impl Step<PublishContext> for FilterByPriceStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::FilterByPrice
    }

    async fn run(
        &self,
        _ctx: &PublishContext,
        batch: Vec<Product>,
        inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        let min = inputs.decimal("min")?;
        let max = inputs.opt_decimal("max")?;
        if let Some(max) = max {
            if max < min {
                return Err(StepError::Input(format!("max {max} is below min {min}")));
            }
        }

        let before = batch.len();
        let kept: Vec<Product> = batch
            .into_iter()
            .filter(|p| {
                let price = p.price.amount_minor as f64 / 100.0;
                price >= min && max.is_none_or(|max| price <= max)
            })
            .collect();
        debug!(before, after = kept.len(), "batch filtered by price");
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{fixture, inputs, product};
    use serde_json::json;

    #[tokio::test]
    async fn adjust_price_rounds_half_away_from_zero() {
        let f = fixture();
        let out = AdjustPriceStep
            .run(
                &f.ctx,
                vec![product(&f.repo, "A", 1999)],
                &inputs(ComponentCode::AdjustPrice, json!({"percent": 10})),
            )
            .await
            .unwrap();
        assert_eq!(out[0].price.amount_minor, 2199);
    }

    #[tokio::test]
    async fn filter_keeps_bounds_inclusive() {
        let f = fixture();
        let batch = vec![
            product(&f.repo, "cheap", 499),
            product(&f.repo, "low", 500),
            product(&f.repo, "high", 2000),
            product(&f.repo, "luxury", 2001),
        ];

        let out = FilterByPriceStep
            .run(&f.ctx, batch, &inputs(ComponentCode::FilterByPrice, json!({"min": 5, "max": 20.0})))
            .await
            .unwrap();

        let names: Vec<_> = out.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["low", "high"]);
    }

    #[tokio::test]
    async fn inverted_bounds_are_rejected() {
        let f = fixture();
        let err = FilterByPriceStep
            .run(&f.ctx, vec![], &inputs(ComponentCode::FilterByPrice, json!({"min": 10, "max": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Input(_)));
    }
}
