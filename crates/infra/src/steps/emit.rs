use async_trait::async_trait;
use tracing::info;

use storefront_catalog::Product;
use storefront_workflow::{ComponentCode, Step, StepError, StepInputs};

use crate::context::PublishContext;

/// Hands the batch to the shop's provider adapter.
///
/// The report goes to the run's ledger. The batch is passed through unchanged.
pub struct EmitToShopStep;

#[async_trait]
impl Step<PublishContext> for EmitToShopStep {
    fn code(&self) -> ComponentCode {
        ComponentCode::EmitToShop
    }

    async fn run(
        &self,
        ctx: &PublishContext,
        batch: Vec<Product>,
        _inputs: &StepInputs,
    ) -> Result<Vec<Product>, StepError> {
        if batch.is_empty() {
            info!(run_id = %ctx.run.run_id(), "nothing left to emit");
            return Ok(batch);
        }

        match ctx
            .adapter
            .upload_product_many(&ctx.run, &ctx.shop, &batch)
            .await
        {
            Ok(report) => {
                info!(
                    run_id = %ctx.run.run_id(),
                    provider = %report.provider,
                    published = report.published.len(),
                    failed = report.failures.len(),
                    "batch emitted"
                );
                ctx.record_report(report);
                Ok(batch)
            }
            Err(e) => {
                let message = e.to_string();
                ctx.record_failure(e);
                Err(StepError::Provider(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{fixture, inputs, product};
    use serde_json::json;

    #[tokio::test]
    async fn emitted_report_lands_in_the_ledger() {
        let f = fixture();
        let batch = vec![product(&f.repo, "A", 100), product(&f.repo, "B", 200)];

        let out = EmitToShopStep
            .run(&f.ctx, batch, &inputs(ComponentCode::EmitToShop, json!({})))
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(f.api.products().len(), 2);
        let ledger = f.ctx.into_ledger();
        assert_eq!(ledger.reports()[0].published.len(), 2);
        assert!(ledger.failure().is_none());
    }

    #[tokio::test]
    async fn provider_failure_is_recorded() {
        let f = fixture();
        f.api.fail_category_creates();
        let batch = vec![product(&f.repo, "A", 100).with_category_path(["Mugs"])];

        let err = EmitToShopStep
            .run(&f.ctx, batch, &inputs(ComponentCode::EmitToShop, json!({})))
            .await
            .unwrap_err();

        assert!(matches!(err, StepError::Provider(_)));
        assert!(f.ctx.into_ledger().failure().is_some());
    }
}
