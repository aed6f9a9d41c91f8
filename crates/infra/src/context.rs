//! Run context handed to every workflow step.

use std::sync::{Arc, Mutex};

use storefront_catalog::Shop;

use crate::collaborators::{
    ImageFetcher, ImageMetadataEditor, InMemoryMediaStorage, InMemoryMetadataEditor, MediaStorage,
    StaticImageFetcher, TextRewriter, TruncatingRewriter,
};
use crate::media::MediaSync;
use crate::providers::{ProviderAdapter, ProviderError, UploadReport};
use crate::repository::CatalogRepository;
use crate::run::PublishRun;

/// Collaborators shared by all runs.
#[derive(Clone)]
pub struct Services {
    pub repository: Arc<dyn CatalogRepository>,
    pub media: Arc<dyn MediaStorage>,
    pub metadata: Arc<dyn ImageMetadataEditor>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub rewriter: Arc<dyn TextRewriter>,
}

impl Services {
    /// In-memory collaborators around `repository`, for tests and local runs.
    pub fn in_memory(repository: Arc<dyn CatalogRepository>) -> Self {
        Self {
            repository,
            media: Arc::new(InMemoryMediaStorage::default()),
            metadata: Arc::new(InMemoryMetadataEditor::new()),
            fetcher: Arc::new(StaticImageFetcher::any(b"image".to_vec())),
            rewriter: Arc::new(TruncatingRewriter),
        }
    }

    pub fn media_sync(&self) -> MediaSync {
        MediaSync::new(Arc::clone(&self.media), Arc::clone(&self.repository))
    }
}

/// What emit steps did during one run.
#[derive(Debug, Default)]
pub struct EmitLedger {
    reports: Vec<UploadReport>,
    failure: Option<ProviderError>,
}

impl EmitLedger {
    pub fn reports(&self) -> &[UploadReport] {
        &self.reports
    }

    pub fn failure(&self) -> Option<&ProviderError> {
        self.failure.as_ref()
    }

    pub fn emitted(&self) -> bool {
        !self.reports.is_empty()
    }

    /// All reports folded into one, if anything was emitted.
    pub fn merged(self) -> Option<UploadReport> {
        let mut reports = self.reports.into_iter();
        let mut first = reports.next()?;
        for report in reports {
            first.merge(report);
        }
        Some(first)
    }
}

pub struct PublishContext {
    pub shop: Shop,
    pub run: PublishRun,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub services: Services,
    ledger: Mutex<EmitLedger>,
}

impl PublishContext {
    /// Context for a fresh run against `shop`.
    pub fn new(shop: Shop, adapter: Arc<dyn ProviderAdapter>, services: Services) -> Self {
        Self {
            run: PublishRun::new(shop.id),
            shop,
            adapter,
            services,
            ledger: Mutex::new(EmitLedger::default()),
        }
    }

    pub fn record_report(&self, report: UploadReport) {
        self.ledger.lock().unwrap().reports.push(report);
    }

    pub fn record_failure(&self, error: ProviderError) {
        self.ledger.lock().unwrap().failure = Some(error);
    }

    pub fn into_ledger(self) -> EmitLedger {
        self.ledger.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_catalog::ProviderKind;
    use storefront_core::ProductId;

    #[test]
    fn merged_ledger_folds_reports() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut first = UploadReport::new(ProviderKind::WooCommerce);
        first.published(a, "1");
        let mut second = UploadReport::new(ProviderKind::WooCommerce);
        second.failed(b, "rejected");

        let ledger = EmitLedger {
            reports: vec![first, second],
            failure: None,
        };
        assert!(ledger.emitted());
        let merged = ledger.merged().unwrap();
        assert_eq!(merged.published.len(), 1);
        assert_eq!(merged.failures.len(), 1);

        assert!(EmitLedger::default().merged().is_none());
    }
}
