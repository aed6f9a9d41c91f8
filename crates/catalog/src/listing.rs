//! Product-on-shop listing: the publish status state machine.
//!
//! Allowed transitions:
//!
//! | from          | to            | via                                   |
//! |---------------|---------------|---------------------------------------|
//! | NotPublished  | Scheduled     | `schedule`                            |
//! | Scheduled     | Published     | `publish` (requires a provider receipt) |
//! | Scheduled     | NotPublished  | `release` (failed or filtered attempt)  |
//! | Published     | NotPublished  | `unpublish` (explicit action only)    |
//! | Published     | Published     | `record_republish` (receipt, no status change) |
//!
//! Every transition is appended to the listing history, which doubles as the
//! audit trail of provider calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, JobId, ProductId, RunId, ShopId};

use crate::shop::ProviderKind;

/// Publish status of a product on a shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    NotPublished,
    Scheduled,
    Published,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::NotPublished => "not_published",
            ListingStatus::Scheduled => "scheduled",
            ListingStatus::Published => "published",
        }
    }
}

/// Proof that a provider call accepted a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub provider: ProviderKind,
    pub run_id: RunId,
    /// Provider-side reference (bulk operation id, remote product id, ...).
    pub reference: String,
}

/// Why a transition happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TransitionReason {
    Scheduled { job_id: Option<JobId> },
    Published { receipt: PublishReceipt },
    Republished { receipt: PublishReceipt },
    Released { cause: String },
    Unpublished,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTransition {
    pub from: ListingStatus,
    pub to: ListingStatus,
    pub at: DateTime<Utc>,
    pub reason: TransitionReason,
}

/// Association of a product with a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOnShop {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    status: ListingStatus,
    history: Vec<ListingTransition>,
}

impl ProductOnShop {
    pub fn new(shop_id: ShopId, product_id: ProductId) -> Self {
        Self {
            shop_id,
            product_id,
            status: ListingStatus::NotPublished,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn history(&self) -> &[ListingTransition] {
        &self.history
    }

    /// NotPublished → Scheduled.
    pub fn schedule(&mut self, job_id: Option<JobId>, at: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            ListingStatus::NotPublished => {
                self.transition(ListingStatus::Scheduled, TransitionReason::Scheduled { job_id }, at);
                Ok(())
            }
            ListingStatus::Scheduled => Err(DomainError::conflict("listing is already scheduled")),
            ListingStatus::Published => Err(DomainError::invariant(
                "published listings cannot be rescheduled; republish instead",
            )),
        }
    }

    /// Scheduled → Published, backed by a provider receipt.
    pub fn publish(&mut self, receipt: PublishReceipt, at: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            ListingStatus::Scheduled => {
                self.transition(
                    ListingStatus::Published,
                    TransitionReason::Published { receipt },
                    at,
                );
                Ok(())
            }
            ListingStatus::Published => Err(DomainError::conflict("listing is already published")),
            ListingStatus::NotPublished => Err(DomainError::invariant(
                "listing must be scheduled before it is published",
            )),
        }
    }

    /// Record a successful re-push of an already published listing.
    pub fn record_republish(&mut self, receipt: PublishReceipt, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ListingStatus::Published {
            return Err(DomainError::invariant("only published listings can be republished"));
        }
        self.transition(
            ListingStatus::Published,
            TransitionReason::Republished { receipt },
            at,
        );
        Ok(())
    }

    /// Scheduled → NotPublished after a failed or filtered attempt.
    pub fn release(&mut self, cause: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            ListingStatus::Scheduled => {
                self.transition(
                    ListingStatus::NotPublished,
                    TransitionReason::Released {
                        cause: cause.into(),
                    },
                    at,
                );
                Ok(())
            }
            ListingStatus::NotPublished => Err(DomainError::conflict("listing is not scheduled")),
            ListingStatus::Published => Err(DomainError::invariant(
                "published listings are only withdrawn through unpublish",
            )),
        }
    }

    /// Published → NotPublished (explicit unpublish action).
    pub fn unpublish(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ListingStatus::Published {
            return Err(DomainError::conflict("listing is not published"));
        }
        self.transition(ListingStatus::NotPublished, TransitionReason::Unpublished, at);
        Ok(())
    }

    /// The job holding a Scheduled listing, if it was scheduled by one.
    pub fn scheduled_by(&self) -> Option<JobId> {
        if self.status != ListingStatus::Scheduled {
            return None;
        }
        self.history.iter().rev().find_map(|t| match t.reason {
            TransitionReason::Scheduled { job_id } => Some(job_id),
            _ => None,
        })?
    }

    /// The receipt of the most recent successful provider call, if any.
    pub fn last_receipt(&self) -> Option<&PublishReceipt> {
        self.history.iter().rev().find_map(|t| match &t.reason {
            TransitionReason::Published { receipt } | TransitionReason::Republished { receipt } => {
                Some(receipt)
            }
            _ => None,
        })
    }

    fn transition(&mut self, to: ListingStatus, reason: TransitionReason, at: DateTime<Utc>) {
        self.history.push(ListingTransition {
            from: self.status,
            to,
            at,
            reason,
        });
        self.status = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ProductOnShop {
        ProductOnShop::new(ShopId::new(), ProductId::new())
    }

    fn receipt() -> PublishReceipt {
        PublishReceipt {
            provider: ProviderKind::Shopify,
            run_id: RunId::new(),
            reference: "gid://shopify/BulkOperation/1".to_string(),
        }
    }

    #[test]
    fn happy_path_records_every_transition() {
        let mut l = listing();
        l.schedule(None, Utc::now()).unwrap();
        l.publish(receipt(), Utc::now()).unwrap();

        assert_eq!(l.status(), ListingStatus::Published);
        assert_eq!(l.history().len(), 2);
        assert_eq!(l.history()[0].from, ListingStatus::NotPublished);
        assert_eq!(l.history()[1].to, ListingStatus::Published);
        assert!(l.last_receipt().is_some());
    }

    #[test]
    fn scheduled_by_names_the_owning_job() {
        let job_id = JobId::new();
        let mut l = listing();
        assert_eq!(l.scheduled_by(), None);

        l.schedule(Some(job_id), Utc::now()).unwrap();
        assert_eq!(l.scheduled_by(), Some(job_id));

        l.release("failed", Utc::now()).unwrap();
        assert_eq!(l.scheduled_by(), None);
    }

    #[test]
    fn cannot_publish_without_scheduling() {
        let mut l = listing();
        let err = l.publish(receipt(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(l.status(), ListingStatus::NotPublished);
        assert!(l.history().is_empty());
    }

    #[test]
    fn release_returns_scheduled_listing_to_not_published() {
        let mut l = listing();
        l.schedule(None, Utc::now()).unwrap();
        l.release("provider rejected product", Utc::now()).unwrap();
        assert_eq!(l.status(), ListingStatus::NotPublished);
    }

    #[test]
    fn published_listing_is_never_released() {
        let mut l = listing();
        l.schedule(None, Utc::now()).unwrap();
        l.publish(receipt(), Utc::now()).unwrap();

        assert!(l.release("late failure", Utc::now()).is_err());
        assert!(l.schedule(None, Utc::now()).is_err());
        assert_eq!(l.status(), ListingStatus::Published);
    }

    #[test]
    fn unpublish_is_the_only_way_back_from_published() {
        let mut l = listing();
        l.schedule(None, Utc::now()).unwrap();
        l.publish(receipt(), Utc::now()).unwrap();
        l.unpublish(Utc::now()).unwrap();

        assert_eq!(l.status(), ListingStatus::NotPublished);
        assert_eq!(
            l.history().last().map(|t| &t.reason),
            Some(&TransitionReason::Unpublished)
        );
    }

    #[test]
    fn republish_keeps_status_and_appends_receipt() {
        let mut l = listing();
        assert!(l.record_republish(receipt(), Utc::now()).is_err());

        l.schedule(None, Utc::now()).unwrap();
        l.publish(receipt(), Utc::now()).unwrap();
        l.record_republish(receipt(), Utc::now()).unwrap();

        assert_eq!(l.status(), ListingStatus::Published);
        assert_eq!(l.history().len(), 3);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Schedule,
            Publish,
            Republish,
            Release,
            Unpublish,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Schedule),
                Just(Op::Publish),
                Just(Op::Republish),
                Just(Op::Release),
                Just(Op::Unpublish),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: Published is only entered from Scheduled with a receipt,
            /// and only left through an explicit unpublish.
            #[test]
            fn published_transitions_are_guarded(ops in prop::collection::vec(op(), 0..30)) {
                let mut l = listing();
                for op in ops {
                    let _ = match op {
                        Op::Schedule => l.schedule(None, Utc::now()),
                        Op::Publish => l.publish(receipt(), Utc::now()),
                        Op::Republish => l.record_republish(receipt(), Utc::now()),
                        Op::Release => l.release("x", Utc::now()),
                        Op::Unpublish => l.unpublish(Utc::now()),
                    };
                }

                let mut status = ListingStatus::NotPublished;
                for t in l.history() {
                    prop_assert_eq!(t.from, status);
                    if t.to == ListingStatus::Published && t.from != ListingStatus::Published {
                        prop_assert_eq!(t.from, ListingStatus::Scheduled);
                        let is_published = matches!(t.reason, TransitionReason::Published { .. });
                        prop_assert!(is_published);
                    }
                    if t.from == ListingStatus::Published && t.to == ListingStatus::NotPublished {
                        prop_assert_eq!(&t.reason, &TransitionReason::Unpublished);
                    }
                    status = t.to;
                }
                prop_assert_eq!(status, l.status());
            }
        }
    }
}
