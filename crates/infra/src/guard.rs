//! Per-shop exclusion: at most one publish run per shop at a time, whoever
//! starts it (worker, job endpoint or direct publish).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use storefront_core::ShopId;

/// Shops with a run in flight.
#[derive(Debug, Clone, Default)]
pub struct ShopGuards {
    busy: Arc<Mutex<HashSet<ShopId>>>,
}

impl ShopGuards {
    /// Claim `shop_id`, or `None` when it already has a run in flight.
    pub fn try_claim(&self, shop_id: ShopId) -> Option<ShopGuard> {
        let mut busy = self.busy.lock().unwrap();
        if !busy.insert(shop_id) {
            return None;
        }
        Some(ShopGuard {
            shop_id,
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self, shop_id: ShopId) -> bool {
        self.busy.lock().unwrap().contains(&shop_id)
    }
}

/// Releases its shop on drop.
#[derive(Debug)]
pub struct ShopGuard {
    shop_id: ShopId,
    busy: Arc<Mutex<HashSet<ShopId>>>,
}

impl ShopGuard {
    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }
}

impl Drop for ShopGuard {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.shop_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_shop_can_be_claimed_once_at_a_time() {
        let guards = ShopGuards::default();
        let shop = ShopId::new();

        let first = guards.try_claim(shop).unwrap();
        assert_eq!(first.shop_id(), shop);
        assert!(guards.try_claim(shop).is_none());
        assert!(guards.try_claim(ShopId::new()).is_some());

        drop(first);
        assert!(!guards.is_busy(shop));
        assert!(guards.try_claim(shop).is_some());
    }

    #[test]
    fn clones_share_claims() {
        let guards = ShopGuards::default();
        let shared = guards.clone();
        let shop = ShopId::new();

        let _held = guards.try_claim(shop).unwrap();
        assert!(shared.is_busy(shop));
        assert!(shared.try_claim(shop).is_none());
    }
}
