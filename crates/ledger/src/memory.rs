//! In-memory stock ledger implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{ItemKey, ReservationId};
use tokio::sync::{Mutex, RwLock};

use crate::error::LedgerError;
use crate::store::{Hold, StockLedger};
use crate::Result;

/// Per-item state: the cached catalog total and the active holds.
#[derive(Debug, Default)]
struct ItemSlot {
    total_stock: u32,
    holds: HashMap<ReservationId, Hold>,
}

impl ItemSlot {
    /// Sum of hold quantities still counting against the item at `now`.
    fn held(&self, now: chrono::DateTime<chrono::Utc>) -> u32 {
        self.holds
            .values()
            .filter(|h| !h.is_expired(now))
            .map(|h| h.quantity)
            .sum()
    }

    fn available(&self, now: chrono::DateTime<chrono::Utc>) -> u32 {
        self.total_stock.saturating_sub(self.held(now))
    }
}

/// In-memory stock ledger.
///
/// Each item lives behind its own mutex, so operations on different items
/// never block each other; the outer map lock is held only long enough to
/// fetch the slot handle.
#[derive(Clone, Default)]
pub struct InMemoryStockLedger {
    items: Arc<RwLock<HashMap<ItemKey, Arc<Mutex<ItemSlot>>>>>,
    fail_on_release: Arc<AtomicBool>,
    fail_on_decrement: Arc<AtomicBool>,
}

impl InMemoryStockLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to fail hold releases.
    ///
    /// Test hook for exercising compensation and sweep error paths.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.fail_on_release.store(fail, Ordering::SeqCst);
    }

    /// Configures the ledger to fail total decrements.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.fail_on_decrement.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of holds currently registered for an item,
    /// expired or not.
    pub async fn hold_count(&self, item: &ItemKey) -> usize {
        match self.slot(item).await {
            Ok(slot) => slot.lock().await.holds.len(),
            Err(_) => 0,
        }
    }

    async fn slot(&self, item: &ItemKey) -> Result<Arc<Mutex<ItemSlot>>> {
        self.items
            .read()
            .await
            .get(item)
            .cloned()
            .ok_or_else(|| LedgerError::ItemNotFound(item.clone()))
    }
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn sync_item(&self, item: ItemKey, total_stock: u32) -> Result<()> {
        let slot = {
            let mut items = self.items.write().await;
            items.entry(item).or_default().clone()
        };
        slot.lock().await.total_stock = total_stock;
        Ok(())
    }

    async fn total_stock(&self, item: &ItemKey) -> Result<u32> {
        let slot = self.slot(item).await?;
        let total = slot.lock().await.total_stock;
        Ok(total)
    }

    async fn available_stock(&self, item: &ItemKey) -> Result<u32> {
        let slot = self.slot(item).await?;
        let available = slot.lock().await.available(Utc::now());
        Ok(available)
    }

    async fn register_hold(&self, item: &ItemKey, hold: Hold) -> Result<()> {
        let slot = self.slot(item).await?;
        let mut slot = slot.lock().await;

        let available = slot.available(Utc::now());
        if available < hold.quantity {
            return Err(LedgerError::InsufficientStock {
                item: item.clone(),
                requested: hold.quantity,
                available,
            });
        }

        slot.holds.insert(hold.reservation_id, hold);
        Ok(())
    }

    async fn release_hold(&self, item: &ItemKey, reservation_id: ReservationId) -> Result<()> {
        if self.fail_on_release.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("release failed".to_string()));
        }

        let slot = self.slot(item).await?;
        slot.lock().await.holds.remove(&reservation_id);
        Ok(())
    }

    async fn decrement_total(&self, item: &ItemKey, reservation_id: ReservationId) -> Result<u32> {
        if self.fail_on_decrement.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("decrement failed".to_string()));
        }

        let slot = self.slot(item).await?;
        let mut slot = slot.lock().await;

        let hold = slot
            .holds
            .remove(&reservation_id)
            .ok_or_else(|| LedgerError::HoldNotFound {
                item: item.clone(),
                reservation_id,
            })?;

        let now = Utc::now();
        let remaining_held = slot.held(now);
        let new_total = slot.total_stock.checked_sub(hold.quantity);

        match new_total {
            Some(new_total) if new_total >= remaining_held => {
                slot.total_stock = new_total;
                Ok(hold.quantity)
            }
            _ => {
                // Put the hold back so the failed decrement leaves no
                // observable mutation.
                let available = slot.total_stock.saturating_sub(remaining_held);
                slot.holds.insert(reservation_id, hold);
                tracing::error!(
                    %item,
                    %reservation_id,
                    "total decrement would undercut active holds; invariant broken upstream"
                );
                Err(LedgerError::InsufficientStock {
                    item: item.clone(),
                    requested: hold.quantity,
                    available,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item() -> ItemKey {
        ItemKey::product("SKU-001")
    }

    fn hold(quantity: u32) -> Hold {
        Hold::new(
            ReservationId::new(),
            quantity,
            Utc::now() + Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn test_sync_and_read_totals() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 10).await.unwrap();

        assert_eq!(ledger.total_stock(&item()).await.unwrap(), 10);
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_sync_refreshes_total_keeping_holds() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 10).await.unwrap();
        ledger.register_hold(&item(), hold(3)).await.unwrap();

        ledger.sync_item(item(), 20).await.unwrap();
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 17);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let ledger = InMemoryStockLedger::new();
        let result = ledger.available_stock(&item()).await;
        assert!(matches!(result, Err(LedgerError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_holds_reduce_availability() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 10).await.unwrap();

        ledger.register_hold(&item(), hold(3)).await.unwrap();
        ledger.register_hold(&item(), hold(4)).await.unwrap();

        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 3);
        assert_eq!(ledger.total_stock(&item()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_register_hold_rejects_shortfall() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();
        ledger.register_hold(&item(), hold(4)).await.unwrap();

        let result = ledger.register_hold(&item(), hold(2)).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(ledger.hold_count(&item()).await, 1);
    }

    #[tokio::test]
    async fn test_expired_holds_do_not_count() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();

        let stale = Hold::new(ReservationId::new(), 3, Utc::now() - Duration::seconds(1));
        ledger.register_hold(&item(), stale).await.unwrap();

        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_release_hold_restores_availability() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();

        let h = hold(3);
        ledger.register_hold(&item(), h).await.unwrap();
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 2);

        ledger.release_hold(&item(), h.reservation_id).await.unwrap();
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 5);

        // Releasing again is a no-op.
        ledger.release_hold(&item(), h.reservation_id).await.unwrap();
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_decrement_total_consumes_hold() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();

        let h = hold(2);
        ledger.register_hold(&item(), h).await.unwrap();

        let released = ledger
            .decrement_total(&item(), h.reservation_id)
            .await
            .unwrap();
        assert_eq!(released, 2);
        assert_eq!(ledger.total_stock(&item()).await.unwrap(), 3);
        // Available stock is unchanged: the hold already excluded it.
        assert_eq!(ledger.available_stock(&item()).await.unwrap(), 3);
        assert_eq!(ledger.hold_count(&item()).await, 0);
    }

    #[tokio::test]
    async fn test_decrement_without_hold_fails() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();

        let result = ledger.decrement_total(&item(), ReservationId::new()).await;
        assert!(matches!(result, Err(LedgerError::HoldNotFound { .. })));
        assert_eq!(ledger.total_stock(&item()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_decrement_undercutting_holds_fails_and_restores() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();

        // An expired hold whose stock has since been re-claimed.
        let stale = Hold::new(ReservationId::new(), 3, Utc::now() - Duration::seconds(1));
        ledger.register_hold(&item(), stale).await.unwrap();
        ledger.register_hold(&item(), hold(4)).await.unwrap();

        let result = ledger.decrement_total(&item(), stale.reservation_id).await;
        assert!(matches!(result, Err(LedgerError::InsufficientStock { .. })));

        // Nothing mutated: total intact, stale hold reinstated.
        assert_eq!(ledger.total_stock(&item()).await.unwrap(), 5);
        assert_eq!(ledger.hold_count(&item()).await, 2);
    }

    #[tokio::test]
    async fn test_fail_on_release() {
        let ledger = InMemoryStockLedger::new();
        ledger.sync_item(item(), 5).await.unwrap();
        let h = hold(1);
        ledger.register_hold(&item(), h).await.unwrap();

        ledger.set_fail_on_release(true);
        let result = ledger.release_hold(&item(), h.reservation_id).await;
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));

        ledger.set_fail_on_release(false);
        ledger.release_hold(&item(), h.reservation_id).await.unwrap();
    }
}
