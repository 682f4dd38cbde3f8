use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use tillpoint_catalog::InMemoryCatalog;
use tillpoint_core::{TransactionId, TransactionItemId};
use tillpoint_sales::{NewTransaction, Transaction, TransactionItem};

use super::query::{ListQuery, Page, SortDirection, SortKey};
use super::{StoreError, TransactionStore};

#[derive(Debug, Default)]
struct State {
    last_transaction_id: i64,
    last_item_id: i64,
    transactions: BTreeMap<TransactionId, Transaction>,
}

/// In-memory transaction store.
///
/// Intended for tests/dev. Stock lives in the shared `InMemoryCatalog`, so a
/// committed sale is immediately visible to catalog lookups. Lock order is
/// always store state first, then the catalog's stock table.
#[derive(Debug)]
pub struct InMemoryTransactionStore {
    state: RwLock<State>,
    stock: Arc<InMemoryCatalog>,
    offline: AtomicBool,
}

impl InMemoryTransactionStore {
    pub fn new(stock: Arc<InMemoryCatalog>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            stock,
            offline: AtomicBool::new(false),
        }
    }

    /// The catalog whose stock counters this store decrements.
    pub fn stock_table(&self) -> &Arc<InMemoryCatalog> {
        &self.stock
    }

    /// Simulate a storage outage: every operation fails with `Storage`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored transactions, soft-deleted ones included.
    pub fn stored_count(&self) -> usize {
        self.state
            .read()
            .map(|s| s.transactions.len())
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("storage offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.ensure_online()?;
        self.state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.ensure_online()?;
        self.state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    /// Live transactions in id order.
    pub(crate) fn live_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .transactions
            .values()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect())
    }
}

fn matches_search(transaction: &Transaction, needle: &str) -> bool {
    transaction.id.to_string().to_lowercase().contains(needle)
        || transaction.total_amount.to_string().to_lowercase().contains(needle)
        || transaction
            .items
            .iter()
            .any(|i| i.product_name.to_lowercase().contains(needle))
}

fn compare(a: &Transaction, b: &Transaction, key: SortKey) -> CmpOrdering {
    let primary = match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::TransactionDate => a.transaction_date.cmp(&b.transaction_date),
        SortKey::TotalAmount => a.total_amount.cmp(&b.total_amount),
        SortKey::Id => CmpOrdering::Equal,
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait::async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let mut state = self.write()?;

        let demand: Vec<_> = transaction.stock_demand().collect();
        self.stock
            .try_decrement_all(&demand)
            .map_err(StoreError::InsufficientStock)?;

        let now = Utc::now();
        state.last_transaction_id += 1;
        let id = TransactionId::new(state.last_transaction_id);

        let mut items = Vec::with_capacity(transaction.items().len());
        for item in transaction.items() {
            state.last_item_id += 1;
            items.push(TransactionItem {
                id: TransactionItemId::new(state.last_item_id),
                transaction_id: id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                price: item.price,
                quantity: item.quantity,
                subtotal: item.subtotal,
                created_at: now,
                updated_at: now,
            });
        }

        let stored = Transaction {
            id,
            transaction_date: transaction.transaction_date(),
            total_amount: transaction.total_amount(),
            items,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.transactions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .transactions
            .get(&id)
            .filter(|t| !t.is_deleted())
            .cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Transaction>, StoreError> {
        let state = self.read()?;

        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<&Transaction> = state
            .transactions
            .values()
            .filter(|t| !t.is_deleted())
            .filter(|t| needle.as_deref().is_none_or(|n| matches_search(t, n)))
            .collect();

        matching.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_by);
            match query.order {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page: query.page,
            limit: query.limit,
            total,
        })
    }

    async fn soft_delete(&self, id: TransactionId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.transactions.get_mut(&id) {
            Some(t) if !t.is_deleted() => {
                let now = Utc::now();
                t.deleted_at = Some(now);
                t.updated_at = now;
                Ok(())
            }
            _ => Err(StoreError::NotFound(id)),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }
}
