/// 인메모리 원장 저장소
/// 데이터베이스 없이 로컬 실행과 테스트에서 사용한다.
/// 연산 단위 원자성은 저장소 전체 뮤텍스로 보장한다.
// region:    --- Imports
use super::{LedgerStore, NewBid, NewItem, StoreError};
use crate::bidding::model::{Account, Bid, Item};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
// endregion: --- Imports

// region:    --- Memory Ledger

#[derive(Default)]
struct MemoryState {
    items: HashMap<i64, Item>,
    bids: HashMap<i64, Vec<Bid>>,
    accounts: HashMap<i64, Account>,
    next_item_id: i64,
    next_bid_id: i64,
    next_account_id: i64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError> {
        let mut state = self.state.lock().await;
        state.next_item_id += 1;
        let item = Item {
            id: state.next_item_id,
            owner_id: item.owner_id,
            name: item.name,
            start_price: item.start_price,
            created_at: Utc::now(),
            sold_to: None,
            closed_at: None,
        };
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.items.get(&item_id).cloned())
    }

    async fn open_items(&self) -> Result<Vec<Item>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| !item.is_closed())
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn won_items(&self, account_id: i64) -> Result<Vec<Item>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.sold_to == Some(account_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        Ok(items)
    }

    async fn insert_bid(&self, bid: NewBid) -> Result<Bid, StoreError> {
        let mut state = self.state.lock().await;
        state.next_bid_id += 1;
        let bid = Bid {
            id: state.next_bid_id,
            item_id: bid.item_id,
            bidder_id: bid.bidder_id,
            amount: bid.amount,
            message: bid.message,
            created_at: bid.created_at,
        };
        state.bids.entry(bid.item_id).or_default().push(bid.clone());
        Ok(bid)
    }

    async fn get_bids(&self, item_id: i64) -> Result<Vec<Bid>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.bids.get(&item_id).cloned().unwrap_or_default())
    }

    async fn compare_and_set_sold(
        &self,
        item_id: i64,
        winner_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.items.get_mut(&item_id) {
            Some(item) if !item.is_closed() => {
                item.sold_to = Some(winner_id);
                item.closed_at = Some(closed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close_unsold(
        &self,
        item_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.items.get_mut(&item_id) {
            Some(item) if !item.is_closed() => {
                item.closed_at = Some(closed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn debit_account(&self, account_id: i64, amount: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.balance -= amount;
        }
        Ok(())
    }

    async fn insert_account(&self, nick: String, balance: i64) -> Result<Account, StoreError> {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let account = Account {
            id: state.next_account_id,
            nick,
            balance,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&account_id).cloned())
    }
}

// endregion: --- Memory Ledger

// region:    --- Tests


// endregion: --- Tests
