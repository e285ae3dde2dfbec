/// Postgres 원장 저장소 구현체
// region:    --- Imports
use super::queries;
use super::{LedgerStore, NewBid, NewItem, StoreError};
use crate::bidding::model::{Account, Bid, Item};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};
// endregion: --- Imports

// region:    --- Postgres Ledger

pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError> {
        debug!("{:<12} --> 상품 등록: {:?}", "Ledger", item);
        let item = sqlx::query_as::<_, Item>(queries::INSERT_ITEM)
            .bind(item.owner_id)
            .bind(&item.name)
            .bind(item.start_price)
            .bind(Utc::now())
            .fetch_one(&*self.pool)
            .await?;
        Ok(item)
    }

    async fn get_item(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(queries::GET_ITEM)
            .bind(item_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(item)
    }

    async fn open_items(&self) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(queries::GET_OPEN_ITEMS)
            .fetch_all(&*self.pool)
            .await?;
        Ok(items)
    }

    async fn won_items(&self, account_id: i64) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(queries::GET_WON_ITEMS)
            .bind(account_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(items)
    }

    async fn insert_bid(&self, bid: NewBid) -> Result<Bid, StoreError> {
        debug!(
            "{:<12} --> 입찰 기록: item_id={}, bidder_id={}, amount={}",
            "Ledger", bid.item_id, bid.bidder_id, bid.amount
        );
        let bid = sqlx::query_as::<_, Bid>(queries::INSERT_BID)
            .bind(bid.item_id)
            .bind(bid.bidder_id)
            .bind(bid.amount)
            .bind(&bid.message)
            .bind(bid.created_at)
            .fetch_one(&*self.pool)
            .await?;
        Ok(bid)
    }

    async fn get_bids(&self, item_id: i64) -> Result<Vec<Bid>, StoreError> {
        let bids = sqlx::query_as::<_, Bid>(queries::GET_BIDS)
            .bind(item_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(bids)
    }

    async fn compare_and_set_sold(
        &self,
        item_id: i64,
        winner_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // 조건부 갱신 한 문장으로 낙찰 기록을 원자화한다.
        // 경쟁하는 두 번째 정산 시도는 빈 결과를 보고 no-op이 된다.
        let updated = sqlx::query_scalar::<_, i64>(queries::SET_SOLD)
            .bind(item_id)
            .bind(winner_id)
            .bind(closed_at)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(updated.is_some())
    }

    async fn close_unsold(
        &self,
        item_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query_scalar::<_, i64>(queries::CLOSE_UNSOLD)
            .bind(item_id)
            .bind(closed_at)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(updated.is_some())
    }

    async fn debit_account(&self, account_id: i64, amount: i64) -> Result<(), StoreError> {
        let result = sqlx::query(queries::DEBIT_ACCOUNT)
            .bind(account_id)
            .bind(amount)
            .execute(&*self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!(
                "{:<12} --> 차감 대상 계정이 없습니다: account_id={}",
                "Ledger", account_id
            );
        }
        Ok(())
    }

    async fn insert_account(&self, nick: String, balance: i64) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(queries::INSERT_ACCOUNT)
            .bind(&nick)
            .bind(balance)
            .fetch_one(&*self.pool)
            .await?;
        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(queries::GET_ACCOUNT)
            .bind(account_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(account)
    }
}

// endregion: --- Postgres Ledger
