/// 원장 저장소(Ledger Store)
/// 상품/입찰/계정 레코드에 대한 원자적 읽기/쓰기 경계.
/// 각 연산은 개별적으로 원자적이어야 하지만, 연산 간 트랜잭션은 가정하지 않는다.
/// 정산이 no-op 재방문 방식으로 설계된 이유가 이것이다.
// region:    --- Imports
use crate::bidding::model::{Account, Bid, Item};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
// endregion: --- Imports

pub mod memory;
pub mod postgres;
mod queries;

// region:    --- Store Error

/// 저장소 오류. 일시적 인프라 오류로 간주되어 정산은 재시도하고
/// 입찰 제출은 실패 응답으로 클라이언트에 재시도를 맡긴다.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("저장소 오류: {0}")]
    Database(#[from] sqlx::Error),
    #[error("저장소를 사용할 수 없습니다: {0}")]
    Unavailable(String),
}

// endregion: --- Store Error

// region:    --- Record Models

/// 신규 상품 레코드
#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: i64,
    pub name: String,
    pub start_price: i64,
}

/// 신규 입찰 레코드. created_at은 입찰 결정 시각이다.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub item_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// endregion: --- Record Models

// region:    --- Ledger Store Trait

/// 원장 저장소 트레이트
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 상품 등록
    async fn insert_item(&self, item: NewItem) -> Result<Item, StoreError>;

    /// 상품 조회
    async fn get_item(&self, item_id: i64) -> Result<Option<Item>, StoreError>;

    /// 판매 중(미낙찰/미종료) 상품 목록
    async fn open_items(&self) -> Result<Vec<Item>, StoreError>;

    /// 낙찰받은 상품 목록
    async fn won_items(&self, account_id: i64) -> Result<Vec<Item>, StoreError>;

    /// 입찰 기록 추가. 입찰은 불변이며 상품별 append-only 로그를 이룬다.
    async fn insert_bid(&self, bid: NewBid) -> Result<Bid, StoreError>;

    /// 상품의 전체 입찰 이력(입찰 시각 오름차순)
    async fn get_bids(&self, item_id: i64) -> Result<Vec<Bid>, StoreError>;

    /// 낙찰자 기록. 이미 종료된 상품이면 false를 돌려주고 아무것도 바꾸지 않는다.
    async fn compare_and_set_sold(
        &self,
        item_id: i64,
        winner_id: i64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// 유찰 처리. 이미 종료된 상품이면 false.
    async fn close_unsold(&self, item_id: i64, closed_at: DateTime<Utc>)
        -> Result<bool, StoreError>;

    /// 계정 잔액 차감. 절대값 대입이 아니라 원자적 상대 갱신이어야
    /// 같은 계정에 대한 무관한 동시 갱신이 유실되지 않는다.
    async fn debit_account(&self, account_id: i64, amount: i64) -> Result<(), StoreError>;

    /// 계정 등록
    async fn insert_account(&self, nick: String, balance: i64) -> Result<Account, StoreError>;

    /// 계정 조회
    async fn get_account(&self, account_id: i64) -> Result<Option<Account>, StoreError>;
}

// endregion: --- Ledger Store Trait
