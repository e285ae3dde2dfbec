use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 상품 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub start_price: i64,
    pub created_at: DateTime<Utc>,
    pub sold_to: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Item {
    /// 경매 마감 시각(등록 시각 + 경매 기간)
    pub fn deadline(&self, duration: chrono::Duration) -> DateTime<Utc> {
        self.created_at + duration
    }

    /// 낙찰 또는 유찰로 이미 종료된 상품인지 여부
    pub fn is_closed(&self) -> bool {
        self.sold_to.is_some() || self.closed_at.is_some()
    }
}

// 입찰 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub item_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// 계정 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub nick: String,
    pub balance: i64,
}
