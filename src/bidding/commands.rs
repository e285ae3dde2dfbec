/// 경매 관련 커맨드 모델
/// 1. 상품 등록
/// 2. 입찰
/// 3. 계정 등록
use serde::{Deserialize, Serialize};

/// 상품 등록 명령. 경매 수명주기는 이 명령으로만 시작된다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateItemCommand {
    pub owner_id: i64,
    pub name: String,
    pub start_price: i64,
}

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub item_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub message: Option<String>,
}

/// 입찰 요청 본문(상품 id는 경로 파라미터로 받는다)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidRequest {
    pub bidder_id: i64,
    pub amount: i64,
    pub message: Option<String>,
}

/// 계정 등록 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAccountCommand {
    pub nick: String,
    pub balance: i64,
}
