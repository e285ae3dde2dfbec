/// HTTP 핸들러와 라우터
/// 인증/세션은 외부 협력 서비스 몫이다. 요청에 실린 계정 id를 그대로 신뢰한다.
// region:    --- Imports
use crate::bidding::commands::{
    CreateAccountCommand, CreateItemCommand, PlaceBidCommand, PlaceBidRequest,
};
use crate::broadcast::BidBroadcaster;
use crate::ledger::{LedgerStore, NewItem, StoreError};
use crate::registry::{AuctionRegistry, BidError};
use crate::scheduler::SettlementScheduler;
use crate::settlement::SettlementExecutor;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- App State

/// 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub registry: Arc<AuctionRegistry>,
    pub scheduler: Arc<SettlementScheduler>,
    pub broadcaster: Arc<BidBroadcaster>,
    /// 경매 기간. 마감 = 등록 시각 + 기간
    pub auction_duration: chrono::Duration,
}

impl AppState {
    /// 경매 수명주기 구성: 원장 → 브로드캐스터 → 레지스트리 → 정산
    pub fn build(
        ledger: Arc<dyn LedgerStore>,
        broadcaster: Arc<BidBroadcaster>,
        auction_duration: chrono::Duration,
    ) -> Self {
        let registry = Arc::new(AuctionRegistry::new(
            Arc::clone(&ledger),
            Arc::clone(&broadcaster),
        ));
        let executor = Arc::new(SettlementExecutor::new(
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&broadcaster),
        ));
        let scheduler = Arc::new(SettlementScheduler::new(executor));
        Self {
            ledger,
            registry,
            scheduler,
            broadcaster,
            auction_duration,
        }
    }
}

/// 라우터 설정
pub fn app(state: AppState) -> Router {
    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/items", post(handle_create_item).get(handle_get_items))
        .route("/items/:id", get(handle_get_item))
        .route("/items/:id/bids", post(handle_bid).get(handle_get_bids))
        .route("/items/:id/stream", get(handle_stream))
        .route("/accounts", post(handle_create_account))
        .route("/accounts/:id", get(handle_get_account))
        .route("/accounts/:id/won", get(handle_get_won_items))
        .layer(cors)
        .with_state(state)
}

// endregion: --- App State

// region:    --- Command Handlers

/// 상품 등록 처리. 경매 수명주기는 여기서만 시작된다:
/// 원장 기록 → 레지스트리 등록 → 마감 정산 예약.
pub async fn handle_create_item(
    State(state): State<AppState>,
    Json(cmd): Json<CreateItemCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 상품 등록 요청: {:?}", "Command", cmd);

    if cmd.start_price <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "시작 가격은 0보다 커야 합니다.",
                "code": "INVALID_START_PRICE"
            })),
        )
            .into_response();
    }

    let item = match state
        .ledger
        .insert_item(NewItem {
            owner_id: cmd.owner_id,
            name: cmd.name,
            start_price: cmd.start_price,
        })
        .await
    {
        Ok(item) => item,
        Err(e) => return store_error(e),
    };

    let deadline = item.deadline(state.auction_duration);
    if let Err(e) = state.registry.register(&item, deadline).await {
        return store_error(e);
    }
    state.scheduler.schedule_closing(item.id, deadline).await;

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "item": item, "deadline": deadline })),
    )
        .into_response()
}

/// 입찰 요청 처리
pub async fn handle_bid(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(req): Json<PlaceBidRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 입찰 요청: item_id={}, bidder_id={}, amount={}",
        "Command", item_id, req.bidder_id, req.amount
    );

    let cmd = PlaceBidCommand {
        item_id,
        bidder_id: req.bidder_id,
        amount: req.amount,
        message: req.message,
    };

    match state.registry.submit_bid(cmd).await {
        Ok(bid) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰이 접수되었습니다.",
                "bid": bid
            })),
        )
            .into_response(),
        Err(BidError::Rejected(reason)) => (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": reason.message(),
                "code": reason.code()
            })),
        )
            .into_response(),
        Err(BidError::UnknownItem) => not_found(),
        Err(BidError::Store(e)) => store_error(e),
    }
}

/// 계정 등록 처리
pub async fn handle_create_account(
    State(state): State<AppState>,
    Json(cmd): Json<CreateAccountCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 계정 등록 요청: {:?}", "Command", cmd);
    match state.ledger.insert_account(cmd.nick, cmd.balance).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => store_error(e),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 판매 중 상품 조회
pub async fn handle_get_items(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 판매 중 상품 조회", "HandlerQuery");
    match state.ledger.open_items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => store_error(e),
    }
}

/// 상품 상세 조회(입찰 이력 포함)
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 상품 조회 id: {}", "HandlerQuery", item_id);
    let item = match state.ledger.get_item(item_id).await {
        Ok(Some(item)) => item,
        Ok(None) => return not_found(),
        Err(e) => return store_error(e),
    };
    match state.ledger.get_bids(item_id).await {
        Ok(bids) => Json(serde_json::json!({ "item": item, "bids": bids })).into_response(),
        Err(e) => store_error(e),
    }
}

/// 입찰 이력 조회(입찰 시각 오름차순)
pub async fn handle_get_bids(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "HandlerQuery", item_id);
    match state.ledger.get_item(item_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(e) => return store_error(e),
    }
    match state.ledger.get_bids(item_id).await {
        Ok(bids) => Json(bids).into_response(),
        Err(e) => store_error(e),
    }
}

/// 계정 조회
pub async fn handle_get_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 계정 조회 id: {}", "HandlerQuery", account_id);
    match state.ledger.get_account(account_id).await {
        Ok(Some(account)) => Json(account).into_response(),
        Ok(None) => not_found(),
        Err(e) => store_error(e),
    }
}

/// 낙찰 목록 조회
pub async fn handle_get_won_items(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 낙찰 목록 조회 id: {}", "HandlerQuery", account_id);
    match state.ledger.won_items(account_id).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => store_error(e),
    }
}

// endregion: --- Query Handlers

// region:    --- Event Stream

/// 상품 이벤트 구독(SSE).
/// 연결 이후의 입찰/종료 이벤트를 커밋 순서대로 내려주고,
/// 경매가 정리되면 스트림이 끝난다.
pub async fn handle_stream(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 이벤트 구독 id: {}", "HandlerQuery", item_id);
    match state.ledger.get_item(item_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(),
        Err(e) => return store_error(e),
    }

    let rx = state.broadcaster.subscribe(item_id).await;
    let stream = BroadcastStream::new(rx).filter_map(|event| match event {
        Ok(event) => SseEvent::default()
            .event("auction")
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>),
        // 밀린 구독자는 건너뛴 이벤트를 복구할 수 없다
        Err(_) => None,
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

// endregion: --- Event Stream

// region:    --- Error Responses

/// 저장소 오류 응답
fn store_error(e: StoreError) -> Response {
    error!("{:<12} --> 저장소 오류: {}", "Handler", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "저장소 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.",
            "code": "STORE_UNAVAILABLE"
        })),
    )
        .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "대상을 찾을 수 없습니다.",
            "code": "NOT_FOUND"
        })),
    )
        .into_response()
}

// endregion: --- Error Responses
