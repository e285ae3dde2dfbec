// region:    --- Imports
use crate::broadcast::BidBroadcaster;
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use crate::ledger::postgres::PostgresLedger;
use crate::ledger::LedgerStore;
use crate::message_broker::KafkaProducer;
use crate::scheduler::recover_open_auctions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Modules
mod bidding;
mod broadcast;
mod database;
mod handlers;
mod ledger;
mod message_broker;
mod registry;
mod scheduler;
mod settlement;

// endregion: --- Modules

// 기본 경매 기간(24시간)
const DEFAULT_AUCTION_DURATION_SECS: i64 = 24 * 60 * 60;

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성 및 스키마 초기화
    let db_manager = DatabaseManager::new().await;
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    let ledger: Arc<dyn LedgerStore> = Arc::new(PostgresLedger::new(db_manager.get_pool()));

    // 브로드캐스터 생성. KAFKA_BROKERS가 있으면 Kafka 미러링도 켠다.
    let broadcaster = match KafkaProducer::from_env() {
        Some(producer) => {
            info!("{:<12} --> Kafka 미러링 활성화", "Main");
            Arc::new(BidBroadcaster::with_kafka(producer))
        }
        None => {
            warn!(
                "{:<12} --> KAFKA_BROKERS 미설정: 프로세스 내 브로드캐스트만 동작합니다",
                "Main"
            );
            Arc::new(BidBroadcaster::new())
        }
    };

    // 경매 기간(초)
    let auction_duration = chrono::Duration::seconds(
        std::env::var("AUCTION_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_AUCTION_DURATION_SECS),
    );

    let state = AppState::build(Arc::clone(&ledger), broadcaster, auction_duration);

    // 재기동 복구: 미종료 경매의 마감을 다시 계산해 정산을 예약한다
    let recovered =
        recover_open_auctions(&ledger, &state.registry, &state.scheduler, auction_duration)
            .await?;
    info!("{:<12} --> 경매 복구 완료: {}건", "Main", recovered);

    // 라우터 설정
    let routes_all = handlers::app(state);

    // 리스너 생성
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
