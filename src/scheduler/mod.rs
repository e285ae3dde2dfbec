/// 정산 스케줄러
/// 상품마다 마감 시각에 한 번 실행되는 정산 태스크를 예약한다.
/// 폴링하지 않고 마감까지 잠들어 있다가 깨어난다.
/// 취소는 없다. 한 번 예약된 정산은 반드시 언젠가 실행된다.
// region:    --- Imports
use crate::ledger::{LedgerStore, StoreError};
use crate::registry::AuctionRegistry;
use crate::settlement::{SettlementExecutor, SettlementOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Settlement Scheduler

// 일시적 저장소 오류 시 정산 재시도 횟수와 간격
const SETTLE_RETRIES: u32 = 5;
const SETTLE_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct SettlementScheduler {
    executor: Arc<SettlementExecutor>,
    scheduled: Arc<Mutex<HashSet<i64>>>,
}

impl SettlementScheduler {
    pub fn new(executor: Arc<SettlementExecutor>) -> Self {
        Self {
            executor,
            scheduled: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 마감 정산 예약. 같은 상품을 두 번 예약해도 태스크는 하나만 생긴다.
    /// 중복 예약이 새어 들어와도 정산 자체가 멱등해서 이중 정산은 없다.
    pub async fn schedule_closing(&self, item_id: i64, deadline: DateTime<Utc>) {
        {
            let mut scheduled = self.scheduled.lock().await;
            if !scheduled.insert(item_id) {
                warn!(
                    "{:<12} --> 이미 예약된 정산입니다: item_id={}",
                    "Scheduler", item_id
                );
                return;
            }
        }

        info!(
            "{:<12} --> 정산 예약: item_id={}, 마감={}",
            "Scheduler", item_id, deadline
        );
        let executor = Arc::clone(&self.executor);
        let scheduled = Arc::clone(&self.scheduled);
        tokio::spawn(async move {
            // 마감까지 대기. 이미 지난 마감(재기동 복구)이면 즉시 실행한다.
            if let Ok(wait) = (deadline - Utc::now()).to_std() {
                sleep(wait).await;
            }
            run_settlement(&executor, item_id).await;
            scheduled.lock().await.remove(&item_id);
        });
    }
}

/// 정산 실행 루프. 일시적 저장소 오류면 간격을 두고 재시도한다.
async fn run_settlement(executor: &SettlementExecutor, item_id: i64) {
    let mut attempt = 0;
    loop {
        match executor.settle(item_id).await {
            Ok(SettlementOutcome::AlreadySettled) => {
                info!(
                    "{:<12} --> 이미 정산된 경매: item_id={}",
                    "Scheduler", item_id
                );
                return;
            }
            Ok(outcome) => {
                info!(
                    "{:<12} --> 정산 완료: item_id={}, 결과={:?}",
                    "Scheduler", item_id, outcome
                );
                return;
            }
            Err(e) if attempt < SETTLE_RETRIES => {
                attempt += 1;
                warn!(
                    "{:<12} --> 정산 재시도({}/{}): item_id={}, {}",
                    "Scheduler", attempt, SETTLE_RETRIES, item_id, e
                );
                sleep(SETTLE_RETRY_DELAY).await;
            }
            Err(e) => {
                // 여기서 포기해도 다음 재기동 복구가 같은 경매를 다시 예약한다
                error!(
                    "{:<12} --> 정산 실패: item_id={}, {}",
                    "Scheduler", item_id, e
                );
                return;
            }
        }
    }
}

/// 재기동 복구: 아직 종료되지 않은 모든 경매를 레지스트리에 다시 올리고,
/// 마감(등록 시각 + 경매 기간)을 다시 계산해 정산을 예약한다.
/// 마감이 이미 지난 경매는 예약 즉시 정산된다.
pub async fn recover_open_auctions(
    ledger: &Arc<dyn LedgerStore>,
    registry: &AuctionRegistry,
    scheduler: &SettlementScheduler,
    duration: chrono::Duration,
) -> Result<usize, StoreError> {
    let items = ledger.open_items().await?;
    let count = items.len();
    for item in items {
        let deadline = item.deadline(duration);
        registry.register(&item, deadline).await?;
        scheduler.schedule_closing(item.id, deadline).await;
    }
    if count > 0 {
        info!("{:<12} --> 미정산 경매 {}건 복구", "Scheduler", count);
    }
    Ok(count)
}

// endregion: --- Settlement Scheduler

// region:    --- Tests


// endregion: --- Tests
