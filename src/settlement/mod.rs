/// 정산 실행기
/// 마감 시각에 낙찰자를 확정하고 원장을 갱신한다.
/// 각 단계가 독립적으로 멱등해서 중복 예약이나 재시도가 이중 정산으로
/// 이어지지 않는다.
// region:    --- Imports
use crate::bidding::model::Bid;
use crate::broadcast::{AuctionEvent, BidBroadcaster};
use crate::ledger::{LedgerStore, StoreError};
use crate::registry::AuctionRegistry;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Settlement Outcome

/// 정산 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// 낙찰
    Sold { winner_id: i64, amount: i64 },
    /// 입찰 없이 종료(유찰)
    NoBids,
    /// 이미 정산된 경매. 오류가 아니라 성공적인 no-op이다.
    AlreadySettled,
}

// endregion: --- Settlement Outcome

// region:    --- Settlement Executor

// 낙찰 기록 후 잔액 차감 재시도 횟수와 간격.
// sold_to가 이미 기록된 뒤라 재정산으로는 이 지점에 다시 오지 못하므로
// 차감은 이 시도 안에서 마무리해야 한다.
const DEBIT_RETRIES: u32 = 3;
const DEBIT_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct SettlementExecutor {
    ledger: Arc<dyn LedgerStore>,
    registry: Arc<AuctionRegistry>,
    broadcaster: Arc<BidBroadcaster>,
}

impl SettlementExecutor {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        registry: Arc<AuctionRegistry>,
        broadcaster: Arc<BidBroadcaster>,
    ) -> Self {
        Self {
            ledger,
            registry,
            broadcaster,
        }
    }

    /// 정산. 몇 번을 호출해도 최종 상태는 같다.
    /// 1. 이미 종료된 상품이면 즉시 no-op
    /// 2. 전체 입찰 이력에서 최대 금액을 고른다(동액이면 먼저 도달한 입찰)
    /// 3. 낙찰자를 조건부 갱신으로 기록한다(경쟁 정산은 기존 값을 보고 물러난다)
    /// 4. 낙찰자 잔액을 상대 갱신으로 차감한다
    pub async fn settle(&self, item_id: i64) -> Result<SettlementOutcome, StoreError> {
        let Some(item) = self.ledger.get_item(item_id).await? else {
            warn!(
                "{:<12} --> 정산 대상 상품이 없습니다: item_id={}",
                "Settle", item_id
            );
            return Ok(SettlementOutcome::AlreadySettled);
        };

        let now = Utc::now();
        let outcome = if item.is_closed() {
            SettlementOutcome::AlreadySettled
        } else {
            let bids = self.ledger.get_bids(item_id).await?;
            match winning_bid(&bids) {
                None => {
                    if self.ledger.close_unsold(item_id, now).await? {
                        info!("{:<12} --> 유찰 처리: item_id={}", "Settle", item_id);
                        SettlementOutcome::NoBids
                    } else {
                        SettlementOutcome::AlreadySettled
                    }
                }
                Some(win) => {
                    if self
                        .ledger
                        .compare_and_set_sold(item_id, win.bidder_id, now)
                        .await?
                    {
                        self.debit_winner(win.bidder_id, win.amount).await?;
                        info!(
                            "{:<12} --> 낙찰: item_id={}, winner_id={}, amount={}",
                            "Settle", item_id, win.bidder_id, win.amount
                        );
                        SettlementOutcome::Sold {
                            winner_id: win.bidder_id,
                            amount: win.amount,
                        }
                    } else {
                        SettlementOutcome::AlreadySettled
                    }
                }
            }
        };

        if outcome != SettlementOutcome::AlreadySettled {
            let (winner_id, amount) = match &outcome {
                SettlementOutcome::Sold { winner_id, amount } => (Some(*winner_id), Some(*amount)),
                _ => (None, None),
            };
            self.broadcaster
                .publish(AuctionEvent::AuctionClosed {
                    item_id,
                    winner_id,
                    amount,
                    timestamp: now,
                })
                .await;
        }

        // 레지스트리와 이벤트 채널 정리. 이미 정리된 경우에도 무해하다.
        self.registry.close(item_id).await;
        self.broadcaster.drop_channel(item_id).await;
        Ok(outcome)
    }

    /// 낙찰 금액 차감. 일시적 저장소 오류면 여기서 제한적으로 재시도한다.
    async fn debit_winner(&self, account_id: i64, amount: i64) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.ledger.debit_account(account_id, amount).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < DEBIT_RETRIES => {
                    attempt += 1;
                    warn!(
                        "{:<12} --> 잔액 차감 재시도({}/{}): account_id={}, {}",
                        "Settle", attempt, DEBIT_RETRIES, account_id, e
                    );
                    sleep(DEBIT_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 낙찰 입찰 선정: 최대 금액, 동액이면 먼저 기록된 입찰.
/// 수락 이력은 강증가이므로 보통 마지막 입찰이지만, 저장소를 그대로 믿지 않고
/// 전체 이력에서 최대값을 다시 계산한다.
fn winning_bid(bids: &[Bid]) -> Option<&Bid> {
    let mut winning: Option<&Bid> = None;
    for bid in bids {
        if winning.map_or(true, |w| bid.amount > w.amount) {
            winning = Some(bid);
        }
    }
    winning
}

// endregion: --- Settlement Executor

// region:    --- Tests


// endregion: --- Tests
