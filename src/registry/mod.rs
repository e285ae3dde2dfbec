/// 경매 레지스트리
/// 진행 중인 경매를 상품 id로 추적한다. 상품마다 단일 작성자(actor) 태스크가
/// 해당 경매 상태를 소유하므로, 같은 상품의 입찰은 한 번에 하나씩
/// 검증-커밋되고 서로 다른 상품의 입찰은 완전히 병렬로 처리된다.
/// 두 입찰이 같은 낡은 최고가를 읽고 둘 다 수락되는 경합이 구조적으로 불가능하다.
// region:    --- Imports
use crate::bidding::commands::PlaceBidCommand;
use crate::bidding::model::{Bid, Item};
use crate::bidding::validator::{self, AuctionState, BestBid, RejectReason};
use crate::broadcast::{AuctionEvent, BidBroadcaster};
use crate::ledger::{LedgerStore, NewBid, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::info;
// endregion: --- Imports

// region:    --- Bid Error

/// 입찰 처리 오류
#[derive(Debug, Error)]
pub enum BidError {
    /// 검증 거절. 오류가 아니라 정상적인 동기 결과이며 재시도하지 않는다.
    #[error("{}", .0.message())]
    Rejected(RejectReason),
    /// 등록된 적 없는 상품
    #[error("존재하지 않는 상품입니다.")]
    UnknownItem,
    /// 저장소 오류. 클라이언트가 재시도할 수 있다.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// endregion: --- Bid Error

// region:    --- Auction Registry

// 상품별 입찰 대기열 크기
const BID_QUEUE_CAPACITY: usize = 256;

/// 상품별 actor에 전달되는 입찰 요청
struct BidRequest {
    cmd: PlaceBidCommand,
    reply: oneshot::Sender<Result<Bid, BidError>>,
}

pub struct AuctionRegistry {
    ledger: Arc<dyn LedgerStore>,
    broadcaster: Arc<BidBroadcaster>,
    auctions: Mutex<HashMap<i64, mpsc::Sender<BidRequest>>>,
}

impl AuctionRegistry {
    pub fn new(ledger: Arc<dyn LedgerStore>, broadcaster: Arc<BidBroadcaster>) -> Self {
        Self {
            ledger,
            broadcaster,
            auctions: Mutex::new(HashMap::new()),
        }
    }

    /// 경매 등록. 저장소의 입찰 이력에서 현재 최고 입찰을 복원한 뒤
    /// 상품 전용 actor를 띄운다. 이미 등록된 상품이면 아무것도 하지 않는다.
    pub async fn register(&self, item: &Item, deadline: DateTime<Utc>) -> Result<(), StoreError> {
        // 복원: 수락된 입찰은 강증가하므로 최대 금액이 곧 마지막 수락 입찰이다
        let best_bid = self
            .ledger
            .get_bids(item.id)
            .await?
            .into_iter()
            .fold(None, |best: Option<BestBid>, bid| match best {
                Some(b) if bid.amount <= b.amount => Some(b),
                _ => Some(BestBid {
                    bidder_id: bid.bidder_id,
                    amount: bid.amount,
                }),
            });

        let mut auctions = self.auctions.lock().await;
        if auctions.contains_key(&item.id) {
            return Ok(());
        }

        let state = AuctionState {
            item_id: item.id,
            start_price: item.start_price,
            deadline,
            best_bid,
            closed: false,
        };
        let (tx, rx) = mpsc::channel(BID_QUEUE_CAPACITY);
        tokio::spawn(run_auction(
            state,
            rx,
            Arc::clone(&self.ledger),
            Arc::clone(&self.broadcaster),
        ));
        auctions.insert(item.id, tx);
        info!(
            "{:<12} --> 경매 등록: item_id={}, 마감={}",
            "Registry", item.id, deadline
        );
        Ok(())
    }

    /// 입찰 제출. 검증과 커밋은 상품별 actor 안에서 직렬화되고,
    /// 거절이면 상태 변화 없이 사유가 값으로 돌아온다.
    pub async fn submit_bid(&self, cmd: PlaceBidCommand) -> Result<Bid, BidError> {
        let tx = {
            let auctions = self.auctions.lock().await;
            auctions.get(&cmd.item_id).cloned()
        };

        let Some(tx) = tx else {
            // 레지스트리에 없는 상품: 원장에 있으면 이미 종료된 경매다
            return match self.ledger.get_item(cmd.item_id).await? {
                Some(_) => Err(BidError::Rejected(RejectReason::AuctionClosed)),
                None => Err(BidError::UnknownItem),
            };
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if tx
            .send(BidRequest {
                cmd,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // actor가 방금 내려갔다면 그 사이 경매가 종료된 것이다
            return Err(BidError::Rejected(RejectReason::AuctionClosed));
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(BidError::Store(StoreError::Unavailable(
                "경매 처리기가 응답하지 않습니다.".to_string(),
            ))),
        }
    }

    /// 경매 종료 처리. actor 채널을 제거하면 대기 중인 요청을 모두
    /// 소진한 뒤 태스크가 내려간다(남은 요청은 마감 검사로 거절된다).
    pub async fn close(&self, item_id: i64) {
        self.auctions.lock().await.remove(&item_id);
    }
}

/// 상품 전용 단일 작성자 루프.
/// 검증 → 내구 기록 → 상태 갱신 → 발행을 한 입찰씩 처리하므로
/// 수락 금액은 항상 강증가하고 발행 순서는 커밋 순서와 같다.
async fn run_auction(
    mut state: AuctionState,
    mut rx: mpsc::Receiver<BidRequest>,
    ledger: Arc<dyn LedgerStore>,
    broadcaster: Arc<BidBroadcaster>,
) {
    while let Some(BidRequest { cmd, reply }) = rx.recv().await {
        let result = handle_bid(&mut state, cmd, &ledger, &broadcaster).await;
        // 제출자가 응답을 기다리지 않고 떠났어도 커밋은 유효하다
        let _ = reply.send(result);
    }
}

async fn handle_bid(
    state: &mut AuctionState,
    cmd: PlaceBidCommand,
    ledger: &Arc<dyn LedgerStore>,
    broadcaster: &Arc<BidBroadcaster>,
) -> Result<Bid, BidError> {
    let now = Utc::now();
    if let Err(reason) = validator::validate(state, cmd.amount, now) {
        info!(
            "{:<12} --> 입찰 거절: item_id={}, amount={}, 사유={:?}",
            "Registry", cmd.item_id, cmd.amount, reason
        );
        return Err(BidError::Rejected(reason));
    }

    // 내구 기록이 끝나기 전에는 수락이 아니다. 기록이 실패하면 상태도 그대로라
    // 실패한 입찰은 흔적을 남기지 않는다.
    let bid = ledger
        .insert_bid(NewBid {
            item_id: cmd.item_id,
            bidder_id: cmd.bidder_id,
            amount: cmd.amount,
            message: cmd.message,
            created_at: now,
        })
        .await?;

    state.best_bid = Some(BestBid {
        bidder_id: bid.bidder_id,
        amount: bid.amount,
    });
    info!(
        "{:<12} --> 입찰 수락: item_id={}, bidder_id={}, amount={}",
        "Registry", bid.item_id, bid.bidder_id, bid.amount
    );

    broadcaster
        .publish(AuctionEvent::BidPlaced {
            item_id: bid.item_id,
            bidder_id: bid.bidder_id,
            amount: bid.amount,
            message: bid.message.clone(),
            timestamp: bid.created_at,
        })
        .await;

    Ok(bid)
}

// endregion: --- Auction Registry

// region:    --- Tests


// endregion: --- Tests
