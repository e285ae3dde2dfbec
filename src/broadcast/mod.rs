/// 경매 이벤트 브로드캐스터
/// 상품별 fan-out 채널. 구독자는 연결을 끊을 때까지 이벤트를 커밋 순서대로 받는다.
/// 발행은 커밋이 끝난 뒤에만 일어나므로, 전달 실패는 알림 유실일 뿐
/// 입찰이 사라지거나 없는 입찰이 보이는 일은 없다.
// region:    --- Imports
use crate::message_broker::KafkaProducer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, warn};
// endregion: --- Imports

// region:    --- Auction Event

/// 구독자에게 전달되는 경매 이벤트
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 입찰 수락 이벤트
    BidPlaced {
        item_id: i64,
        bidder_id: i64,
        amount: i64,
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
    // 경매 종료 이벤트(winner_id가 없으면 유찰)
    AuctionClosed {
        item_id: i64,
        winner_id: Option<i64>,
        amount: Option<i64>,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    pub fn item_id(&self) -> i64 {
        match self {
            AuctionEvent::BidPlaced { item_id, .. } => *item_id,
            AuctionEvent::AuctionClosed { item_id, .. } => *item_id,
        }
    }
}

// endregion: --- Auction Event

// region:    --- Bid Broadcaster

// 구독자 채널 버퍼. 밀린 구독자는 이벤트를 건너뛴다.
const CHANNEL_CAPACITY: usize = 64;
// Kafka 전달 큐 버퍼. 가득 차면 미러링만 포기한다.
const KAFKA_QUEUE_CAPACITY: usize = 1024;

/// Kafka 미러링 토픽
const BID_EVENTS_TOPIC: &str = "bid-events";

#[derive(Default)]
pub struct BidBroadcaster {
    channels: Mutex<HashMap<i64, broadcast::Sender<AuctionEvent>>>,
    kafka_queue: Option<mpsc::Sender<AuctionEvent>>,
}

impl BidBroadcaster {
    /// 로컬(프로세스 내) 브로드캐스터 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// Kafka 미러링이 붙은 브로드캐스터 생성.
    /// 이벤트는 상품 id를 키로 bid-events 토픽에 발행 순서대로 전달된다.
    pub fn with_kafka(producer: Arc<KafkaProducer>) -> Self {
        let (tx, rx) = mpsc::channel(KAFKA_QUEUE_CAPACITY);
        tokio::spawn(forward_to_kafka(producer, rx));
        Self {
            channels: Mutex::new(HashMap::new()),
            kafka_queue: Some(tx),
        }
    }

    /// 상품 채널 구독. 구독 이후의 이벤트를 담은 무한 시퀀스이며
    /// 재시작(과거 이벤트 재전송)은 지원하지 않는다.
    pub async fn subscribe(&self, item_id: i64) -> broadcast::Receiver<AuctionEvent> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(item_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 이벤트 발행. 커밋 완료 후에만 호출해야 한다.
    /// 실패해도 오류를 돌려주지 않는다. 기록을 남기고 계속 간다.
    pub async fn publish(&self, event: AuctionEvent) {
        if let Some(queue) = &self.kafka_queue {
            if queue.try_send(event.clone()).is_err() {
                warn!(
                    "{:<12} --> Kafka 전달 큐가 가득 찼습니다. 알림을 버립니다: item_id={}",
                    "Broadcast",
                    event.item_id()
                );
            }
        }

        let channels = self.channels.lock().await;
        if let Some(tx) = channels.get(&event.item_id()) {
            // 구독자가 하나도 없으면 send가 실패하지만 문제는 아니다
            let _ = tx.send(event);
        }
    }

    /// 종료된 상품의 채널 정리. 남은 구독자의 스트림은 여기서 끝난다.
    pub async fn drop_channel(&self, item_id: i64) {
        self.channels.lock().await.remove(&item_id);
    }
}

/// Kafka 미러링 전달 루프. 큐에 들어온 순서가 곧 발행 순서다.
async fn forward_to_kafka(producer: Arc<KafkaProducer>, mut rx: mpsc::Receiver<AuctionEvent>) {
    while let Some(event) = rx.recv().await {
        let key = event.item_id().to_string();
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("{:<12} --> 이벤트 직렬화 실패: {:?}", "Broadcast", e);
                continue;
            }
        };
        if let Err(e) = producer.send_message(BID_EVENTS_TOPIC, &key, &payload).await {
            error!("{:<12} --> Kafka 발행 실패(알림 유실): {}", "Broadcast", e);
        }
    }
}

// endregion: --- Bid Broadcaster

// region:    --- Tests


// endregion: --- Tests
