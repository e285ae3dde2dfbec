/// Kafka 메시지 브로커
/// 수락된 경매 이벤트를 외부 구독 서비스용 토픽으로 미러링할 때 사용한다.
/// KAFKA_BROKERS가 설정되지 않으면 프로세스 내 브로드캐스트만 동작한다.
// region:    --- Imports
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::Arc;
use tracing::debug;
// endregion: --- Imports

// region:    --- Kafka Producer

#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str) -> Self {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .expect("Producer creation error");

        KafkaProducer {
            producer: Arc::new(producer),
        }
    }

    /// KAFKA_BROKERS 환경 변수로부터 프로듀서 생성
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("KAFKA_BROKERS")
            .ok()
            .map(|brokers| Arc::new(Self::new(&brokers)))
    }

    /// 메시지 전송. 같은 키(상품 id)의 메시지는 같은 파티션에 순서대로 쌓인다.
    pub async fn send_message(&self, topic: &str, key: &str, value: &str) -> Result<(), String> {
        debug!(
            "{:<12} --> Kafka 메시지 전송: topic={}, key={}",
            "Producer", topic, key
        );
        let record = FutureRecord::to(topic).key(key).payload(value);

        self.producer
            .send(record, std::time::Duration::from_secs(0))
            .await
            .map_err(|(e, _)| format!("Error sending message: {:?}", e))?;

        Ok(())
    }
}

// endregion: --- Kafka Producer
