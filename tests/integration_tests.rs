use auction_house_service::broadcast::{AuctionEvent, BidBroadcaster};
use auction_house_service::handlers::{app, AppState};
use auction_house_service::ledger::memory::MemoryLedger;
use auction_house_service::ledger::LedgerStore;
use axum::http::StatusCode;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};

/// 테스트 서버 구동(임의 포트). 마감을 기다리는 테스트를 위해
/// 경매 기간을 초 단위로 짧게 잡을 수 있다.
async fn spawn_app(duration_secs: i64) -> (String, AppState) {
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());
    let state = AppState::build(
        ledger,
        Arc::new(BidBroadcaster::new()),
        chrono::Duration::seconds(duration_secs),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("리스너 생성 실패");
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    (format!("http://{}", addr), state)
}

/// 테스트용 계정 생성
async fn create_account(client: &Client, base: &str, nick: &str, balance: i64) -> i64 {
    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "nick": nick, "balance": balance }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
}

/// 테스트용 상품 등록
async fn create_item(client: &Client, base: &str, owner_id: i64, start_price: i64) -> i64 {
    let response = client
        .post(format!("{base}/items"))
        .json(&json!({
            "owner_id": owner_id,
            "name": "경매 테스트 상품",
            "start_price": start_price
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json::<Value>().await.unwrap()["item"]["id"]
        .as_i64()
        .unwrap()
}

/// 입찰 요청 전송
async fn place_bid(
    client: &Client,
    base: &str,
    item_id: i64,
    bidder_id: i64,
    amount: i64,
) -> (StatusCode, Value) {
    let response = client
        .post(format!("{base}/items/{item_id}/bids"))
        .json(&json!({ "bidder_id": bidder_id, "amount": amount }))
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

/// 입찰 검증 테스트: 시작가 미만/현재가 이하 거절, 강증가 수락
#[tokio::test]
async fn test_place_bid() {
    let (base, _state) = spawn_app(3600).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let bidder = create_account(&client, &base, "입찰자", 100_000).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    // 시작 가격 미만은 거절
    let (status, body) = place_bid(&client, &base, item_id, bidder, 9_000).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "BELOW_START_PRICE");

    // 시작 가격 이상 첫 입찰은 수락
    let (status, _) = place_bid(&client, &base, item_id, bidder, 12_000).await;
    assert_eq!(status, StatusCode::OK);

    // 현재 최고가 이하는 거절
    let (status, body) = place_bid(&client, &base, item_id, bidder, 11_000).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "BID_TOO_LOW");

    // 더 높은 입찰은 수락
    let (status, _) = place_bid(&client, &base, item_id, bidder, 15_000).await;
    assert_eq!(status, StatusCode::OK);

    // 이력에는 수락된 입찰만 순서대로 남는다
    let bids = client
        .get(format!("{base}/items/{item_id}/bids"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    let amounts: Vec<i64> = bids
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![12_000, 15_000]);

    // 존재하지 않는 상품 입찰은 404
    let (status, _) = place_bid(&client, &base, 999, bidder, 15_000).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// 경매 사이클 테스트: 입찰 → 마감 → 낙찰/차감 확인
#[tokio::test]
async fn test_auction_lifecycle() {
    let (base, _state) = spawn_app(2).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let first = create_account(&client, &base, "첫째", 1_000_000).await;
    let second = create_account(&client, &base, "둘째", 1_000_000).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    let (status, _) = place_bid(&client, &base, item_id, first, 12_000).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = place_bid(&client, &base, item_id, second, 15_000).await;
    assert_eq!(status, StatusCode::OK);

    // 경매 종료 대기
    tokio::time::sleep(Duration::from_secs(4)).await;

    // 최고 입찰자가 낙찰자가 된다
    let detail = client
        .get(format!("{base}/items/{item_id}"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(detail["item"]["sold_to"].as_i64(), Some(second));

    // 낙찰 금액만큼 정확히 차감된다
    let account = client
        .get(format!("{base}/accounts/{second}"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(account["balance"].as_i64(), Some(1_000_000 - 15_000));

    // 낙찰 목록에 상품이 나타난다
    let won = client
        .get(format!("{base}/accounts/{second}/won"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(won.as_array().unwrap().len(), 1);

    // 종료 후 입찰은 거절된다
    let (status, body) = place_bid(&client, &base, item_id, first, 20_000).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUCTION_CLOSED");

    // 판매 중 목록에서 빠진다
    let open = client
        .get(format!("{base}/items"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert!(open.as_array().unwrap().is_empty());
}

/// 유찰 테스트: 입찰 없는 경매는 판매 없이 종료된다
#[tokio::test]
async fn test_no_bid_auction_closes_unsold() {
    let (base, state) = spawn_app(1).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let item = state.ledger.get_item(item_id).await.unwrap().unwrap();
    assert!(item.sold_to.is_none());
    assert!(item.closed_at.is_some());
}

/// 동시성 입찰 테스트: 같은 상품에 동시에 몰린 입찰도
/// 수락 이력은 강증가를 유지해야 한다
#[tokio::test]
async fn test_concurrent_bidding() {
    let (base, state) = spawn_app(3600).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    // 50개의 동시 입찰 생성
    let mut handles = vec![];
    for i in 1..=50i64 {
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            let client = Client::new();
            let (status, _) = place_bid(&client, &base, item_id, i, 10_000 + i * 1_000).await;
            status
        }));
    }

    let mut successful_bids = 0;
    let mut failed_bids = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => successful_bids += 1,
            StatusCode::FORBIDDEN => failed_bids += 1,
            status => panic!("예상치 못한 응답: {}", status),
        }
    }
    assert_eq!(successful_bids + failed_bids, 50);
    assert!(successful_bids >= 1);

    // 수락 이력은 강증가, 수락 수와 일치
    let bids = state.ledger.get_bids(item_id).await.unwrap();
    assert_eq!(bids.len(), successful_bids);
    for pair in bids.windows(2) {
        assert!(pair[1].amount > pair[0].amount);
    }
}

/// 이벤트 전파 테스트: 구독자는 수락된 입찰을 커밋 순서대로 받는다
#[tokio::test]
async fn test_bid_events_reach_subscribers_in_order() {
    let (base, state) = spawn_app(3600).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let bidder = create_account(&client, &base, "입찰자", 100_000).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    let mut rx = state.broadcaster.subscribe(item_id).await;

    for amount in [12_000, 11_000, 15_000] {
        place_bid(&client, &base, item_id, bidder, amount).await;
    }

    // 거절된 11,000은 이벤트가 없고, 수락 순서대로만 도착한다
    for expected in [12_000, 15_000] {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("이벤트 수신 시간 초과")
            .unwrap();
        match event {
            AuctionEvent::BidPlaced { amount, .. } => assert_eq!(amount, expected),
            other => panic!("예상치 못한 이벤트: {:?}", other),
        }
    }
}

/// SSE 구독 테스트: 커밋된 입찰이 스트림으로 흘러나온다
#[tokio::test]
async fn test_sse_stream_delivers_bid_events() {
    let (base, _state) = spawn_app(3600).await;
    let client = Client::new();

    let seller = create_account(&client, &base, "판매자", 0).await;
    let bidder = create_account(&client, &base, "입찰자", 100_000).await;
    let item_id = create_item(&client, &base, seller, 10_000).await;

    // 존재하지 않는 상품 구독은 404
    let response = client
        .get(format!("{base}/items/999/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut response = client
        .get(format!("{base}/items/{item_id}/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = place_bid(&client, &base, item_id, bidder, 12_000).await;
    assert_eq!(status, StatusCode::OK);

    // 입찰 이벤트가 담긴 청크가 내려올 때까지 읽는다
    let mut received = String::new();
    while !received.contains("BidPlaced") {
        let chunk = timeout(Duration::from_secs(5), response.chunk())
            .await
            .expect("SSE 수신 시간 초과")
            .unwrap()
            .expect("스트림이 일찍 끝났습니다");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("12000"));
}
