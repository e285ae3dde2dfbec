/// 상품 등록
pub const INSERT_ITEM: &str = r#"
    INSERT INTO items (owner_id, name, start_price, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, owner_id, name, start_price, created_at, sold_to, closed_at
"#;

/// 상품 조회
pub const GET_ITEM: &str = "SELECT id, owner_id, name, start_price, created_at, sold_to, closed_at FROM items WHERE id = $1";

/// 판매 중 상품 목록 조회
pub const GET_OPEN_ITEMS: &str = "SELECT id, owner_id, name, start_price, created_at, sold_to, closed_at FROM items WHERE sold_to IS NULL AND closed_at IS NULL ORDER BY created_at DESC";

/// 낙찰 상품 목록 조회
pub const GET_WON_ITEMS: &str = "SELECT id, owner_id, name, start_price, created_at, sold_to, closed_at FROM items WHERE sold_to = $1 ORDER BY closed_at DESC";

/// 입찰 기록 추가
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (item_id, bidder_id, amount, message, created_at)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, item_id, bidder_id, amount, message, created_at
"#;

/// 입찰 이력 조회(입찰 시각 오름차순)
pub const GET_BIDS: &str = r#"
    SELECT id, item_id, bidder_id, amount, message, created_at
    FROM bids
    WHERE item_id = $1
    ORDER BY created_at ASC, id ASC
"#;

/// 낙찰자 기록. 이미 종료된 상품이면 아무 행도 갱신하지 않는다.
pub const SET_SOLD: &str = r#"
    UPDATE items SET sold_to = $2, closed_at = $3
    WHERE id = $1 AND sold_to IS NULL AND closed_at IS NULL
    RETURNING id
"#;

/// 유찰 처리
pub const CLOSE_UNSOLD: &str = r#"
    UPDATE items SET closed_at = $2
    WHERE id = $1 AND sold_to IS NULL AND closed_at IS NULL
    RETURNING id
"#;

/// 잔액 차감(원자적 상대 갱신)
pub const DEBIT_ACCOUNT: &str = "UPDATE accounts SET balance = balance - $2 WHERE id = $1";

/// 계정 등록
pub const INSERT_ACCOUNT: &str =
    "INSERT INTO accounts (nick, balance) VALUES ($1, $2) RETURNING id, nick, balance";

/// 계정 조회
pub const GET_ACCOUNT: &str = "SELECT id, nick, balance FROM accounts WHERE id = $1";
