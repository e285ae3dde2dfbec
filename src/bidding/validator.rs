/// 입찰 검증
/// 경매 상태와 입찰 후보를 받아 수락/거절만 결정하는 순수 함수.
/// 부수 효과가 없으므로 호출자가 최신 상태를 넘겨줄 책임을 진다.
// region:    --- Imports
use chrono::{DateTime, Utc};
// endregion: --- Imports

// region:    --- Auction State

/// 진행 중인 경매의 파생 상태
#[derive(Debug, Clone)]
pub struct AuctionState {
    pub item_id: i64,
    pub start_price: i64,
    pub deadline: DateTime<Utc>,
    pub best_bid: Option<BestBid>,
    pub closed: bool,
}

/// 현재 최고 입찰
#[derive(Debug, Clone)]
pub struct BestBid {
    pub bidder_id: i64,
    pub amount: i64,
}

// endregion: --- Auction State

// region:    --- Reject Reason

/// 입찰 거절 사유. 오류가 아니라 값으로 전달된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BelowStartPrice,
    AuctionClosed,
    BidTooLow,
}

impl RejectReason {
    /// 클라이언트에 내려주는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::BelowStartPrice => "BELOW_START_PRICE",
            RejectReason::AuctionClosed => "AUCTION_CLOSED",
            RejectReason::BidTooLow => "BID_TOO_LOW",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::BelowStartPrice => "시작 가격 이상으로 입찰해야 합니다.",
            RejectReason::AuctionClosed => "경매가 이미 종료되었습니다.",
            RejectReason::BidTooLow => "현재 최고 입찰가보다 높아야 합니다.",
        }
    }
}

// endregion: --- Reject Reason

// region:    --- Validate

/// 입찰 검증. 거절 조건은 아래 순서로 검사하고 첫 번째로 걸리는 사유를 돌려준다.
/// 1. 입찰가가 시작 가격 미만
/// 2. 마감 시각 경과(또는 이미 종료 처리된 경매)
/// 3. 현재 최고 입찰가 이하
pub fn validate(state: &AuctionState, amount: i64, now: DateTime<Utc>) -> Result<(), RejectReason> {
    if amount < state.start_price {
        return Err(RejectReason::BelowStartPrice);
    }
    if state.closed || now >= state.deadline {
        return Err(RejectReason::AuctionClosed);
    }
    if let Some(best) = &state.best_bid {
        if amount <= best.amount {
            return Err(RejectReason::BidTooLow);
        }
    }
    Ok(())
}

// endregion: --- Validate

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_state(start_price: i64, best: Option<i64>) -> AuctionState {
        AuctionState {
            item_id: 1,
            start_price,
            deadline: Utc::now() + Duration::hours(1),
            best_bid: best.map(|amount| BestBid {
                bidder_id: 7,
                amount,
            }),
            closed: false,
        }
    }

    #[test]
    fn test_rejects_below_start_price() {
        let state = open_state(1000, None);
        assert_eq!(
            validate(&state, 999, Utc::now()),
            Err(RejectReason::BelowStartPrice)
        );
    }

    #[test]
    fn test_accepts_exact_start_price() {
        // 시작 가격과 같은 금액은 첫 입찰로 허용된다
        let state = open_state(1000, None);
        assert_eq!(validate(&state, 1000, Utc::now()), Ok(()));
    }

    #[test]
    fn test_rejects_after_deadline() {
        let mut state = open_state(1000, None);
        state.deadline = Utc::now() - Duration::seconds(1);
        assert_eq!(
            validate(&state, 1500, Utc::now()),
            Err(RejectReason::AuctionClosed)
        );
    }

    #[test]
    fn test_rejects_at_exact_deadline() {
        let state = open_state(1000, None);
        assert_eq!(
            validate(&state, 1500, state.deadline),
            Err(RejectReason::AuctionClosed)
        );
    }

    #[test]
    fn test_rejects_closed_auction() {
        let mut state = open_state(1000, None);
        state.closed = true;
        assert_eq!(
            validate(&state, 1500, Utc::now()),
            Err(RejectReason::AuctionClosed)
        );
    }

    #[test]
    fn test_rejects_equal_or_lower_than_best() {
        let state = open_state(1000, Some(1200));
        assert_eq!(
            validate(&state, 1200, Utc::now()),
            Err(RejectReason::BidTooLow)
        );
        assert_eq!(
            validate(&state, 1100, Utc::now()),
            Err(RejectReason::BidTooLow)
        );
        assert_eq!(validate(&state, 1201, Utc::now()), Ok(()));
    }

    #[test]
    fn test_below_start_price_wins_over_deadline() {
        // 거절 사유는 선언된 순서대로 검사된다:
        // 마감이 지난 경매라도 시작 가격 미만이면 그 사유가 먼저다
        let mut state = open_state(1000, None);
        state.deadline = Utc::now() - Duration::seconds(1);
        assert_eq!(
            validate(&state, 900, Utc::now()),
            Err(RejectReason::BelowStartPrice)
        );
    }

    #[test]
    fn test_ascending_sequence() {
        // 시작가 1000원: 900 거절, 1200 수락, 1100 거절, 1500 수락
        let now = Utc::now();
        let mut state = open_state(1000, None);

        assert_eq!(
            validate(&state, 900, now),
            Err(RejectReason::BelowStartPrice)
        );

        assert_eq!(validate(&state, 1200, now), Ok(()));
        state.best_bid = Some(BestBid {
            bidder_id: 1,
            amount: 1200,
        });

        assert_eq!(validate(&state, 1100, now), Err(RejectReason::BidTooLow));

        assert_eq!(validate(&state, 1500, now), Ok(()));
        state.best_bid = Some(BestBid {
            bidder_id: 2,
            amount: 1500,
        });

        assert_eq!(state.best_bid.as_ref().map(|b| b.amount), Some(1500));
    }
}

// endregion: --- Tests
