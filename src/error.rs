// author: kodeholic (powered by Claude)

use std::fmt;

/// 레이트 리밋이 걸린 진입점 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Connection,
    RoomCreate,
    Join,
    Signal,
}

/// 시스템 전체 에러 타입
/// Display 문자열이 그대로 RPC 응답의 {error: "..."} 에 실립니다.
#[derive(Debug)]
pub enum BrokerError {
    // 1xxx: 수락/쿼터/요청 형식
    RateLimited(RateScope),
    IpRoomCap(usize),
    InvalidPayload(String),

    // 2xxx: 방 멤버십
    InvalidCode,
    RoomNotFound,
    AlreadyInRoom,
    NotAHost,
    PeerNotPending,
    NotInRoom,
    PendingFull,

    // 3xxx: 시그널링
    NotAuthorized,
    TargetNotFound,
    PayloadTooLarge,

    // 9xxx: 서버 내부
    Internal(String),
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::RateLimited(RateScope::Connection) =>
                write!(f, "Too many connections from this IP. Please try again later."),
            BrokerError::RateLimited(RateScope::RoomCreate) =>
                write!(f, "Too many rooms created. Please try again later."),
            BrokerError::RateLimited(RateScope::Join) =>
                write!(f, "Too many join attempts. Please try again later."),
            BrokerError::RateLimited(RateScope::Signal) =>
                write!(f, "Too many signals. Please slow down."),
            BrokerError::IpRoomCap(max)   => write!(f, "Maximum {} rooms per IP reached.", max),
            BrokerError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),

            BrokerError::InvalidCode      => write!(f, "Invalid code format"),
            BrokerError::RoomNotFound     => write!(f, "Room not found"),
            BrokerError::AlreadyInRoom    => write!(f, "Already in a room"),
            BrokerError::NotAHost         => write!(f, "Not a host"),
            BrokerError::PeerNotPending   => write!(f, "Peer not found in pending"),
            BrokerError::NotInRoom        => write!(f, "Not in a room"),
            BrokerError::PendingFull      =>
                write!(f, "Room has too many pending requests. Please try again later."),

            BrokerError::NotAuthorized    => write!(f, "Not authorized to signal"),
            BrokerError::TargetNotFound   => write!(f, "Target not found"),
            BrokerError::PayloadTooLarge  => write!(f, "Payload too large."),

            BrokerError::Internal(msg)    => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for BrokerError {}

impl BrokerError {
    pub fn code(&self) -> u16 {
        match self {
            // 1xxx: 수락/쿼터
            BrokerError::RateLimited(RateScope::Connection) => 1000,
            BrokerError::RateLimited(RateScope::RoomCreate) => 1001,
            BrokerError::RateLimited(RateScope::Join)       => 1002,
            BrokerError::RateLimited(RateScope::Signal)     => 1003,
            BrokerError::IpRoomCap(_)                       => 1010,
            BrokerError::InvalidPayload(_)                  => 1020,

            // 2xxx: 방 멤버십
            BrokerError::InvalidCode     => 2000,
            BrokerError::RoomNotFound    => 2001,
            BrokerError::AlreadyInRoom   => 2002,
            BrokerError::NotAHost        => 2003,
            BrokerError::PeerNotPending  => 2004,
            BrokerError::NotInRoom       => 2005,
            BrokerError::PendingFull     => 2006,

            // 3xxx: 시그널링
            BrokerError::NotAuthorized   => 3000,
            BrokerError::TargetNotFound  => 3001,
            BrokerError::PayloadTooLarge => 3002,

            // 9xxx: 서버 내부
            BrokerError::Internal(_)     => 9000,
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
