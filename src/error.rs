use serde::Serialize;

/// Rejections that are surfaced back to the offending client only, never
/// mutating room state. See §7 of the spec for the full taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameError {
    #[error("no room with that code exists")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("only the host can do that")]
    NotHost,
    #[error("not enough players to start")]
    NotEnoughPlayers,
    #[error("you already answered that")]
    AlreadyAnswered,
    #[error("you are on cooldown")]
    AnswerCooldown,
    #[error("the round has already ended")]
    RoundExpired,
    #[error("invalid pseudo")]
    InvalidPseudo,
    #[error("slow down")]
    RateLimited,
    #[error("you are not in that room")]
    PlayerNotInRoom,
    #[error("invalid room code")]
    InvalidRoomCode,
    #[error("it's not your turn")]
    NotYourTurn,
    #[error("unexpected server error")]
    ServerError,
}

impl GameError {
    pub fn code(self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::RoomFull => "ROOM_FULL",
            GameError::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            GameError::NotHost => "NOT_HOST",
            GameError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            GameError::AlreadyAnswered => "ALREADY_ANSWERED",
            GameError::AnswerCooldown => "ANSWER_COOLDOWN",
            GameError::RoundExpired => "ROUND_EXPIRED",
            GameError::InvalidPseudo => "INVALID_PSEUDO",
            GameError::RateLimited => "RATE_LIMITED",
            GameError::PlayerNotInRoom => "PLAYER_NOT_IN_ROOM",
            GameError::InvalidRoomCode => "INVALID_ROOM_CODE",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::ServerError => "SERVER_ERROR",
        }
    }

    pub fn to_payload(self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

pub type GameResult<T> = Result<T, GameError>;
