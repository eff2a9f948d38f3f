//! Error types shared by every component of the bot.
//!
//! [`BotError`] is the single error type returned by the core. Each variant
//! belongs to one [`ErrorKind`]; handlers use [`BotError::user_message`] to
//! answer on the originating chat instead of letting the error escape.

use std::fmt;

/// Coarse error classification used for logging and reply policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the admin role.
    Unauthorized,
    /// Caller has no complete player profile.
    NotRegistered,
    /// Malformed or semantically wrong input.
    InvalidInput,
    /// The requested transition conflicts with the current state.
    StateConflict,
    /// Unknown training, ballot, debt or player.
    NotFound,
    /// Outbound chat send failed for one recipient.
    TransientSend,
    /// The persistence backend refused the operation.
    StoreIo,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::NotRegistered => "NOT_REGISTERED",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::StateConflict => "STATE_CONFLICT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::TransientSend => "TRANSIENT_SEND",
            ErrorKind::StoreIo => "STORE_IO",
        };
        f.write_str(name)
    }
}

/// Specific state conflicts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    /// The ballot already holds `capacity` YES votes.
    #[error("ballot is full ({capacity} players)")]
    CapacityReached {
        /// Configured YES capacity.
        capacity: usize,
    },
    /// The training was already charged or collected.
    #[error("training is already charged")]
    AlreadyCharged,
    /// The debt was already settled.
    #[error("debt is already paid")]
    AlreadyPaid,
    /// Votes are not accepted for this training right now.
    #[error("voting is closed for this training")]
    VotingClosed,
    /// A training with the same fingerprint exists.
    #[error("training {0} already exists")]
    DuplicateTraining(String),
}

/// Central error enum of the bot core.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Admin role required.
    #[error("admin rights required")]
    Unauthorized,

    /// Player must finish registration first.
    #[error("player {0} is not registered")]
    NotRegistered(String),

    /// Input validation failed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transition rejected by the current state.
    #[error("state conflict: {0}")]
    StateConflict(#[from] Conflict),

    /// Charging a ballot without YES voters.
    #[error("no attendees voted yes for {0}")]
    NoAttendees(String),

    /// Entity lookup failed.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity type, e.g. `training`.
        entity: &'static str,
        /// Lookup key.
        key: String,
    },

    /// A single outbound message could not be delivered.
    #[error("failed to send to {chat_id}: {reason}")]
    TransientSend {
        /// Recipient chat.
        chat_id: i64,
        /// Transport error text.
        reason: String,
    },

    /// Persistence failure.
    #[error("store error: {0}")]
    StoreIo(#[from] StoreError),
}

impl BotError {
    /// Shorthand for [`BotError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        BotError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Shorthand for [`BotError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        BotError::InvalidInput(message.into())
    }

    /// Returns the error kind of this variant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::Unauthorized => ErrorKind::Unauthorized,
            BotError::NotRegistered(_) => ErrorKind::NotRegistered,
            BotError::InvalidInput(_) => ErrorKind::InvalidInput,
            BotError::StateConflict(_) | BotError::NoAttendees(_) => ErrorKind::StateConflict,
            BotError::NotFound { .. } => ErrorKind::NotFound,
            BotError::TransientSend { .. } => ErrorKind::TransientSend,
            BotError::StoreIo(_) => ErrorKind::StoreIo,
        }
    }

    /// Reply text shown to the user whose action failed.
    pub fn user_message(&self) -> String {
        match self {
            BotError::Unauthorized => "This command is available to admins only.".to_string(),
            BotError::NotRegistered(_) => {
                "You are not registered yet. Send /start to register.".to_string()
            }
            BotError::InvalidInput(reason) => format!("Invalid input: {reason}"),
            BotError::StateConflict(Conflict::CapacityReached { capacity }) => {
                format!("Sorry, the training is full ({capacity} players already confirmed).")
            }
            BotError::StateConflict(conflict) => {
                let mut text = conflict.to_string();
                if let Some(first) = text.get(..1) {
                    text = first.to_uppercase() + text.get(1..).unwrap_or_default();
                }
                format!("{text}.")
            }
            BotError::NoAttendees(_) => "Nobody voted to attend this training.".to_string(),
            BotError::NotFound { entity, .. } => format!("The {entity} was not found."),
            BotError::TransientSend { .. } => "The message could not be delivered.".to_string(),
            BotError::StoreIo(_) => "Storage is unavailable, please try again later.".to_string(),
        }
    }
}

/// Errors raised by [`crate::database::store::Store`] backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQL backend failure.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Document (de)serialization failure.
    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File backend failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection did not hold a JSON object.
    #[error("collection {0} is not a JSON object")]
    NotAnObject(String),
}

/// Result alias used across the core.
pub type BotResult<T> = Result<T, BotError>;
