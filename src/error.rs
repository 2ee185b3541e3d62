use uuid::Uuid;

use crate::models::domain::Domain;

/// Error taxonomy for the bridge core.
///
/// `SessionInvalid` is intentionally absent: expired sessions are recovered
/// inside the pool and callers only ever see a working session or a hard
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("browser pool exhausted: no connected browser process available")]
    PoolExhausted,

    #[error("timed out waiting for exclusive ERP access after {attempts} attempts")]
    LockTimeout { attempts: u32 },

    #[error("sync of {domain} failed: {message}")]
    SyncFailed { domain: Domain, message: String },

    #[error("order placement failed: {0}")]
    OrderFailed(String),

    #[error("order job {0} not found")]
    JobNotFound(Uuid),

    #[error("order queue is full")]
    QueueFull,

    #[error("fast path already active for {0}")]
    FastPathActive(Domain),

    #[error("browser process {index} crashed")]
    ProcessCrashed { index: usize },

    #[error("browser session error: {0}")]
    Session(String),

    #[error("automation driver error: {0}")]
    Driver(String),

    #[error("document extraction failed: {0}")]
    Extract(String),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
