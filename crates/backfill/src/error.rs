use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("unknown prompt variant: {0}")]
    UnknownPromptVariant(String),

    #[error("invalid year/month ({year}, {month}): {reason}")]
    InvalidYearMonth { year: i32, month: i32, reason: &'static str },

    #[error("month lock for ({year}, {month}) is already held")]
    MonthLockHeld { year: i32, month: i32 },

    #[error("backfill job for ({year}, {month}) rejected: quota buffer can't cover a {batch_size}-candidate cron run")]
    QuotaPolicyRejected { year: i32, month: i32, batch_size: u32 },

    #[error("kv store error: {0}")]
    Kv(#[from] alexandria_kv::KvError),

    #[error("quota error: {0}")]
    Quota(#[from] alexandria_quota::QuotaError),

    #[error("lock error: {0}")]
    Lock(#[from] alexandria_locks::LockError),

    #[error("merge error: {0}")]
    Merge(#[from] alexandria_merge::MergeError),

    #[error("provider error: {0}")]
    Provider(#[from] alexandria_providers::ProviderError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackfillError>;
