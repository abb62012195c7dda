use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to (de)serialize tuning parameters: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("channel not found: namespace={namespace:#010x}, tsid={tsid:#06x}, onid={onid:#06x}")]
    ChannelNotFound { namespace: u32, tsid: u16, onid: u16 },

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
