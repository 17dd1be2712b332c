#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("tracker database error")]
    SQLiteErr(#[from] rusqlite::Error),
    #[error("failed to encode JSON column")]
    JSONErr(#[from] serde_json::Error),
}
