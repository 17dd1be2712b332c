#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read log file")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error("no log file found at any default location")]
    NoDefaultLog,
}
