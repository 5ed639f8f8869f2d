use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotgenError {
    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Dialog error: {0}")]
    Dialog(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Missing activity.conversation")]
    MissingConversation,

    #[error("Unknown dialog: {0}")]
    UnknownDialog(String),

    #[error("No active dialog")]
    NoActiveDialog,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized access")]
    Unauthorized,
}

pub type Result<T> = std::result::Result<T, BotgenError>;
