use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlerterError {
    #[error("HTTP request to Telegram failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Telegram API returned an error: {0}")]
    Api(String),
}
