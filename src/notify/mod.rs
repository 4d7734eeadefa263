pub mod file;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::report::Document;

pub use self::file::FileSink;
pub use self::telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram HTTP {status}: {description}")]
    Api { status: u16, description: String },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where finished reports go. The destination is fixed when the notifier is built.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError>;

    async fn send_document(&self, doc: &Document) -> Result<(), NotifyError>;
}
