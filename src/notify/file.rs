use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::{Notifier, NotifyError};
use crate::report::Document;

/// Writes reports to a directory instead of a chat. Messages become
/// numbered `.txt` files; documents keep their filename.
pub struct FileSink {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl FileSink {
    pub async fn create(dir: impl AsRef<Path>) -> Result<Self, NotifyError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, counter: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Notifier for FileSink {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.dir.join(format!("message_{:02}.txt", n));
        tokio::fs::write(&path, text).await?;
        info!("💾 Wrote {}", path.display());
        Ok(())
    }

    async fn send_document(&self, doc: &Document) -> Result<(), NotifyError> {
        let path = self.dir.join(&doc.filename);
        tokio::fs::write(&path, &doc.bytes).await?;
        info!("💾 Wrote {} ({} bytes)", path.display(), doc.bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_writes_messages_and_documents() {
        let dir = std::env::temp_dir().join(format!("hotel_reports_sink_{}", std::process::id()));
        let sink = FileSink::create(&dir).await.unwrap();

        sink.send_message("first").await.unwrap();
        sink.send_message("second").await.unwrap();
        sink.send_document(&Document {
            filename: "report.xlsx".into(),
            caption: String::new(),
            bytes: vec![1, 2, 3],
        })
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(dir.join("message_01.txt")).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(dir.join("message_02.txt")).unwrap(), "second");
        assert_eq!(std::fs::read(dir.join("report.xlsx")).unwrap(), [1, 2, 3]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
