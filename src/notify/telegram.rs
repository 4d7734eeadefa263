//! Telegram Bot API delivery.
//!
//! Sends are serialised through one lock so parts and documents arrive in
//! order. A 429 sleeps for the server's `retry_after` (plus a second); any
//! other failure backs off with the configured policy. Both consume attempts.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Notifier, NotifyError};
use crate::config::TelegramConfig;
use crate::report::{Document, XLSX_MIME};
use crate::retry::RetryPolicy;

const DEFAULT_RETRY_AFTER: u64 = 5;
const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

pub struct TelegramNotifier {
    http: reqwest::Client,
    endpoint: String,
    chat_id: i64,
    config: TelegramConfig,
    send_lock: Mutex<()>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, token: &str, chat_id: i64) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(25))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            chat_id,
            config: config.clone(),
            send_lock: Mutex::new(()),
        })
    }

    async fn post_text(&self, text: &str) -> Result<Outcome, NotifyError> {
        let resp = self
            .http
            .post(format!("{}/sendMessage", self.endpoint))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        outcome(status, &body)
    }

    async fn post_document(&self, doc: &Document) -> Result<Outcome, NotifyError> {
        let part = Part::bytes(doc.bytes.clone())
            .file_name(doc.filename.clone())
            .mime_str(XLSX_MIME)?;
        let mut form = Form::new().text("chat_id", self.chat_id.to_string());
        if !doc.caption.is_empty() {
            form = form.text("caption", doc.caption.clone());
        }
        let form = form.part("document", part);

        let resp = self
            .http
            .post(format!("{}/sendDocument", self.endpoint))
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        outcome(status, &body)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let parts = split_html(text, self.config.message_limit, self.config.min_cut);
        let _guard = self.send_lock.lock().await;

        for (i, part) in parts.iter().enumerate() {
            let label = format!("message part {}/{}", i + 1, parts.len());
            with_flood_control(&self.config.retry, &label, || self.post_text(part)).await?;
            debug!("Sent {} ({} chars)", label, part.chars().count());
            tokio::time::sleep(Duration::from_millis(self.config.send_gap_ms)).await;
        }
        Ok(())
    }

    async fn send_document(&self, doc: &Document) -> Result<(), NotifyError> {
        let _guard = self.send_lock.lock().await;
        with_flood_control(&self.config.retry, &doc.filename, || self.post_document(doc)).await?;
        info!("📤 Uploaded {} ({} bytes)", doc.filename, doc.bytes.len());
        Ok(())
    }
}

// ── Response handling ─────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Sent,
    RateLimited { retry_after: u64 },
}

#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ReplyParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// A 200 only counts when the body says `"ok": true`.
fn outcome(status: u16, body: &str) -> Result<Outcome, NotifyError> {
    let reply: ApiReply = serde_json::from_str(body).unwrap_or_default();

    if status == 429 {
        let retry_after = reply
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Ok(Outcome::RateLimited { retry_after });
    }
    if status == 200 && reply.ok {
        return Ok(Outcome::Sent);
    }

    let description = reply
        .description
        .unwrap_or_else(|| body.chars().take(200).collect());
    Err(NotifyError::Api { status, description })
}

async fn with_flood_control<F, Fut>(policy: &RetryPolicy, label: &str, mut send: F) -> Result<(), NotifyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Outcome, NotifyError>>,
{
    let max = policy.max_attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=max {
        match send().await {
            Ok(Outcome::Sent) => return Ok(()),
            Ok(Outcome::RateLimited { retry_after }) => {
                last = format!("rate limited ({}s)", retry_after);
                if attempt < max {
                    warn!("⚠️ {}: Telegram 429, sleeping {}s", label, retry_after);
                    tokio::time::sleep(Duration::from_secs(retry_after + 1)).await;
                }
            }
            Err(e) => {
                let wait = policy.delay_for(attempt);
                warn!("⚠️ {}: retry {}/{} in {:?}: {}", label, attempt, max, wait, e);
                last = e.to_string();
                if attempt < max {
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
    Err(NotifyError::Exhausted { attempts: max, last })
}

// ── Chunking ──────────────────────────────────────────────────────────────────

/// Split `msg` into parts of at most `limit` characters, preferring the last
/// newline before the limit unless it falls within the first `min_cut`
/// characters. Parts are trimmed and blank parts dropped.
pub fn split_message(msg: &str, limit: usize, min_cut: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut parts = Vec::new();
    let mut rest = msg.trim();

    while rest.chars().count() > limit {
        let limit_byte = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let head = &rest[..limit_byte];
        let cut = match head.rfind('\n') {
            Some(i) if head[..i].chars().count() >= min_cut => i,
            _ => limit_byte,
        };

        let part = rest[..cut].trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = rest[cut..].trim();
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Split for HTML parse mode. A `<pre>` block that needs more than one part
/// is closed and reopened in every part so each one parses on its own.
pub fn split_html(msg: &str, limit: usize, min_cut: usize) -> Vec<String> {
    let msg = msg.trim();
    if msg.chars().count() <= limit {
        return split_message(msg, limit, min_cut);
    }
    let Some(body) = msg.strip_prefix(PRE_OPEN).and_then(|m| m.strip_suffix(PRE_CLOSE)) else {
        return split_message(msg, limit, min_cut);
    };

    // tags plus the newlines around the body
    let room = limit.saturating_sub(PRE_OPEN.len() + PRE_CLOSE.len() + 2).max(1);
    split_message(body, room, min_cut.min(room))
        .into_iter()
        .map(|part| format!("{}\n{}\n{}", PRE_OPEN, part, PRE_CLOSE))
        .collect()
}
