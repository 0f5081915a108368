use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::Config;
use crate::debug_log;
use crate::source::MessageSource;
use crate::types::ChatMessage;

const API_BASE_URL: &str = "https://api.groupme.com/v3";

/// Wrapper object the messages endpoint returns.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    response: Option<MessagesPage>,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Paginated fetch of a group's full message history, newest first, walking
/// backwards with `before_id` until HTTP 304 or the configured start date.
pub struct ChatFetcher {
    client: reqwest::Client,
    base_url: String,
    group_id: String,
    access_token: String,
    message_request_limit: u32,
    retry_attempts: u32,
    start_date: Option<i64>,
    end_date: Option<i64>,
}

impl ChatFetcher {
    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.is_fetch_configured() {
            bail!("Set group-id and access-token in the config before fetching");
        }

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .context("Failed to build HTTP client")?,
            base_url: API_BASE_URL.to_string(),
            group_id: config.chat.group_id.clone(),
            access_token: config.chat.access_token.clone(),
            message_request_limit: config.fetch.message_request_limit,
            retry_attempts: config.fetch.retry_attempts,
            start_date: config.fetch.start_date,
            end_date: config.fetch.end_date,
        })
    }

    /// Fetch every message in the configured window, newest first.
    pub async fn fetch_messages(&self) -> Result<Vec<ChatMessage>> {
        let mut all = Vec::new();
        let mut before_id: Option<u64> = None;
        let mut batch = 0u64;

        loop {
            let Some(page) = self.fetch_page(before_id).await? else {
                break; // 304: reached the beginning of the chat
            };
            if page.is_empty() {
                break;
            }
            batch += 1;
            before_id = page.last().map(|m| m.id);
            debug_log::log(
                "FETCH",
                "batch",
                &format!("batch {batch}: {} messages", page.len()),
            );

            let mut reached_start = false;
            for message in page {
                if let Some(start) = self.start_date
                    && message.created_at < start
                {
                    reached_start = true;
                    break;
                }
                if let Some(end) = self.end_date
                    && message.created_at >= end
                {
                    continue;
                }
                all.push(message);
            }
            if reached_start {
                break;
            }
        }

        Ok(all)
    }

    /// One page of messages, retrying transient failures. `None` marks the
    /// end of the chat (HTTP 304).
    async fn fetch_page(&self, before_id: Option<u64>) -> Result<Option<Vec<ChatMessage>>> {
        let url = format!("{}/groups/{}/messages", self.base_url, self.group_id);
        let mut last_error = None;

        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }

            let mut request = self
                .client
                .get(&url)
                .header("X-Access-Token", &self.access_token)
                .query(&[("limit", self.message_request_limit.to_string())]);
            if let Some(id) = before_id {
                request = request.query(&[("before_id", id.to_string())]);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(anyhow!(e).context("Request failed"));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_MODIFIED {
                return Ok(None);
            }
            if status.is_success() {
                let envelope: Envelope = read_json(response).await?;
                return Ok(Some(
                    envelope.response.map(|p| p.messages).unwrap_or_default(),
                ));
            }
            // 420 is the API's rate-limit response.
            if status.is_server_error() || status.as_u16() == 420 {
                last_error = Some(anyhow!("Bad response: status code {status}"));
                continue;
            }
            bail!("Bad response: status code {status}");
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Fetch failed with no response")))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response.bytes().await?;
    let mut bytes = bytes.to_vec();
    Ok(simd_json::from_slice(&mut bytes)?)
}

#[async_trait]
impl MessageSource for ChatFetcher {
    fn describe(&self) -> String {
        format!("GroupMe group {}", self.group_id)
    }

    async fn load_messages(&self) -> Result<Vec<ChatMessage>> {
        self.fetch_messages().await
    }
}
