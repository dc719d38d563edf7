//! HTTP Backend Implementation
//!
//! Client for the RAG service REST API.
//!
//! # Service API
//!
//! - `/chats/{id}/ask` - Ask a question; the answer streams back as `data:` records
//! - `/chats`, `/chats/create`, `/chats/{id}` - Chat storage
//! - `/bots`, `/bots/{id}`, `/bots/generate-profile` - Bot storage
//! - `/documents`, `/upload`, `/documents/cleanup` - Retrieval corpus
//! - `/health` - Service and model server status
//!
//! Every request carries `X-User-ID` and, when configured, a bearer token.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{RequestBuilder, Response, Url};

use super::traits::{AskTransport, ByteStream, TransportError};
use super::types::{
    Bot, BotConfig, BotEnvelope, BotProfile, BotsEnvelope, Chat, ChatEnvelope, ChatUpdate,
    ChatsEnvelope, Document, DocumentsEnvelope, HealthStatus, NewChat, UploadReceipt,
};
use crate::config::ApiConfig;
use crate::messages::ChatId;

/// Header naming the acting user
pub const USER_ID_HEADER: &str = "X-User-ID";

/// RAG service client
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// Service root; ids are appended as percent-encoded path segments
    base_url: Url,
    /// `X-User-ID` value
    user_id: String,
    /// Bearer token, if any
    bearer_token: Option<String>,
    /// Timeout for everything except the ask stream
    request_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend from connection settings
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be built (e.g. TLS setup).
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        // No overall timeout on the client: answers stream for as long as the
        // model takes. REST calls set their own.
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid service URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid service URL: {}", config.base_url);
        }

        Ok(Self {
            base_url,
            user_id: config.user_id.clone(),
            bearer_token: config.bearer_token.clone(),
            request_timeout: config.request_timeout,
            http_client,
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint below the base URL; each segment is percent-encoded, so ids
    /// containing `/`, `?` or `#` stay one segment
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn ask_url(&self, chat_id: &ChatId) -> Url {
        self.url(&["chats", chat_id.as_str(), "ask"])
    }

    /// Attach identity headers
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(USER_ID_HEADER, &self.user_id);
        match self.bearer_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.http_client.get(self.url(segments)))
            .timeout(self.request_timeout)
    }

    fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.http_client.post(self.url(segments)))
            .timeout(self.request_timeout)
    }

    fn put(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.http_client.put(self.url(segments)))
            .timeout(self.request_timeout)
    }

    fn delete(&self, segments: &[&str]) -> RequestBuilder {
        self.authorize(self.http_client.delete(self.url(segments)))
            .timeout(self.request_timeout)
    }

    /// Check service health
    pub async fn health(&self) -> anyhow::Result<HealthStatus> {
        let response = expect_success(self.get(&["health"]).send().await?).await?;
        Ok(response.json().await?)
    }

    // =========================================================================
    // Bots
    // =========================================================================

    /// List bots visible to the user
    pub async fn list_bots(&self) -> anyhow::Result<Vec<Bot>> {
        let response = expect_success(self.get(&["bots"]).send().await?).await?;
        Ok(response.json::<BotsEnvelope>().await?.bots)
    }

    /// Create a bot
    pub async fn create_bot(&self, bot: &BotConfig) -> anyhow::Result<Bot> {
        let response = expect_success(self.post(&["bots"]).json(bot).send().await?).await?;
        Ok(response.json::<BotEnvelope>().await?.bot)
    }

    /// Replace a bot's settings
    pub async fn update_bot(&self, bot_id: &str, bot: &BotConfig) -> anyhow::Result<()> {
        expect_success(self.put(&["bots", bot_id]).json(bot).send().await?).await?;
        Ok(())
    }

    /// Delete a bot
    pub async fn delete_bot(&self, bot_id: &str) -> anyhow::Result<()> {
        expect_success(self.delete(&["bots", bot_id]).send().await?).await?;
        Ok(())
    }

    /// Ask the service to draft a description and instructions for `name`
    pub async fn generate_bot_profile(&self, name: &str) -> anyhow::Result<BotProfile> {
        let response = expect_success(
            self.post(&["bots", "generate-profile"])
                .json(&serde_json::json!({ "name": name }))
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    // =========================================================================
    // Chats
    // =========================================================================

    /// List the user's chats
    pub async fn list_chats(&self) -> anyhow::Result<Vec<Chat>> {
        let response = expect_success(self.get(&["chats"]).send().await?).await?;
        Ok(response.json::<ChatsEnvelope>().await?.chats)
    }

    /// Load one chat with its transcript
    pub async fn get_chat(&self, chat_id: &ChatId) -> anyhow::Result<Chat> {
        let response = expect_success(self.get(&["chats", chat_id.as_str()]).send().await?).await?;
        Ok(response.json::<ChatEnvelope>().await?.chat)
    }

    /// Create a chat
    pub async fn create_chat(&self, chat: &NewChat) -> anyhow::Result<Chat> {
        let response = expect_success(self.post(&["chats", "create"]).json(chat).send().await?).await?;
        let chat = response.json::<ChatEnvelope>().await?.chat;
        tracing::info!(chat_id = %chat.id, title = %chat.title, "Created chat");
        Ok(chat)
    }

    /// Change a chat's title, documents, or bot
    pub async fn update_chat(&self, chat_id: &ChatId, update: &ChatUpdate) -> anyhow::Result<()> {
        expect_success(
            self.put(&["chats", chat_id.as_str()])
                .json(update)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    /// Delete a chat
    pub async fn delete_chat(&self, chat_id: &ChatId) -> anyhow::Result<()> {
        expect_success(self.delete(&["chats", chat_id.as_str()]).send().await?).await?;
        Ok(())
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// List uploaded documents
    pub async fn list_documents(&self) -> anyhow::Result<Vec<Document>> {
        let response = expect_success(self.get(&["documents"]).send().await?).await?;
        Ok(response.json::<DocumentsEnvelope>().await?.documents)
    }

    /// Upload a file for indexing
    pub async fn upload_document(&self, path: &Path) -> anyhow::Result<UploadReceipt> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a file path: {}", path.display()))?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        tracing::info!(file = %file_name, bytes = data.len(), "Uploading document");

        let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = expect_success(self.post(&["upload"]).multipart(form).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Delete a document
    pub async fn delete_document(&self, doc_id: &str) -> anyhow::Result<()> {
        expect_success(self.delete(&["documents", doc_id]).send().await?).await?;
        Ok(())
    }

    /// Remove duplicate chunks from the retrieval index
    ///
    /// Returns the service's summary message.
    pub async fn cleanup_documents(&self) -> anyhow::Result<String> {
        let response = expect_success(self.post(&["documents", "cleanup"]).send().await?).await?;
        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// Turn a non-2xx response into an error carrying the status and the most
/// useful part of the body
async fn expect_success(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("Service returned {status}: {}", error_message(&body))
}

/// Prefer the JSON `error` or `message` field over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl AskTransport for HttpBackend {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn open_ask_stream(
        &self,
        chat_id: &ChatId,
        question: &str,
    ) -> Result<ByteStream, TransportError> {
        let url = self.ask_url(chat_id);

        let response = self
            .authorize(self.http_client.post(url.clone()))
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        tracing::debug!(chat_id = %chat_id, %status, "Ask stream opened");

        Ok(Box::pin(
            response
                .bytes_stream()
                .map_err(|e| TransportError::Read(e.to_string())),
        ))
    }
}
