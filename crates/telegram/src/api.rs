use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coverbot_core::dialog::ReplySink;
use coverbot_core::errors::SinkError;
use coverbot_core::session::UserId;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::wire::{TgFile, Update};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Request(String),
    #[error("telegram api rejected the call: {0}")]
    Api(String),
    #[error("telegram file download failed: {0}")]
    Download(String),
}

/// Bot API seam: long-poll ingress plus the outbound calls the dialog needs.
#[async_trait]
pub trait BotTransport: Send + Sync {
    /// `Ok(None)` means the transport is closed and the poll loop should end.
    async fn get_updates(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), TransportError>;
    async fn send_document(
        &self,
        user: UserId,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopBotTransport;

#[async_trait]
impl BotTransport for NoopBotTransport {
    async fn get_updates(
        &self,
        _offset: Option<i64>,
    ) -> Result<Option<Vec<Update>>, TransportError> {
        Ok(None)
    }

    async fn fetch_file(&self, _file_id: &str) -> Result<Vec<u8>, TransportError> {
        Ok(Vec::new())
    }

    async fn send_text(&self, _user: UserId, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_document(
        &self,
        _user: UserId,
        _filename: &str,
        _bytes: Vec<u8>,
        _caption: &str,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api(
                self.description.unwrap_or_else(|| "no description".to_owned()),
            ));
        }
        self.result.ok_or_else(|| TransportError::Api("ok response without result".to_owned()))
    }
}

/// HTTPS Bot API client. The long-poll timeout doubles as the request
/// timeout floor so getUpdates is not cut off mid-poll.
pub struct HttpBotApi {
    http: reqwest::Client,
    api_base: String,
    file_base: String,
    poll_timeout_secs: u64,
}

impl HttpBotApi {
    pub fn new(bot_token: &SecretString, poll_timeout_secs: u64) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let token = bot_token.expose_secret();
        Ok(Self {
            http,
            api_base: format!("https://api.telegram.org/bot{token}"),
            file_base: format!("https://api.telegram.org/file/bot{token}"),
            poll_timeout_secs,
        })
    }

    async fn call<T>(&self, method: &str, body: serde_json::Value) -> Result<T, TransportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        envelope.into_result()
    }
}

#[async_trait]
impl BotTransport for HttpBotApi {
    async fn get_updates(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body).await.map(Some)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file: TgFile = self.call("getFile", json!({ "file_id": file_id })).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TransportError::Download("getFile returned no path".to_owned()))?;

        let response = self
            .http
            .get(format!("{}/{file_path}", self.file_base))
            .send()
            .await
            .map_err(|error| TransportError::Download(error.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Download(format!(
                "file endpoint returned status {}",
                response.status().as_u16()
            )));
        }
        let bytes =
            response.bytes().await.map_err(|error| TransportError::Download(error.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn send_text(&self, user: UserId, text: &str) -> Result<(), TransportError> {
        let _: serde_json::Value =
            self.call("sendMessage", json!({ "chat_id": user.0, "text": text })).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        user: UserId,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let form = reqwest::multipart::Form::new()
            .text("chat_id", user.0.to_string())
            .text("caption", caption.to_owned())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_owned()),
            );

        let response = self
            .http
            .post(format!("{}/sendDocument", self.api_base))
            .multipart(form)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let envelope: ApiEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        envelope.into_result().map(|_| ())
    }
}

/// Adapts a `BotTransport` to the core's outbound `ReplySink`. Artifact
/// references are read from disk here so the core never touches transport
/// concerns.
pub struct TelegramSink {
    transport: Arc<dyn BotTransport>,
}

impl TelegramSink {
    pub fn new(transport: Arc<dyn BotTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), SinkError> {
        self.transport
            .send_text(user, text)
            .await
            .map_err(|error| SinkError::Send(error.to_string()))
    }

    async fn send_document(
        &self,
        user: UserId,
        reference: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), SinkError> {
        let bytes = tokio::fs::read(reference)
            .await
            .map_err(|error| SinkError::Send(format!("could not read artifact: {error}")))?;
        self.transport
            .send_document(user, filename, bytes, caption)
            .await
            .map_err(|error| SinkError::Send(error.to_string()))
    }
}
