//! HTTP side of a chat stream: issues the request, checks the status and hands the body to the
//! decoder.
//!
//! Authentication is not handled here. Build the [`Client`] with whatever default headers the
//! platform needs and pass it to [`ChatClient::new`].

use http_body_util::BodyDataStream;
use reqwest::{
    Body, Client, Response,
    header::{ACCEPT, HeaderValue},
};
use serde::Serialize;

use crate::{
    driver::{Outcome, StreamHandler, start},
    errors::SetupError,
    event_stream::EventStream,
};

/// Environment variable read by [`ClientConfig::from_env`]
pub const BASE_URL_ENV: &str = "CHAT_API_URL";
/// Used when [`BASE_URL_ENV`] is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Raw body of an opened chat stream
pub type ByteStream = BodyDataStream<Body>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read the base url from `CHAT_API_URL`, falling back to [`DEFAULT_BASE_URL`]
    pub fn from_env() -> Self {
        std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    message: &'a str,
}

/// Convert a [`Response`] into a byte [`Stream`][futures_core::Stream] of its body
pub fn response_to_stream(response: Response) -> ByteStream {
    BodyDataStream::new(Body::from(response))
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: ClientConfig,
}

impl ChatClient {
    pub fn new(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stream_url(&self, request_id: &str) -> String {
        format!(
            "{}/api/requests/{}/chat/stream",
            self.config.base_url.trim_end_matches('/'),
            request_id
        )
    }

    /// Send `message` and return the raw response body once the server accepted it.
    ///
    /// Fails with [`SetupError`] if the request cannot be sent or the status is not a success.
    pub async fn open_body(&self, request_id: &str, message: &str) -> Result<ByteStream, SetupError> {
        let url = self.stream_url(request_id);
        tracing::debug!(%url, "opening chat stream");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(&SendMessage { message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "chat stream rejected");
            return Err(SetupError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response_to_stream(response))
    }

    /// Like [`ChatClient::open_body`], decoded into [`ChatEvent`][crate::event::ChatEvent]s
    pub async fn open_stream(
        &self,
        request_id: &str,
        message: &str,
    ) -> Result<EventStream<ByteStream>, SetupError> {
        self.open_body(request_id, message).await.map(EventStream::new)
    }

    /// Send `message` and deliver the reply to `handler`.
    ///
    /// Setup failures come back as `Err` without touching `handler`; anything after that ends in
    /// exactly one `on_done` or `on_error`.
    pub async fn stream_message<H>(
        &self,
        request_id: &str,
        message: &str,
        handler: H,
    ) -> Result<Outcome, SetupError>
    where
        H: StreamHandler,
    {
        start(self.open_body(request_id, message), handler).await
    }
}
