//! Contract for the render service the client talks to.

use std::pin::Pin;

use async_trait::async_trait;
use chatlens_api_types::{Notification, RenderRequest, RenderUpdate, TokenMap};
use futures::Stream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid service URL: {0}")]
    Url(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
    #[error("notification stream closed by the service")]
    StreamClosed,
}

impl RemoteError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: err.to_string(),
        }
    }
}

/// Push notifications as they arrive. The stream ends when the connection does.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<Notification, RemoteError>> + Send>>;

/// Remote template render service.
///
/// Every method is a single round trip; none of them retry.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn list_files(&self) -> Result<Vec<String>, RemoteError>;

    async fn list_test_cases(&self) -> Result<Vec<String>, RemoteError>;

    async fn fetch_vocabulary(&self) -> Result<TokenMap, RemoteError>;

    /// Template the service suggests opening first, if any.
    async fn active_template(&self) -> Result<Option<String>, RemoteError>;

    async fn render(&self, request: &RenderRequest) -> Result<RenderUpdate, RemoteError>;

    async fn subscribe(&self) -> Result<NotificationStream, RemoteError>;
}
