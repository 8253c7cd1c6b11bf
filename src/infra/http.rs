//! reqwest client for the remote render service.

use std::time::Duration;

use async_trait::async_trait;
use chatlens_api_types::{
    ACTIVE_TEMPLATE_PATH, ActiveTemplate, EVENTS_PATH, FILES_PATH, RENDER_PATH, RenderRequest,
    RenderUpdate, TEST_CASES_PATH, TOKENS_PATH, TokenMap,
};
use reqwest::{Client, Response, Url, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::remote::{NotificationStream, RemoteError, RemoteService};
use crate::infra::events;

#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: Client,
    base: Url,
    request_timeout: Duration,
}

impl HttpRemote {
    /// Client rooted at `base_url`. `request_timeout` bounds every JSON round
    /// trip; the notification stream is left open indefinitely.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, RemoteError> {
        let mut base = Url::parse(base_url).map_err(|err| RemoteError::Url(err.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(RemoteError::transport)?;

        Ok(Self {
            client,
            base,
            request_timeout,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("chatlens/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path)
            .map_err(|err| RemoteError::Url(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(self.url(path)?)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let response = check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| RemoteError::decode(what, err))
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn list_files(&self) -> Result<Vec<String>, RemoteError> {
        self.get_json(FILES_PATH, "file list").await
    }

    async fn list_test_cases(&self) -> Result<Vec<String>, RemoteError> {
        self.get_json(TEST_CASES_PATH, "test case list").await
    }

    async fn fetch_vocabulary(&self) -> Result<TokenMap, RemoteError> {
        self.get_json(TOKENS_PATH, "token vocabulary").await
    }

    async fn active_template(&self) -> Result<Option<String>, RemoteError> {
        let active: ActiveTemplate = self
            .get_json(ACTIVE_TEMPLATE_PATH, "active template")
            .await?;
        Ok(active.path.filter(|path| !path.is_empty()))
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderUpdate, RemoteError> {
        let response = self
            .client
            .post(self.url(RENDER_PATH)?)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let response = check(response).await?;
        response
            .json::<RenderUpdate>()
            .await
            .map_err(|err| RemoteError::decode("render response", err))
    }

    async fn subscribe(&self) -> Result<NotificationStream, RemoteError> {
        let url = self.url(EVENTS_PATH)?;
        debug!(target = "chatlens::http", url = %url, "opening notification stream");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(RemoteError::transport)?;
        let response = check(response).await?;
        Ok(events::notification_stream(response.bytes_stream()))
    }
}

async fn check(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use chatlens_api_types::Notification;

    fn remote(server: &MockServer) -> HttpRemote {
        HttpRemote::new(&server.base_url(), Duration::from_secs(5)).expect("remote")
    }

    #[tokio::test]
    async fn lists_files_and_test_cases() {
        let server = MockServer::start_async().await;
        let files = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/files");
                then.status(200).json_body(json!(["a.jinja", "nested/b.jinja"]));
            })
            .await;
        let cases = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/test-cases");
                then.status(200).json_body(json!(["basic", "tools"]));
            })
            .await;

        let remote = remote(&server);
        assert_eq!(
            remote.list_files().await.expect("files"),
            vec!["a.jinja".to_string(), "nested/b.jinja".to_string()]
        );
        assert_eq!(
            remote.list_test_cases().await.expect("cases"),
            vec!["basic".to_string(), "tools".to_string()]
        );
        files.assert_async().await;
        cases.assert_async().await;
    }

    #[tokio::test]
    async fn base_path_prefix_is_kept() {
        let server = MockServer::start_async().await;
        let tokens = server
            .mock_async(|when, then| {
                when.method(GET).path("/debugger/api/tokens");
                then.status(200)
                    .json_body(json!({"bos_token": "<s>", "eos_token": "</s>"}));
            })
            .await;

        let remote = HttpRemote::new(&server.url("/debugger"), Duration::from_secs(5))
            .expect("remote");
        let vocabulary = remote.fetch_vocabulary().await.expect("tokens");
        assert_eq!(vocabulary.get("eos_token").map(String::as_str), Some("</s>"));
        tokens.assert_async().await;
    }

    #[tokio::test]
    async fn active_template_may_be_null() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/active-template");
                then.status(200).json_body(json!({"path": null}));
            })
            .await;

        assert_eq!(remote(&server).active_template().await.expect("hint"), None);
    }

    #[tokio::test]
    async fn render_posts_selection_and_reads_error() {
        let server = MockServer::start_async().await;
        let render = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/render").json_body(json!({
                    "filepath": "phi3.jinja",
                    "test_case": "tools",
                    "add_generation_prompt": false,
                    "add_system_prompt": true
                }));
                then.status(200)
                    .json_body(json!({"content": null, "error": "UndefinedError: 'tools'"}));
            })
            .await;

        let update = remote(&server)
            .render(&RenderRequest {
                filepath: "phi3.jinja".into(),
                test_case: "tools".into(),
                add_generation_prompt: false,
                add_system_prompt: true,
            })
            .await
            .expect("render");

        assert_eq!(update.into_result(), Err("UndefinedError: 'tools'".into()));
        render.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/files");
                then.status(503).body("warming up");
            })
            .await;

        let err = remote(&server).list_files().await.expect_err("503");
        assert!(matches!(
            err,
            RemoteError::Status { status: 503, ref body } if body == "warming up"
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/test-cases");
                then.status(200).body("{\"not\": \"a list\"}");
            })
            .await;

        let err = remote(&server).list_test_cases().await.expect_err("decode");
        assert!(matches!(err, RemoteError::Decode { .. }));
    }

    #[tokio::test]
    async fn subscribe_decodes_event_stream() {
        let server = MockServer::start_async().await;
        let events = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/events")
                    .header("accept", "text/event-stream");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(
                        ": keep-alive\n\n\
                         event: template_changed\ndata: {\"path\":\"a.jinja\"}\n\n\
                         event: ui_changed\ndata: {}\n\n",
                    );
            })
            .await;

        let stream = remote(&server).subscribe().await.expect("subscribe");
        let notifications: Vec<_> = stream
            .map(|item| item.expect("notification"))
            .collect()
            .await;

        assert_eq!(
            notifications,
            vec![
                Notification::TemplateChanged {
                    path: "a.jinja".into()
                },
                Notification::UiChanged,
            ]
        );
        events.assert_async().await;
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = HttpRemote::new("not a url", Duration::from_secs(1)).expect_err("invalid");
        assert!(matches!(err, RemoteError::Url(_)));
    }
}
