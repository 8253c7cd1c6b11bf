#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chatlens::application::remote::{NotificationStream, RemoteError, RemoteService};
use chatlens_api_types::{Notification, RenderRequest, RenderUpdate, TokenMap};
use tokio::sync::{Notify, mpsc};

/// In-process render service whose lists can be changed between calls and
/// whose renders can be held back per file.
#[derive(Default)]
pub struct ScriptedRemote {
    files: Mutex<Vec<String>>,
    test_cases: Mutex<Vec<String>>,
    tokens: Mutex<TokenMap>,
    active: Mutex<Option<String>>,
    offline: Mutex<bool>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<RenderRequest>>,
    render_count: AtomicUsize,
    subscriptions: AtomicUsize,
    streams: Mutex<Vec<NotificationStream>>,
}

impl ScriptedRemote {
    pub fn new(files: &[&str], test_cases: &[&str]) -> Arc<Self> {
        let remote = Self::default();
        remote.set_files(files);
        *remote.test_cases.lock().expect("lock") = strings(test_cases);
        Arc::new(remote)
    }

    pub fn set_files(&self, files: &[&str]) {
        *self.files.lock().expect("lock") = strings(files);
    }

    pub fn set_tokens(&self, tokens: &[(&str, &str)]) {
        *self.tokens.lock().expect("lock") = tokens
            .iter()
            .map(|(name, literal)| (name.to_string(), literal.to_string()))
            .collect();
    }

    pub fn set_active(&self, path: Option<&str>) {
        *self.active.lock().expect("lock") = path.map(str::to_string);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().expect("lock") = offline;
    }

    /// Hold back renders of `path` until [`ScriptedRemote::release`].
    pub fn hold(&self, path: &str) {
        self.gates
            .lock()
            .expect("lock")
            .insert(path.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.gates.lock().expect("lock").get(path) {
            gate.notify_one();
        }
    }

    /// Queue a notification stream for the next `subscribe` call. Streams are
    /// handed out in order; once exhausted, `subscribe` fails.
    pub fn queue_stream(&self) -> mpsc::UnboundedSender<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|notification| (Ok(notification), receiver))
        });
        self.streams.lock().expect("lock").push(Box::pin(stream));
        sender
    }

    /// Queue a stream that ends immediately.
    pub fn queue_closed_stream(&self) {
        let stream = futures::stream::empty::<Result<Notification, RemoteError>>();
        self.streams.lock().expect("lock").push(Box::pin(stream));
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if *self.offline.lock().expect("lock") {
            return Err(RemoteError::transport("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn list_files(&self) -> Result<Vec<String>, RemoteError> {
        self.check_online()?;
        Ok(self.files.lock().expect("lock").clone())
    }

    async fn list_test_cases(&self) -> Result<Vec<String>, RemoteError> {
        self.check_online()?;
        Ok(self.test_cases.lock().expect("lock").clone())
    }

    async fn fetch_vocabulary(&self) -> Result<TokenMap, RemoteError> {
        self.check_online()?;
        Ok(self.tokens.lock().expect("lock").clone())
    }

    async fn active_template(&self) -> Result<Option<String>, RemoteError> {
        self.check_online()?;
        Ok(self.active.lock().expect("lock").clone())
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderUpdate, RemoteError> {
        self.requests.lock().expect("lock").push(request.clone());
        let count = self.render_count.fetch_add(1, Ordering::SeqCst) + 1;

        let gate = self
            .gates
            .lock()
            .expect("lock")
            .get(&request.filepath)
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.check_online()?;
        if request.filepath.starts_with("broken") {
            return Ok(RenderUpdate::error(format!(
                "TemplateSyntaxError: {} line 1",
                request.filepath
            )));
        }
        Ok(RenderUpdate::content(format!(
            "<s>{}#{count} [{}]",
            request.filepath, request.test_case
        )))
    }

    async fn subscribe(&self) -> Result<NotificationStream, RemoteError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().expect("lock");
        if streams.is_empty() {
            return Err(RemoteError::StreamClosed);
        }
        Ok(streams.remove(0))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
