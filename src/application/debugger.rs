//! The debugger controller: owns the session, the render pipeline, and the
//! preference store, and runs the single-threaded event loop that ties them to
//! the remote service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chatlens_api_types::Notification;
use futures::StreamExt;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::pipeline::{RenderCompletion, RenderPipeline};
use crate::application::preferences::Preferences;
use crate::application::remote::{NotificationStream, RemoteError, RemoteService};
use crate::application::session::{FileListOutcome, RenderSession};
use crate::application::sync::{self, SyncAction};
use crate::domain::selection::RenderOption;
use crate::domain::vocabulary::TokenVocabulary;

const METRIC_FETCH_FAILURES: &str = "chatlens_fetch_failures_total";
const METRIC_NOTIFICATIONS: &str = "chatlens_notifications_total";

/// Presentation seam: called with the session after every state change.
pub trait SessionView {
    fn refresh(&mut self, session: &RenderSession);
}

pub struct Debugger {
    remote: Arc<dyn RemoteService>,
    preferences: Preferences,
    session: RenderSession,
    pipeline: RenderPipeline,
    completions: mpsc::UnboundedReceiver<RenderCompletion>,
    reconnect_delay: Duration,
}

impl Debugger {
    /// Build a debugger whose session is rehydrated from `preferences`.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        preferences: Preferences,
        reconnect_delay: Duration,
    ) -> Self {
        let (sender, completions) = mpsc::unbounded_channel();
        let session = RenderSession::restore(
            preferences.load_selection(),
            preferences.load_vocabulary(),
        );

        Self {
            pipeline: RenderPipeline::new(Arc::clone(&remote), sender),
            remote,
            preferences,
            session,
            completions,
            reconnect_delay,
        }
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Fetch everything the session needs, concurrently, then issue the
    /// initial render if a file is selected.
    pub async fn start(&mut self) {
        let remote = Arc::clone(&self.remote);
        let (files, test_cases, vocabulary, active) = tokio::join!(
            remote.list_files(),
            remote.list_test_cases(),
            remote.fetch_vocabulary(),
            remote.active_template()
        );

        let files_known = match settled("files", files) {
            Some(files) => {
                self.apply_file_list(files);
                true
            }
            None => false,
        };
        if let Some(test_cases) = settled("test_cases", test_cases) {
            self.apply_test_cases(test_cases);
        }
        if let Some(vocabulary) = settled("vocabulary", vocabulary) {
            self.apply_vocabulary(vocabulary.into());
        }
        // An unlisted hint is only trusted when the file list is unavailable.
        let hint = settled("active_template", active)
            .flatten()
            .filter(|path| !files_known || self.session.files().contains(path));
        if let Some(path) = hint.filter(|_| self.session.current_file().is_none()) {
            info!(
                target = "chatlens::debugger",
                path = %path,
                "opening active template"
            );
            self.session.select_file(path.as_str());
            self.preferences.save_current_file(Some(&path));
        }

        info!(
            target = "chatlens::debugger",
            files = self.session.files().len(),
            test_cases = self.session.test_cases().len(),
            tokens = self.session.vocabulary().len(),
            current_file = self.session.current_file().unwrap_or(""),
            "session started"
        );

        self.rerender();
    }

    pub fn open_file(&mut self, path: &str) {
        let request = self.session.select_file(path);
        self.preferences.save_current_file(Some(path));
        if let Some(request) = request {
            self.pipeline.dispatch(request);
        }
    }

    pub fn select_test_case(&mut self, name: &str) {
        let request = self.session.select_test_case(name);
        self.preferences.save_test_case(name);
        if let Some(request) = request {
            self.pipeline.dispatch(request);
        }
    }

    pub fn set_option(&mut self, option: RenderOption, value: bool) {
        let request = self.session.set_option(option, value);
        self.preferences.save_option(option, value);
        if let Some(request) = request {
            self.pipeline.dispatch(request);
        }
    }

    pub fn navigate_to_file_list(&mut self) {
        self.session.navigate_to_file_list();
    }

    /// Execute the sync plan for `notification`.
    pub async fn handle_notification(&mut self, notification: &Notification) {
        let kind = notification.event_name();
        counter!(METRIC_NOTIFICATIONS, "kind" => kind).increment(1);

        let plan = sync::plan(notification, &self.session);
        if plan.is_empty() {
            debug!(
                target = "chatlens::sync",
                kind,
                current_file = self.session.current_file().unwrap_or(""),
                "notification does not apply, dropped"
            );
            return;
        }
        debug!(
            target = "chatlens::sync",
            kind,
            actions = ?plan.actions(),
            "notification planned"
        );

        for action in plan {
            match action {
                SyncAction::Rerender => self.rerender(),
                SyncAction::RefreshFileList => {
                    if let Some(files) = settled("files", self.remote.list_files().await) {
                        self.apply_file_list(files);
                    }
                }
                SyncAction::RefreshVocabulary => {
                    let fetched = self.remote.fetch_vocabulary().await;
                    if let Some(vocabulary) = settled("vocabulary", fetched) {
                        self.apply_vocabulary(vocabulary.into());
                    }
                }
                SyncAction::RefreshTestCases => {
                    let fetched = self.remote.list_test_cases().await;
                    if let Some(test_cases) = settled("test_cases", fetched) {
                        self.apply_test_cases(test_cases);
                    }
                }
                SyncAction::Reload => self.reload().await,
            }
        }
    }

    /// Apply a render completion. Returns whether the displayed result changed.
    pub fn handle_completion(&mut self, completion: RenderCompletion) -> bool {
        match self.pipeline.accept(completion) {
            Some(result) => {
                self.session.apply_result(result);
                true
            }
            None => false,
        }
    }

    /// Wait for the next render completion.
    pub async fn next_completion(&mut self) -> Option<RenderCompletion> {
        self.completions.recv().await
    }

    /// Throw away the in-memory session, rebuild it from durable state, and
    /// rerun startup. In-flight renders are invalidated.
    pub async fn reload(&mut self) {
        info!(target = "chatlens::debugger", "reloading session");
        self.pipeline.invalidate();
        self.session = RenderSession::restore(
            self.preferences.load_selection(),
            self.preferences.load_vocabulary(),
        );
        self.start().await;
    }

    /// Run the event loop until `shutdown` resolves.
    ///
    /// The notification stream is resubscribed after `reconnect_delay`
    /// whenever it fails or ends.
    pub async fn run<V, F>(&mut self, view: &mut V, shutdown: F)
    where
        V: SessionView,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.start().await;
        view.refresh(&self.session);
        let mut notifications = self.subscribe().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(target = "chatlens::debugger", "shutdown requested");
                    break;
                }
                Some(completion) = self.completions.recv() => {
                    if self.handle_completion(completion) {
                        view.refresh(&self.session);
                    }
                }
                incoming = next_incoming(&mut notifications, self.reconnect_delay) => {
                    match incoming {
                        Incoming::Notification(notification) => {
                            self.handle_notification(&notification).await;
                            view.refresh(&self.session);
                        }
                        Incoming::Failed(err) => {
                            counter!(METRIC_FETCH_FAILURES, "resource" => "events").increment(1);
                            warn!(
                                target = "chatlens::debugger",
                                error = %err,
                                "notification stream failed"
                            );
                            notifications = None;
                        }
                        Incoming::Closed => {
                            warn!(
                                target = "chatlens::debugger",
                                "notification stream ended"
                            );
                            notifications = None;
                        }
                        Incoming::Retry => {
                            notifications = self.subscribe().await;
                        }
                    }
                }
            }
        }
    }

    async fn subscribe(&self) -> Option<NotificationStream> {
        let stream = settled("events", self.remote.subscribe().await)?;
        info!(target = "chatlens::debugger", "subscribed to notifications");
        Some(stream)
    }

    fn rerender(&mut self) {
        if let Some(request) = self.session.render_request() {
            self.pipeline.dispatch(request);
        }
    }

    fn apply_file_list(&mut self, files: Vec<String>) {
        let previous = self.session.current_file().map(str::to_string);
        if self.session.replace_file_list(files) == FileListOutcome::Evicted {
            info!(
                target = "chatlens::debugger",
                path = previous.as_deref().unwrap_or(""),
                "open file disappeared, returning to file list"
            );
            self.pipeline.invalidate();
            self.preferences.save_current_file(None);
        }
    }

    fn apply_test_cases(&mut self, test_cases: Vec<String>) {
        if let Some(active) = self.session.replace_test_case_list(test_cases) {
            debug!(
                target = "chatlens::debugger",
                test_case = %active,
                "active test case no longer listed, falling back"
            );
            self.preferences.save_test_case(&active);
        }
    }

    fn apply_vocabulary(&mut self, vocabulary: TokenVocabulary) {
        self.preferences.save_vocabulary(&vocabulary);
        self.session.replace_vocabulary(vocabulary);
    }
}

enum Incoming {
    Notification(Notification),
    Failed(RemoteError),
    Closed,
    Retry,
}

async fn next_incoming(stream: &mut Option<NotificationStream>, delay: Duration) -> Incoming {
    match stream {
        Some(stream) => match stream.next().await {
            Some(Ok(notification)) => Incoming::Notification(notification),
            Some(Err(err)) => Incoming::Failed(err),
            None => Incoming::Closed,
        },
        None => {
            tokio::time::sleep(delay).await;
            Incoming::Retry
        }
    }
}

/// Log and count a failed fetch; failures leave state untouched.
fn settled<T>(resource: &'static str, result: Result<T, RemoteError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            counter!(METRIC_FETCH_FAILURES, "resource" => resource).increment(1);
            warn!(
                target = "chatlens::debugger",
                resource,
                error = %err,
                "fetch failed"
            );
            None
        }
    }
}
