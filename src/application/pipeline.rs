//! Render request pipeline.
//!
//! Each outgoing request gets a sequence number from a monotonically
//! increasing counter. Responses travel back through a channel tagged with
//! that number, and only the response to the most recently issued request is
//! accepted. Earlier responses that arrive late are dropped, so a slow render
//! of an older selection can never overwrite a newer one.

use std::sync::Arc;

use chatlens_api_types::{RenderRequest, RenderUpdate};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::remote::{RemoteError, RemoteService};
use crate::domain::segment::RenderResult;

const METRIC_RENDER_REQUESTS: &str = "chatlens_render_requests_total";
const METRIC_RENDER_STALE: &str = "chatlens_render_stale_total";
const METRIC_FETCH_FAILURES: &str = "chatlens_fetch_failures_total";

/// Sequence number attached to a render request.
pub type RenderSeq = u64;

/// A finished render round trip, delivered back to the event loop.
#[derive(Debug)]
pub struct RenderCompletion {
    pub seq: RenderSeq,
    pub request: RenderRequest,
    pub outcome: Result<RenderUpdate, RemoteError>,
}

pub struct RenderPipeline {
    remote: Arc<dyn RemoteService>,
    completions: mpsc::UnboundedSender<RenderCompletion>,
    latest: RenderSeq,
}

impl RenderPipeline {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        completions: mpsc::UnboundedSender<RenderCompletion>,
    ) -> Self {
        Self {
            remote,
            completions,
            latest: 0,
        }
    }

    /// Highest sequence number issued so far (0 before the first request).
    pub fn latest(&self) -> RenderSeq {
        self.latest
    }

    /// Claim the next sequence number. Everything issued earlier becomes stale.
    pub fn issue(&mut self) -> RenderSeq {
        self.latest += 1;
        self.latest
    }

    /// Mark every in-flight request stale without sending a new one.
    pub fn invalidate(&mut self) {
        self.issue();
    }

    /// Send `request` in the background and return its sequence number.
    /// The completion arrives on the pipeline's channel.
    pub fn dispatch(&mut self, request: RenderRequest) -> RenderSeq {
        let seq = self.issue();
        counter!(METRIC_RENDER_REQUESTS).increment(1);
        debug!(
            target = "chatlens::pipeline",
            seq,
            filepath = %request.filepath,
            test_case = %request.test_case,
            "render requested"
        );

        let remote = Arc::clone(&self.remote);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = remote.render(&request).await;
            // A closed channel means the event loop is gone; nothing to deliver to.
            let _ = completions.send(RenderCompletion {
                seq,
                request,
                outcome,
            });
        });

        seq
    }

    /// Result to display for `completion`, or `None` when it is stale or the
    /// round trip itself failed.
    pub fn accept(&self, completion: RenderCompletion) -> Option<RenderResult> {
        let RenderCompletion {
            seq,
            request,
            outcome,
        } = completion;

        if seq != self.latest {
            counter!(METRIC_RENDER_STALE).increment(1);
            debug!(
                target = "chatlens::pipeline",
                seq,
                latest = self.latest,
                filepath = %request.filepath,
                "dropping stale render response"
            );
            return None;
        }

        match outcome {
            Ok(update) => Some(RenderResult::from(update)),
            Err(err) => {
                counter!(METRIC_FETCH_FAILURES, "resource" => "render").increment(1);
                warn!(
                    target = "chatlens::pipeline",
                    seq,
                    filepath = %request.filepath,
                    error = %err,
                    "render request failed"
                );
                None
            }
        }
    }
}
