mod support;

use std::collections::HashSet;
use std::time::Duration;

use chatlens::application::debugger::Debugger;
use chatlens::application::preferences::Preferences;
use chatlens::infra::store::MemoryStore;
use chatlens_api_types::Notification;
use metrics_util::debugging::DebuggingRecorder;
use support::ScriptedRemote;

#[tokio::test]
async fn debugger_records_render_and_sync_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let remote = ScriptedRemote::new(&["a.jinja"], &["basic", "tools"]);
    let mut debugger = Debugger::new(
        remote.clone(),
        Preferences::new(Box::new(MemoryStore::default())),
        Duration::from_millis(10),
    );
    debugger.start().await;

    // Two renders in a row: the first one to come back is stale.
    debugger.open_file("a.jinja");
    debugger.select_test_case("tools");
    for _ in 0..2 {
        let completion = debugger.next_completion().await.expect("completion");
        debugger.handle_completion(completion);
    }

    debugger
        .handle_notification(&Notification::TemplateChanged {
            path: "other.jinja".into(),
        })
        .await;

    remote.set_offline(true);
    debugger
        .handle_notification(&Notification::TemplateListChanged)
        .await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "chatlens_render_requests_total",
        "chatlens_render_stale_total",
        "chatlens_notifications_total",
        "chatlens_fetch_failures_total",
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}
