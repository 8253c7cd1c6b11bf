//! Reactions to push notifications.
//!
//! Each notification kind maps to an independent handler that inspects the
//! current session and returns the work to do. The handlers never touch the
//! network themselves; the debugger executes the plan.

use chatlens_api_types::Notification;

use crate::application::session::RenderSession;

/// Single step of a [`SyncPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Re-issue the render request for the current selection.
    Rerender,
    RefreshFileList,
    RefreshVocabulary,
    RefreshTestCases,
    /// Rebuild the session from durable state and rerun startup.
    Reload,
}

/// Ordered list of actions produced for one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    actions: Vec<SyncAction>,
}

impl SyncPlan {
    fn of(actions: impl IntoIterator<Item = SyncAction>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }

    pub fn ignore() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl IntoIterator for SyncPlan {
    type Item = SyncAction;
    type IntoIter = std::vec::IntoIter<SyncAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

/// Decide how to react to `notification` given the current session.
pub fn plan(notification: &Notification, session: &RenderSession) -> SyncPlan {
    match notification {
        Notification::TemplateChanged { path } => on_template_changed(path, session),
        Notification::TemplateListChanged => on_template_list_changed(),
        Notification::VocabularyChanged => on_vocabulary_changed(session),
        Notification::UiChanged => on_ui_changed(),
    }
}

pub fn on_template_changed(path: &str, session: &RenderSession) -> SyncPlan {
    if session.current_file() == Some(path) {
        SyncPlan::of([SyncAction::Rerender])
    } else {
        SyncPlan::ignore()
    }
}

/// Eviction of a vanished current file happens when the refreshed list is
/// applied to the session.
pub fn on_template_list_changed() -> SyncPlan {
    SyncPlan::of([SyncAction::RefreshFileList])
}

pub fn on_vocabulary_changed(session: &RenderSession) -> SyncPlan {
    let mut actions = vec![SyncAction::RefreshVocabulary, SyncAction::RefreshTestCases];
    if session.current_file().is_some() {
        actions.push(SyncAction::Rerender);
    }
    SyncPlan::of(actions)
}

pub fn on_ui_changed() -> SyncPlan {
    SyncPlan::of([SyncAction::Reload])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(file: Option<&str>) -> RenderSession {
        let mut session = RenderSession::default();
        if let Some(file) = file {
            session.select_file(file);
        }
        session
    }

    fn changed(path: &str) -> Notification {
        Notification::TemplateChanged { path: path.into() }
    }

    #[test]
    fn edit_of_open_file_rerenders() {
        let session = session_with(Some("mistral.jinja"));
        assert_eq!(
            plan(&changed("mistral.jinja"), &session).actions(),
            &[SyncAction::Rerender]
        );
    }

    #[test]
    fn edit_of_other_file_is_dropped() {
        let session = session_with(Some("mistral.jinja"));
        assert!(plan(&changed("llama.jinja"), &session).is_empty());

        let nothing_open = session_with(None);
        assert!(plan(&changed("mistral.jinja"), &nothing_open).is_empty());
    }

    #[test]
    fn list_change_always_refreshes_files() {
        for file in [None, Some("a.jinja")] {
            let session = session_with(file);
            assert_eq!(
                plan(&Notification::TemplateListChanged, &session).actions(),
                &[SyncAction::RefreshFileList]
            );
        }
    }

    #[test]
    fn vocabulary_change_rerenders_only_with_open_file() {
        let open = session_with(Some("a.jinja"));
        assert_eq!(
            plan(&Notification::VocabularyChanged, &open).actions(),
            &[
                SyncAction::RefreshVocabulary,
                SyncAction::RefreshTestCases,
                SyncAction::Rerender
            ]
        );

        let closed = session_with(None);
        assert_eq!(
            plan(&Notification::VocabularyChanged, &closed).actions(),
            &[SyncAction::RefreshVocabulary, SyncAction::RefreshTestCases]
        );
    }

    #[test]
    fn ui_change_reloads_unconditionally() {
        for file in [None, Some("a.jinja")] {
            let session = session_with(file);
            assert_eq!(
                plan(&Notification::UiChanged, &session).actions(),
                &[SyncAction::Reload]
            );
        }
    }

    #[test]
    fn planning_records_nothing() {
        let recorder = metrics_util::debugging::DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let session = session_with(Some("a.jinja"));

        let planned = metrics::with_local_recorder(&recorder, || {
            plan(&Notification::VocabularyChanged, &session)
        });

        assert!(!planned.is_empty());
        assert!(snapshotter.snapshot().into_vec().is_empty());
    }

    #[test]
    fn planning_is_idempotent() {
        let session = session_with(Some("a.jinja"));
        let first = plan(&Notification::VocabularyChanged, &session);
        let second = plan(&Notification::VocabularyChanged, &session);
        assert_eq!(first, second);
    }
}
