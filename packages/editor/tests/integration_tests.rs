//! Integration tests for the edit session

use hierarchy_document::{encode, ROOT_LIBRARY_ID};
use hierarchy_editor::{
    ActionCapability, ChannelStatus, Clock, CountingCommand, DispatchOutcome, DocumentPort,
    EditSession, EditorError, HostError, ImportOutcome, LibraryChanges, LockState, Mutation,
    NavigationPort, NavigationState, RequestOutcome, SessionConfig, DEFAULT_TITLE,
    SAVE_BEFORE_NAVIGATING,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const OWNER: &str = "owner@acme.test";
const THREE_LEVELS: &str = include_str!("fixtures/three_levels.bpmn");

struct TestHost {
    published: Vec<String>,
    save: CountingCommand,
    fail_publish: bool,
    status: ChannelStatus,
    targets: Vec<String>,
    enter: CountingCommand,
}

impl Default for TestHost {
    fn default() -> Self {
        Self {
            published: Vec::new(),
            save: CountingCommand::enabled(),
            fail_publish: false,
            status: ChannelStatus::Available,
            targets: Vec::new(),
            enter: CountingCommand::enabled(),
        }
    }
}

impl DocumentPort for TestHost {
    fn publish(&mut self, document: &str) -> Result<(), HostError> {
        if self.fail_publish {
            return Err(HostError::new("host is offline"));
        }
        self.published.push(document.to_string());
        Ok(())
    }

    fn save_requested(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.save)
    }
}

impl NavigationPort for TestHost {
    fn channel_status(&self) -> ChannelStatus {
        self.status
    }

    fn write_target(&mut self, library_id: &str) -> bool {
        self.targets.push(library_id.to_string());
        true
    }

    fn library_clicked(&mut self) -> ActionCapability<'_> {
        ActionCapability::check(&mut self.enter)
    }
}

#[derive(Clone, Default)]
struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    fn advance(&self, millis: u64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::SeqCst))
    }
}

fn editable(document: Option<&str>) -> EditSession<TestHost> {
    let mut session = EditSession::init(SessionConfig::default(), TestHost::default(), document, None);
    session.on_lock_changed(LockState::owned_by(OWNER), false);
    session
}

fn rename(node_id: &str, name: &str) -> Mutation {
    Mutation::UpdateLibrary {
        node_id: node_id.to_string(),
        changes: LibraryChanges {
            name: Some(name.to_string()),
            library_name: Some(name.to_string()),
            ..Default::default()
        },
    }
}

#[test]
fn test_absent_document_yields_single_default_root() {
    let session = EditSession::init(SessionConfig::default(), TestHost::default(), None, None);

    let tree = session.tree();
    assert_eq!(tree.len(), 1);
    let root = tree.root().unwrap();
    assert_eq!(root.id, ROOT_LIBRARY_ID);
    assert_eq!(root.name, "Framework Root");
    assert!(session.is_default_tree());
    assert!(!session.is_dirty());
    assert_eq!(session.display_title(), DEFAULT_TITLE);
}

#[test]
fn test_name_hint_names_root_until_a_document_exists() {
    let mut session =
        EditSession::init(SessionConfig::default(), TestHost::default(), Some(""), Some("Acme"));
    assert_eq!(session.tree().root().unwrap().name, "Acme");

    assert!(session.on_name_hint_changed(Some("Acme Controls")));
    let root = session.tree().root().unwrap();
    assert_eq!(root.name, "Acme Controls");
    assert_eq!(root.attributes.library_name, "Acme Controls");
    assert!(!session.is_dirty());

    assert_eq!(
        session.on_external_document_changed(Some(THREE_LEVELS)),
        ImportOutcome::Imported
    );
    assert!(!session.on_name_hint_changed(Some("Something Else")));
    assert_eq!(session.tree().root().unwrap().name, "Acme Controls");
    assert_eq!(session.display_title(), "Something Else");
}

#[test]
fn test_session_starts_read_only() {
    let mut session = EditSession::init(SessionConfig::default(), TestHost::default(), None, None);
    assert!(!session.is_editable());
    assert!(matches!(
        session.apply(&rename(ROOT_LIBRARY_ID, "X")),
        Err(EditorError::ReadOnly)
    ));
    assert!(matches!(session.save(), Err(EditorError::ReadOnly)));
    assert!(session.host().published.is_empty());
}

#[test]
fn test_lock_loss_refuses_undo_without_state_change() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_core", "Kernel")).unwrap();

    let generation = session.binding_generation();
    assert!(session.on_lock_changed(LockState::loaded(Some(OWNER), Some("other@acme.test")), false));
    assert_eq!(session.binding_generation(), generation + 1);

    assert!(matches!(session.undo(), Err(EditorError::ReadOnly)));
    assert_eq!(session.tree().node("lib_core").unwrap().name, "Kernel");
    assert!(session.history().can_undo());
}

#[test]
fn test_read_only_flag_overrides_ownership() {
    let mut session = editable(None);
    assert!(session.is_editable());
    session.on_lock_changed(LockState::owned_by(OWNER), true);
    assert!(!session.is_editable());
}

#[test]
fn test_two_parents_block_save_and_publish_nothing() {
    let mut session = editable(Some(THREE_LEVELS));
    let tree = session.tree();
    let second_parent = Mutation::connect(tree, ROOT_LIBRARY_ID, "lib_ui", 1);
    session.apply(&second_parent).unwrap();

    let err = session.save().unwrap_err();
    assert_eq!(
        err.violations(),
        ["A library must not have more than one parent library.".to_string()]
    );
    assert!(session.host().published.is_empty());
    assert_eq!(session.host().save.executions, 0);
    assert!(session.is_dirty());
    assert_eq!(session.notices().len(), 1);

    // Rewiring fixes it without losing anything.
    session.undo().unwrap();
    session.save().unwrap();
    assert_eq!(session.host().published.len(), 1);
}

#[test]
fn test_save_publishes_then_executes_and_suppresses_echo() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_data", "Storage")).unwrap();
    assert!(session.is_dirty());

    session.save().unwrap();
    assert!(!session.is_dirty());
    assert_eq!(session.host().save.executions, 1);

    let published = session.host().published[0].clone();
    assert_eq!(published, encode(session.tree()).unwrap());
    assert!(published.contains("library:libraryName=\"Storage\""));

    // The host echoes our own value back.
    assert_eq!(
        session.on_external_document_changed(Some(&published)),
        ImportOutcome::Unchanged
    );
    assert!(session.history().can_undo());
}

#[test]
fn test_unavailable_save_command_publishes_nothing() {
    let mut session = editable(Some(THREE_LEVELS));
    session.host_mut().save.enabled = false;
    session.apply(&rename("lib_data", "Storage")).unwrap();

    assert!(matches!(session.save(), Err(EditorError::Persistence(_))));
    assert!(session.host().published.is_empty());
    assert!(session.is_dirty());
}

#[test]
fn test_publish_failure_leaves_history_for_retry() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_data", "Storage")).unwrap();
    session.host_mut().fail_publish = true;

    let err = session.save().unwrap_err();
    assert!(matches!(err, EditorError::Persistence(ref message) if message == "host is offline"));
    assert!(session.is_dirty());
    assert_eq!(session.history().undo_levels(), 1);

    session.host_mut().fail_publish = false;
    session.save().unwrap();
    assert!(!session.is_dirty());
}

#[test]
fn test_malformed_document_keeps_last_good_tree() {
    let mut session = editable(Some(THREE_LEVELS));
    let before = session.tree().clone();

    let outcome = session.on_external_document_changed(Some("<bpmn:definitions><oops>"));
    assert!(matches!(outcome, ImportOutcome::Rejected { .. }));
    assert_eq!(session.tree(), &before);
    assert_eq!(session.notices().len(), 1);

    // The same bad value is not retried.
    assert_eq!(
        session.on_external_document_changed(Some("<bpmn:definitions><oops>")),
        ImportOutcome::Unchanged
    );
}

#[test]
fn test_external_change_replaces_tree_and_resets_history() {
    let mut session = editable(None);
    let create = Mutation::create_library(session.tree(), 0.0, 200.0, 7);
    session.apply(&create).unwrap();
    assert!(session.is_dirty());

    assert_eq!(
        session.on_external_document_changed(Some(THREE_LEVELS)),
        ImportOutcome::Imported
    );
    assert_eq!(session.tree().len(), 4);
    assert!(!session.is_dirty());
    assert!(!session.history().can_undo());
}

#[test]
fn test_navigation_refused_while_dirty() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_data", "Storage")).unwrap();

    assert_eq!(
        session.library_activated("lib_core").unwrap(),
        RequestOutcome::Refused
    );
    assert_eq!(session.navigation_state(), &NavigationState::Idle);
    assert!(session.host().targets.is_empty());
    assert_eq!(session.notices()[0].message, SAVE_BEFORE_NAVIGATING);
}

#[test]
fn test_navigation_refused_after_new_edit_on_undone_save() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_data", "Storage")).unwrap();
    session.apply(&rename("lib_data", "Archive")).unwrap();
    session.save().unwrap();

    session.undo().unwrap();
    session.apply(&rename("lib_data", "Vault")).unwrap();
    assert!(session.is_dirty());

    assert_eq!(
        session.library_activated("lib_core").unwrap(),
        RequestOutcome::Refused
    );
    assert!(session.host().targets.is_empty());
    assert_eq!(session.host().enter.executions, 0);
}

#[test]
fn test_navigation_refused_inside_open_batch() {
    let mut session = editable(Some(THREE_LEVELS));
    session.begin_batch("Rename").unwrap();
    session.apply(&rename("lib_data", "Storage")).unwrap();
    assert!(session.is_dirty());

    assert_eq!(
        session.library_activated("root").unwrap(),
        RequestOutcome::Refused
    );
    assert_eq!(session.navigation_state(), &NavigationState::Idle);
    assert!(session.host().targets.is_empty());
    assert_eq!(session.host().enter.executions, 0);
}

#[test]
fn test_abort_batch_reverts_its_edits() {
    let mut session = editable(Some(THREE_LEVELS));
    let before = session.tree().clone();

    session.begin_batch("Rename").unwrap();
    session.apply(&rename("lib_data", "Storage")).unwrap();
    session.apply(&rename("lib_core", "Kernel")).unwrap();

    assert!(session.abort_batch().unwrap());
    assert_eq!(session.tree(), &before);
    assert!(!session.is_dirty());
    assert!(!session.history().can_undo());
    assert!(!session.abort_batch().unwrap());
}

#[test]
fn test_cancel_pending_navigation() {
    let mut session = editable(Some(THREE_LEVELS));
    session.host_mut().status = ChannelStatus::Loading;
    session.library_activated("lib_core").unwrap();

    assert_eq!(session.cancel_navigation().as_deref(), Some("lib_core"));
    assert_eq!(session.navigation_state(), &NavigationState::Idle);
    assert_eq!(session.cancel_navigation(), None);
}

#[test]
fn test_navigation_waits_for_channel() {
    let mut session = editable(Some(THREE_LEVELS));
    session.host_mut().status = ChannelStatus::Loading;

    assert_eq!(
        session.library_activated("lib_core").unwrap(),
        RequestOutcome::Pending { replaced: None }
    );
    assert_eq!(
        session.navigation_state(),
        &NavigationState::AwaitingChannel {
            target_id: "lib_core".to_string()
        }
    );
    assert!(session.host().targets.is_empty());

    session.host_mut().status = ChannelStatus::Available;
    assert_eq!(
        session.on_channel_ready(),
        DispatchOutcome::Dispatched {
            target_id: "lib_core".to_string(),
            executed: true,
        }
    );
    assert_eq!(session.on_channel_ready(), DispatchOutcome::Idle);
    assert_eq!(session.host().targets, vec!["lib_core".to_string()]);
    assert_eq!(session.host().enter.executions, 1);

    assert!(session.settle_navigation());
    assert_eq!(session.navigation_state(), &NavigationState::Idle);
}

#[test]
fn test_read_only_viewer_may_navigate() {
    let mut session = EditSession::init(
        SessionConfig::default(),
        TestHost::default(),
        Some(THREE_LEVELS),
        None,
    );
    let outcome = session.library_activated("lib_ui").unwrap();
    assert_eq!(outcome, RequestOutcome::Pending { replaced: None });
    assert_eq!(session.host().enter.executions, 1);
}

#[test]
fn test_unknown_library_cannot_be_activated() {
    let mut session = editable(Some(THREE_LEVELS));
    assert!(matches!(
        session.library_activated("lib_missing"),
        Err(EditorError::Mutation(_))
    ));
}

#[test]
fn test_auto_save_publishes_every_edit() {
    let config = SessionConfig::default().with_auto_save(true);
    let mut session = EditSession::init(config, TestHost::default(), Some(THREE_LEVELS), None);
    session.on_lock_changed(LockState::owned_by(OWNER), false);

    session.apply(&rename("lib_data", "Storage")).unwrap();
    session.apply(&rename("lib_ui", "Widgets")).unwrap();
    assert_eq!(session.host().published.len(), 2);
    assert!(!session.is_dirty());

    session.undo().unwrap();
    assert_eq!(session.host().published.len(), 3);
}

#[test]
fn test_auto_save_waits_for_batch_end() {
    let config = SessionConfig::default().with_auto_save(true);
    let mut session = EditSession::init(config, TestHost::default(), Some(THREE_LEVELS), None);
    session.on_lock_changed(LockState::owned_by(OWNER), false);

    session.begin_batch("Rename two").unwrap();
    session.apply(&rename("lib_data", "Storage")).unwrap();
    session.apply(&rename("lib_ui", "Widgets")).unwrap();
    assert!(session.host().published.is_empty());

    session.end_batch();
    assert_eq!(session.host().published.len(), 1);
    assert_eq!(session.history().undo_levels(), 1);
}

#[test]
fn test_save_after_partial_undo_keeps_redo() {
    let mut session = editable(Some(THREE_LEVELS));
    session.apply(&rename("lib_data", "One")).unwrap();
    session.apply(&rename("lib_data", "Two")).unwrap();
    session.undo().unwrap();

    session.save().unwrap();
    assert!(!session.is_dirty());
    assert!(session.history().can_redo());

    session.redo().unwrap();
    assert_eq!(session.tree().node("lib_data").unwrap().name, "Two");
}

#[test]
fn test_notices_expire_and_can_be_dismissed() {
    let clock = ManualClock::default();
    let mut session = EditSession::with_clock(
        SessionConfig::default(),
        TestHost::default(),
        None,
        None,
        Box::new(clock.clone()),
    );
    session.on_lock_changed(LockState::owned_by(OWNER), false);
    session.on_external_document_changed(Some("not a document"));
    session.on_external_document_changed(Some("still not a document"));
    assert_eq!(session.notices().len(), 2);

    let first = session.notices()[0].id;
    assert!(session.dismiss_notice(first));
    assert_eq!(session.next_notice_in(), Some(Duration::from_millis(4000)));

    clock.advance(3999);
    assert_eq!(session.expire_notices(), 0);
    clock.advance(1);
    assert_eq!(session.expire_notices(), 1);
    assert!(session.notices().is_empty());
}

#[test]
fn test_export_uses_framework_name() {
    let mut session = editable(Some(THREE_LEVELS));
    session.on_name_hint_changed(Some("Acme  Controls"));

    let blob = session.export().unwrap();
    assert_eq!(blob.file_name(), "Acme_Controls_Library_Hierarchy.bpmn");
    assert_eq!(blob.mime_type, "application/bpmn+xml");
    assert_eq!(blob.contents, encode(session.tree()).unwrap());
}

#[test]
fn test_dispose_returns_host() {
    let mut session = editable(None);
    session.save().unwrap();
    let host = session.dispose();
    assert_eq!(host.published.len(), 1);
}
