//! Schema and data refactorings scheduled on the thread session.

use transidb_core::CoreError;
use transidb_storage::PersistentStore;
use transidb_testkit::prelude::*;

#[test]
fn refactorings_need_a_thread_session() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    session.commit().unwrap();
    let id = project.persistent_id().unwrap();

    assert!(matches!(
        ts.rename_entity_type_refactoring("Project", "Product"),
        Err(CoreError::NoThreadSession)
    ));
    assert!(matches!(
        ts.delete_entity_type_refactoring("Project"),
        Err(CoreError::NoThreadSession)
    ));
    assert!(matches!(
        ts.delete_entity_refactoring(id),
        Err(CoreError::NoThreadSession)
    ));
    assert!(matches!(
        ts.delete_links_refactoring(id, "issues"),
        Err(CoreError::NoThreadSession)
    ));
    assert!(matches!(
        ts.delete_link_refactoring(id, "issues", id),
        Err(CoreError::NoThreadSession)
    ));
}

#[test]
fn rename_applies_on_commit() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    create_project(&session, "core").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.rename_entity_type_refactoring("Project", "Product").unwrap();
    assert!(session.has_changes());
    assert!(ts.entity_type_exists("Project"));
    assert!(!ts.entity_type_exists("Product"));

    session.commit().unwrap();
    assert!(!ts.entity_type_exists("Project"));
    assert!(ts.entity_type_exists("Product"));
    assert_eq!(ts.memory.entities_of_type("Product").unwrap().len(), 1);
}

#[test]
fn aborted_rename_is_discarded() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    create_project(&session, "core").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.rename_entity_type_refactoring("Project", "Product").unwrap();
    session.abort().unwrap();

    assert!(ts.entity_type_exists("Project"));
    assert!(!ts.entity_type_exists("Product"));
}

#[test]
fn failing_refactoring_aborts_the_whole_flush() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    create_project(&session, "core").unwrap();
    ts.rename_entity_type_refactoring("Missing", "Other").unwrap();

    assert!(matches!(session.flush(), Err(CoreError::Storage(_))));
    assert_eq!(ts.memory.entity_count(), 0);
    assert_eq!(ts.memory.commit_count(), 0);
    session.abort().unwrap();
}

#[test]
fn delete_entity_type_drops_its_entities() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    create_user(&session, "alice").unwrap();
    create_user(&session, "bob").unwrap();
    create_project(&session, "core").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_entity_type_refactoring("User").unwrap();
    session.commit().unwrap();

    assert!(!ts.entity_type_exists("User"));
    assert_eq!(ts.memory.entity_count(), 1);
}

#[test]
fn delete_raw_persistent_entity() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let user = create_user(&session, "alice").unwrap();
    session.commit().unwrap();
    let id = user.persistent_id().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_entity_refactoring(id).unwrap();
    assert!(ts.memory.entity_exists(id).unwrap());
    session.commit().unwrap();
    assert!(!ts.memory.entity_exists(id).unwrap());
}

#[test]
fn delete_transient_entity_cascades() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    let issue = create_issue(&session, &ts.links, &project, "bug").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_entity_refactoring(&project).unwrap();
    assert!(session.is_removed(&issue).unwrap());
    session.commit().unwrap();
    assert_eq!(ts.memory.entity_count(), 0);
}

#[test]
fn unsaved_entities_cannot_be_unwrapped() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "draft").unwrap();

    assert!(matches!(
        ts.delete_links_refactoring(&project, "issues"),
        Err(CoreError::CannotUnwrap { .. })
    ));
    assert!(matches!(
        ts.delete_link_refactoring(&project, "issues", &project),
        Err(CoreError::CannotUnwrap { .. })
    ));
}

#[test]
fn delete_link_refactorings_work_on_raw_links() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    let first = create_issue(&session, &ts.links, &project, "first").unwrap();
    let second = create_issue(&session, &ts.links, &project, "second").unwrap();
    session.commit().unwrap();
    let project_id = project.persistent_id().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_link_refactoring(&project, "issues", &first).unwrap();
    session.commit().unwrap();
    assert_eq!(
        ts.memory.get_links(project_id, "issues").unwrap(),
        vec![second.persistent_id().unwrap()]
    );

    let session = ts.begin_session().unwrap();
    ts.delete_links_refactoring(project_id, "issues").unwrap();
    session.commit().unwrap();
    assert!(ts.memory.get_links(project_id, "issues").unwrap().is_empty());
    assert!(ts.memory.entity_exists(first.persistent_id().unwrap()).unwrap());
}

#[test]
fn readonly_thread_session_rejects_refactorings() {
    let ts = TestStore::new();
    let session = ts.begin_readonly_transaction().unwrap();
    assert!(matches!(
        ts.rename_entity_type_refactoring("Project", "Product"),
        Err(CoreError::ReadonlySession { .. })
    ));
    session.commit().unwrap();
}

#[test]
fn parent_is_deletable_after_raw_child_delete() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    let doomed = create_issue(&session, &ts.links, &project, "doomed").unwrap();
    let kept = create_issue(&session, &ts.links, &project, "kept").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_entity_refactoring(doomed.persistent_id().unwrap())
        .unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    assert_eq!(
        ts.links.project_issues.get_many(&session, &project).unwrap(),
        vec![kept]
    );
    session.delete_entity(&project).unwrap();
    session.commit().unwrap();
    assert_eq!(ts.memory.entity_count(), 0);
}

#[test]
fn parent_is_deletable_after_its_children_type_is_dropped() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    create_issue(&session, &ts.links, &project, "bug").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    ts.delete_entity_type_refactoring("Issue").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    assert!(ts.links.project_issues.get_many(&session, &project).unwrap().is_empty());
    session.delete_entity(&project).unwrap();
    session.commit().unwrap();
    assert_eq!(ts.memory.entity_count(), 0);
}
