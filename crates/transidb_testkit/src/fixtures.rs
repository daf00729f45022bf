//! Test fixtures and store helpers.
//!
//! Provides a small issue-tracker model, helpers that build a store over an
//! [`InMemoryStore`], and a listener that records what it was told.

use parking_lot::Mutex;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;
use transidb_core::{
    ChangeEvent, ConstraintViolation, CoreResult, EntityTypeModel, LinkDelegate, ModelRegistry,
    OnDeletePolicy, PropertyConstraints, PropertyModel, SessionListener, StoreConfig,
    TransientEntity, TransientEntityStore, TransientSession,
};
use transidb_storage::{InMemoryStore, PropertyValue};

/// Link delegates of the issue-tracker model.
///
/// | Type | Property | Kind |
/// |------|----------|------|
/// | `Project` | `issues` | parent to children `Issue.project` |
/// | `Issue` | `project` | child to parent |
/// | `Issue` | `assignee` | optional many to one `User.assignedIssues` |
/// | `User` | `assignedIssues` | one to many |
/// | `User` | `team` | optional many to one `Team.members`, fails when the team is deleted |
/// | `Team` | `members` | one to many, fails while members exist |
#[derive(Debug, Clone)]
pub struct IssueTracker {
    /// `Project.issues`
    pub project_issues: LinkDelegate,
    /// `Issue.project`
    pub issue_project: LinkDelegate,
    /// `Issue.assignee`
    pub issue_assignee: LinkDelegate,
    /// `User.assignedIssues`
    pub user_assigned_issues: LinkDelegate,
    /// `User.team`
    pub user_team: LinkDelegate,
    /// `Team.members`
    pub team_members: LinkDelegate,
}

impl IssueTracker {
    /// Creates the link delegates.
    pub fn new() -> Self {
        Self {
            project_issues: LinkDelegate::parent_to_children("issues", "Issue", "project"),
            issue_project: LinkDelegate::child_to_parent("project", "Project", "issues"),
            issue_assignee: LinkDelegate::many_to_one_optional(
                "assignee",
                "User",
                "assignedIssues",
                OnDeletePolicy::Clear,
                OnDeletePolicy::Clear,
            ),
            user_assigned_issues: LinkDelegate::one_to_many(
                "assignedIssues",
                "Issue",
                "assignee",
                OnDeletePolicy::Clear,
                OnDeletePolicy::Clear,
            ),
            user_team: LinkDelegate::many_to_one_optional(
                "team",
                "Team",
                "members",
                OnDeletePolicy::Clear,
                OnDeletePolicy::Fail,
            ),
            team_members: LinkDelegate::one_to_many(
                "members",
                "User",
                "team",
                OnDeletePolicy::Fail,
                OnDeletePolicy::Clear,
            ),
        }
    }

    /// Builds the model registry.
    ///
    /// `User.login` must be 3 to 16 letters or digits and `User.email`, when
    /// set, a valid address. `Project.name` and `Issue.summary` are required.
    pub fn model(&self) -> ModelRegistry {
        let login = PropertyConstraints::new()
            .alpha_numeric(None)
            .length(3, 16, None);
        let email = PropertyConstraints::new()
            .email(None, None)
            .expect("default email pattern must compile");

        ModelRegistry::new()
            .with_type(
                EntityTypeModel::new("Project")
                    .property(PropertyModel::new("name").required())
                    .link(self.project_issues.clone()),
            )
            .with_type(
                EntityTypeModel::new("Issue")
                    .property(PropertyModel::new("summary").required())
                    .property(
                        PropertyModel::new("priority")
                            .constraints(PropertyConstraints::new().min(1, None).max(5, None)),
                    )
                    .link(self.issue_project.clone())
                    .link(self.issue_assignee.clone()),
            )
            .with_type(
                EntityTypeModel::new("User")
                    .property(PropertyModel::new("login").required().constraints(login))
                    .property(PropertyModel::new("email").constraints(email))
                    .link(self.user_assigned_issues.clone())
                    .link(self.user_team.clone()),
            )
            .with_type(EntityTypeModel::new("Team").link(self.team_members.clone()))
    }
}

impl Default for IssueTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A transient store over an in-memory persistent store.
pub struct TestStore {
    /// The transient store.
    pub store: TransientEntityStore,
    /// The persistent store underneath.
    pub memory: Arc<InMemoryStore>,
    /// Link delegates of the model.
    pub links: IssueTracker,
}

impl TestStore {
    /// Creates a store with the issue-tracker model and default config.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the issue-tracker model.
    pub fn with_config(config: StoreConfig) -> Self {
        let links = IssueTracker::new();
        let memory = Arc::new(InMemoryStore::with_name("issue tracker"));
        let store = TransientEntityStore::new(memory.clone(), links.model(), config);
        Self {
            store,
            memory,
            links,
        }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = TransientEntityStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Creates a project with a name.
pub fn create_project(session: &TransientSession, name: &str) -> CoreResult<TransientEntity> {
    let project = session.new_entity("Project")?;
    session.set_property(&project, "name", Some(PropertyValue::from(name)))?;
    Ok(project)
}

/// Creates an issue in a project.
pub fn create_issue(
    session: &TransientSession,
    links: &IssueTracker,
    project: &TransientEntity,
    summary: &str,
) -> CoreResult<TransientEntity> {
    let issue = session.new_entity("Issue")?;
    session.set_property(&issue, "summary", Some(PropertyValue::from(summary)))?;
    links.issue_project.set_one(session, &issue, Some(project))?;
    Ok(issue)
}

/// Creates a user with a login.
pub fn create_user(session: &TransientSession, login: &str) -> CoreResult<TransientEntity> {
    let user = session.new_entity("User")?;
    session.set_property(&user, "login", Some(PropertyValue::from(login)))?;
    Ok(user)
}

/// Reads a string property.
pub fn string_property(
    session: &TransientSession,
    entity: &TransientEntity,
    name: &str,
) -> CoreResult<Option<String>> {
    Ok(session
        .get_property(entity, name)?
        .and_then(|value| value.as_str().map(str::to_string)))
}

/// What a [`RecordingListener`] was told.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// `before_flush` with the number of changes.
    BeforeFlush(String, usize),
    /// `after_constraints_fail` with the violated properties.
    ConstraintsFailed(String, Vec<String>),
    /// `flushed` with the number of changes.
    Flushed(String, usize),
}

/// A listener that appends every notification to a shared log.
///
/// Listeners sharing one log record the order they were called in.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    tag: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingListener {
    /// Creates a listener with its own log.
    pub fn new(tag: &str) -> Self {
        Self::with_log(tag, Arc::new(Mutex::new(Vec::new())))
    }

    /// Creates a listener writing to a shared log.
    pub fn with_log(tag: &str, log: Arc<Mutex<Vec<Recorded>>>) -> Self {
        Self {
            tag: tag.to_string(),
            log,
        }
    }

    /// Returns a copy of the log.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    /// Returns the tags of `flushed` notifications in call order.
    pub fn flushed_tags(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|r| match r {
                Recorded::Flushed(tag, _) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SessionListener for RecordingListener {
    fn before_flush(&self, _session: &TransientSession, changes: &[ChangeEvent]) {
        self.log
            .lock()
            .push(Recorded::BeforeFlush(self.tag.clone(), changes.len()));
    }

    fn after_constraints_fail(&self, _session: &TransientSession, violations: &[ConstraintViolation]) {
        let properties = violations.iter().map(|v| v.property.clone()).collect();
        self.log
            .lock()
            .push(Recorded::ConstraintsFailed(self.tag.clone(), properties));
    }

    fn flushed(&self, _session: &TransientSession, changes: &[ChangeEvent]) {
        self.log
            .lock()
            .push(Recorded::Flushed(self.tag.clone(), changes.len()));
    }
}

/// Installs a test subscriber once. `RUST_LOG` selects the level; the
/// default is `warn`.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_model_round_trip() {
        let ts = TestStore::new();
        let session = ts.begin_session().unwrap();
        let project = create_project(&session, "core").unwrap();
        let issue = create_issue(&session, &ts.links, &project, "crash on start").unwrap();
        let user = create_user(&session, "alice").unwrap();
        ts.links.issue_assignee.set_one(&session, &issue, Some(&user)).unwrap();
        session.commit().unwrap();

        let session = ts.begin_readonly_transaction().unwrap();
        let issue = session.entity(issue.persistent_id().unwrap()).unwrap();
        assert_eq!(
            string_property(&session, &issue, "summary").unwrap().as_deref(),
            Some("crash on start")
        );
        let assignee = ts.links.issue_assignee.get_one(&session, &issue).unwrap().unwrap();
        assert_eq!(assignee.persistent_id(), user.persistent_id());
        session.commit().unwrap();
        assert_eq!(ts.memory.entity_count(), 3);
    }

    #[test]
    fn recording_listener_logs_flushes() {
        init_test_logging();
        let ts = TestStore::new();
        let listener = Arc::new(RecordingListener::new("a"));
        ts.add_listener(listener.clone());

        let session = ts.begin_session().unwrap();
        create_project(&session, "core").unwrap();
        session.commit().unwrap();

        assert_eq!(
            listener.recorded(),
            vec![
                Recorded::BeforeFlush("a".to_string(), 1),
                Recorded::Flushed("a".to_string(), 1),
            ]
        );
    }
}
