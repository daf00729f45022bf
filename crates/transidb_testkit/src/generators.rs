//! Property-based test generators using proptest.
//!
//! Provides strategies for generating model values and operation sequences
//! over the issue-tracker fixture.

use proptest::prelude::*;

/// Strategy for logins accepted by the `User.login` constraints.
pub fn valid_login_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9]{3,16}").expect("Invalid regex")
}

/// Strategy for logins rejected by the `User.login` constraints.
pub fn invalid_login_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]{0,2}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{17,24}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{2,6}[ _.-][a-z]{1,6}").expect("Invalid regex"),
    ]
}

/// Strategy for listener priorities, with frequent ties.
pub fn priorities_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-3i32..=3, 0..16)
}

/// One association change in a generated scenario.
///
/// Indices refer to fixed pools of projects, issues and users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    /// Moves an issue into a project.
    Move {
        /// Issue index.
        issue: usize,
        /// Project index.
        project: usize,
    },
    /// Assigns an issue to a user.
    Assign {
        /// Issue index.
        issue: usize,
        /// User index.
        user: usize,
    },
    /// Clears the assignee of an issue.
    Unassign {
        /// Issue index.
        issue: usize,
    },
    /// Removes an issue from a user's assigned issues.
    RemoveAssigned {
        /// User index.
        user: usize,
        /// Issue index.
        issue: usize,
    },
}

/// Strategy for one association change over pools of the given sizes.
pub fn link_op_strategy(projects: usize, issues: usize, users: usize) -> impl Strategy<Value = LinkOp> {
    prop_oneof![
        (0..issues, 0..projects).prop_map(|(issue, project)| LinkOp::Move { issue, project }),
        (0..issues, 0..users).prop_map(|(issue, user)| LinkOp::Assign { issue, user }),
        (0..issues).prop_map(|issue| LinkOp::Unassign { issue }),
        (0..users, 0..issues).prop_map(|(user, issue)| LinkOp::RemoveAssigned { user, issue }),
    ]
}

/// Strategy for a sequence of association changes.
pub fn link_ops_strategy(
    projects: usize,
    issues: usize,
    users: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<LinkOp>> {
    prop::collection::vec(link_op_strategy(projects, issues, users), 0..max_len)
}
