/// Action policies
///
/// Every route is tagged with an [`Action`]. The action's [`Policy`] names
/// the permission it requires and whether owners may proceed without it.
/// Evaluation is plain set membership against the caller's resolved
/// permission set:
///
/// | outcome | when |
/// |---|---|
/// | [`Access::Any`] | the permission is held, or none is required |
/// | [`Access::OwnOnly`] | the permission is missing but owners may proceed |
/// | [`Access::Denied`] | the permission is missing and there is no owner fallback |
///
/// There is no hierarchy and no wildcard: `edit-any-tasks` says nothing
/// about `view-any-tasks`.
///
/// # Example
///
/// ```
/// use tasktrack_shared::auth::policy::{authorize, Access, Action, PermissionSet};
///
/// let permissions = PermissionSet::from_iter(["view-any-tasks"]);
///
/// assert_eq!(authorize(Action::ListTasks, &permissions), Access::Any);
/// assert_eq!(authorize(Action::MoveTask, &permissions), Access::OwnOnly);
/// assert_eq!(authorize(Action::DeleteTask, &permissions), Access::Denied);
/// ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Catalog of permission names seeded into the `permissions` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionName {
    ViewAnyTasks,
    EditAnyTasks,
    DeleteAnyTasks,
    ViewAnyRoles,
    CreateNewRoles,
    UpdateAnyRoles,
    DeleteAnyRoles,
}

impl PermissionName {
    /// Every catalog entry, in seed order
    pub const ALL: [PermissionName; 7] = [
        PermissionName::ViewAnyTasks,
        PermissionName::EditAnyTasks,
        PermissionName::DeleteAnyTasks,
        PermissionName::ViewAnyRoles,
        PermissionName::CreateNewRoles,
        PermissionName::UpdateAnyRoles,
        PermissionName::DeleteAnyRoles,
    ];

    /// Name as stored in `permissions.name`
    pub const fn as_str(&self) -> &'static str {
        match self {
            PermissionName::ViewAnyTasks => "view-any-tasks",
            PermissionName::EditAnyTasks => "edit-any-tasks",
            PermissionName::DeleteAnyTasks => "delete-any-tasks",
            PermissionName::ViewAnyRoles => "view-any-roles",
            PermissionName::CreateNewRoles => "create-new-roles",
            PermissionName::UpdateAnyRoles => "update-any-roles",
            PermissionName::DeleteAnyRoles => "delete-any-roles",
        }
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// A user's resolved permission names
///
/// Names outside the catalog are kept as-is; they simply never match a
/// policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership test by name
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Membership test by catalog entry
    pub fn has(&self, permission: PermissionName) -> bool {
        self.contains(permission.as_str())
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no permission is held
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Route-level actions that carry a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListTasks,
    ViewTask,
    CreateTask,
    EditTask,
    MoveTask,
    DeleteTask,
    AttachFile,
    DetachFile,
    ViewProgress,
    ViewRoles,
    CreateRole,
    UpdateRole,
    DeleteRole,
}

/// Requirement attached to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Permission that grants unrestricted access; `None` means any
    /// authenticated user may proceed
    pub required: Option<PermissionName>,

    /// Whether a caller lacking `required` may still act on records they own
    pub owner_fallback: bool,
}

impl Action {
    /// The policy table
    pub const fn policy(self) -> Policy {
        use PermissionName::*;

        let (required, owner_fallback) = match self {
            Action::ListTasks => (Some(ViewAnyTasks), true),
            Action::ViewTask => (Some(ViewAnyTasks), true),
            Action::CreateTask => (None, false),
            Action::EditTask => (Some(EditAnyTasks), true),
            Action::MoveTask => (Some(EditAnyTasks), true),
            Action::DeleteTask => (Some(DeleteAnyTasks), false),
            Action::AttachFile => (Some(EditAnyTasks), true),
            Action::DetachFile => (Some(EditAnyTasks), true),
            Action::ViewProgress => (Some(ViewAnyTasks), true),
            Action::ViewRoles => (Some(ViewAnyRoles), false),
            Action::CreateRole => (Some(CreateNewRoles), false),
            Action::UpdateRole => (Some(UpdateAnyRoles), false),
            Action::DeleteRole => (Some(DeleteAnyRoles), false),
        };

        Policy {
            required,
            owner_fallback,
        }
    }

    /// Stable identifier used in logs and error messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::ListTasks => "list-tasks",
            Action::ViewTask => "view-task",
            Action::CreateTask => "create-task",
            Action::EditTask => "edit-task",
            Action::MoveTask => "move-task",
            Action::DeleteTask => "delete-task",
            Action::AttachFile => "attach-file",
            Action::DetachFile => "detach-file",
            Action::ViewProgress => "view-progress",
            Action::ViewRoles => "view-roles",
            Action::CreateRole => "create-role",
            Action::UpdateRole => "update-role",
            Action::DeleteRole => "delete-role",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Unrestricted
    Any,

    /// Restricted to records owned by the caller
    OwnOnly,

    /// Rejected
    Denied,
}

/// Evaluates `action`'s policy against `permissions`
pub fn authorize(action: Action, permissions: &PermissionSet) -> Access {
    let policy = action.policy();

    match policy.required {
        None => Access::Any,
        Some(required) if permissions.has(required) => Access::Any,
        Some(_) if policy.owner_fallback => Access::OwnOnly,
        Some(_) => Access::Denied,
    }
}

/// Error type for policy checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Caller lacks the permission the action requires
    #[error("Action {action} requires permission {permission}")]
    MissingPermission {
        action: Action,
        permission: PermissionName,
    },

    /// Caller may only act on their own records and this one is not theirs
    #[error("Action {action} is limited to records you own")]
    NotOwner { action: Action },
}

/// An allowed action, carried from the policy stage into the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Action that was authorized
    pub action: Action,

    /// Caller
    pub user_id: i32,

    /// Either `Any` or `OwnOnly`
    pub access: Access,
}

impl Grant {
    /// Authorizes `action` for `user_id`
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::MissingPermission` when the policy denies.
    pub fn issue(
        action: Action,
        user_id: i32,
        permissions: &PermissionSet,
    ) -> Result<Self, PolicyError> {
        let access = authorize(action, permissions);

        // Denied implies a required permission
        if let (Access::Denied, Some(permission)) = (access, action.policy().required) {
            return Err(PolicyError::MissingPermission { action, permission });
        }

        Ok(Self {
            action,
            user_id,
            access,
        })
    }

    /// Owner filter to apply to queries: `None` when unrestricted
    pub fn owner_scope(&self) -> Option<i32> {
        match self.access {
            Access::OwnOnly => Some(self.user_id),
            _ => None,
        }
    }

    /// Whether a record owned by `owner_id` is within this grant
    pub fn covers(&self, owner_id: i32) -> bool {
        self.owner_scope().map_or(true, |user_id| user_id == owner_id)
    }

    /// Like [`Grant::covers`], as a `Result`
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::NotOwner` when the record is out of scope.
    pub fn ensure_covers(&self, owner_id: i32) -> Result<(), PolicyError> {
        if self.covers(owner_id) {
            Ok(())
        } else {
            Err(PolicyError::NotOwner {
                action: self.action,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 13] = [
        Action::ListTasks,
        Action::ViewTask,
        Action::CreateTask,
        Action::EditTask,
        Action::MoveTask,
        Action::DeleteTask,
        Action::AttachFile,
        Action::DetachFile,
        Action::ViewProgress,
        Action::ViewRoles,
        Action::CreateRole,
        Action::UpdateRole,
        Action::DeleteRole,
    ];

    fn everything() -> PermissionSet {
        PermissionName::ALL.iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn test_full_permission_set_allows_everything() {
        let permissions = everything();

        for action in ALL_ACTIONS {
            assert_eq!(authorize(action, &permissions), Access::Any, "{}", action);
        }
    }

    #[test]
    fn test_empty_permission_set() {
        let permissions = PermissionSet::new();

        assert_eq!(authorize(Action::CreateTask, &permissions), Access::Any);
        assert_eq!(authorize(Action::ListTasks, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::EditTask, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::MoveTask, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::DetachFile, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::DeleteTask, &permissions), Access::Denied);
        assert_eq!(authorize(Action::ViewRoles, &permissions), Access::Denied);
        assert_eq!(authorize(Action::CreateRole, &permissions), Access::Denied);
    }

    #[test]
    fn test_permissions_do_not_imply_each_other() {
        let permissions = PermissionSet::from_iter(["edit-any-tasks", "create-new-roles"]);

        assert_eq!(authorize(Action::EditTask, &permissions), Access::Any);
        assert_eq!(authorize(Action::ListTasks, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::CreateRole, &permissions), Access::Any);
        assert_eq!(authorize(Action::UpdateRole, &permissions), Access::Denied);
    }

    #[test]
    fn test_unknown_names_never_match() {
        let permissions = PermissionSet::from_iter(["*", "tasks:*", "VIEW-ANY-TASKS"]);

        assert_eq!(authorize(Action::ListTasks, &permissions), Access::OwnOnly);
        assert_eq!(authorize(Action::DeleteRole, &permissions), Access::Denied);
    }

    #[test]
    fn test_grant_scopes_own_only_to_caller() {
        let grant = Grant::issue(Action::MoveTask, 3, &PermissionSet::new()).unwrap();

        assert_eq!(grant.owner_scope(), Some(3));
        assert!(grant.covers(3));
        assert!(!grant.covers(4));
        assert_eq!(
            grant.ensure_covers(4),
            Err(PolicyError::NotOwner {
                action: Action::MoveTask
            })
        );
    }

    #[test]
    fn test_grant_with_permission_is_unscoped() {
        let permissions = PermissionSet::from_iter(["edit-any-tasks"]);
        let grant = Grant::issue(Action::MoveTask, 3, &permissions).unwrap();

        assert_eq!(grant.owner_scope(), None);
        assert!(grant.covers(4));
    }

    #[test]
    fn test_denied_grant_names_missing_permission() {
        let err = Grant::issue(Action::DeleteRole, 1, &PermissionSet::new()).unwrap_err();

        assert_eq!(
            err,
            PolicyError::MissingPermission {
                action: Action::DeleteRole,
                permission: PermissionName::DeleteAnyRoles,
            }
        );
        assert!(err.to_string().contains("delete-any-roles"));
    }

    #[test]
    fn test_permission_name_round_trip_through_str() {
        for permission in PermissionName::ALL {
            assert_eq!(permission.as_str().parse::<PermissionName>(), Ok(permission));
        }
        assert!("manage-everything".parse::<PermissionName>().is_err());
    }
}
