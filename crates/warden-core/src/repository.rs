//! Repository trait definitions for the credential store.
//!
//! All repository operations are async. Reads never return soft-deleted
//! rows. Uniqueness (user email, role name, permission name, permission
//! `(resource, action)`, token strings) is enforced by the store itself,
//! not by callers checking first.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    permission::{CreatePermission, Permission, UpdatePermission},
    role::{CreateRole, Role, RoleWithPermissions, UpdateRole},
    token::{CreatePasswordResetToken, PasswordResetToken},
    user::{CreateUser, UpdateUser, User, UserWithRoles},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the email is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = WardenResult<User>> + Send;
    /// The user with its assigned roles (in assignment order) and each
    /// role's permissions, read in one pass.
    fn get_with_roles(&self, id: Uuid) -> impl Future<Output = WardenResult<UserWithRoles>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    /// Soft-delete: the row stays but disappears from every read.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> impl Future<Output = WardenResult<PaginatedResult<User>>> + Send;
    /// Live users holding `role_id`, oldest account first.
    fn list_by_role(&self, role_id: Uuid) -> impl Future<Output = WardenResult<Vec<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the name is taken.
    fn create(&self, input: CreateRole) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_with_permissions(
        &self,
        id: Uuid,
    ) -> impl Future<Output = WardenResult<RoleWithPermissions>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Soft-delete; also drops the role's user and permission edges.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Role>>> + Send;

    /// Assign a role to a user. Assigning an existing pair is a no-op.
    fn assign_to_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Remove a role assignment. Removing a missing pair is a no-op.
    fn unassign_from_user(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Roles directly assigned to a user, in assignment order.
    fn get_user_roles(&self, user_id: Uuid) -> impl Future<Output = WardenResult<Vec<Role>>> + Send;
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    /// Fails with `DuplicatePermission` when `(resource, action)` is taken
    /// and `AlreadyExists` when only the name is.
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_resource_action(
        &self,
        resource: &str,
        action: &str,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    /// Soft-delete; also drops the permission's role edges.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
        resource: Option<&str>,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Permission>>> + Send;
    /// Distinct resources that have at least one permission.
    fn list_resources(&self) -> impl Future<Output = WardenResult<Vec<String>>> + Send;
    /// Distinct actions defined for a resource.
    fn list_resource_actions(
        &self,
        resource: &str,
    ) -> impl Future<Output = WardenResult<Vec<String>>> + Send;

    /// Grant a permission to a role. Granting an existing pair is a no-op.
    fn grant_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Revoke a permission from a role. Revoking a missing pair is a no-op.
    fn revoke_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    fn get_role_permissions(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub trait TokenRepository: Send + Sync {
    /// Record a revoked session token. Blacklisting an already
    /// blacklisted token succeeds without changing the stored row.
    fn blacklist(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    fn is_blacklisted(&self, token: &str) -> impl Future<Output = WardenResult<bool>> + Send;

    /// Drop blacklist rows whose `expires_at` is before `now`. Returns the
    /// number of rows removed.
    fn purge_expired_blacklist(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<u64>> + Send;

    fn create_reset_token(
        &self,
        input: CreatePasswordResetToken,
    ) -> impl Future<Output = WardenResult<PasswordResetToken>> + Send;

    /// The reset token matching `token` that is unused and has
    /// `expires_at > now`; `NotFound` otherwise.
    fn get_valid_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<PasswordResetToken>> + Send;

    /// Set `used_at = now` if the token is still unused. Fails with
    /// `InvalidOrExpiredToken` when another caller consumed it first.
    fn mark_reset_token_used(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
}
