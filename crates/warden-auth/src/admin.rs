//! Role, permission and assignment administration, plus default seeding.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{CreatePermission, Permission, UpdatePermission};
use warden_core::models::role::{CreateRole, Role, RoleWithPermissions, UpdateRole};
use warden_core::models::user::{CreateUser, UpdateUser, User, UserWithRoles};
use warden_core::repository::{
    PaginatedResult, Pagination, PermissionRepository, RoleRepository, UserRepository,
};

use crate::password::PasswordHasher;
use crate::rbac::{actions, permission_name, resources, roles};
use crate::service::NewUser;

const DEFAULT_RESOURCES: [&str; 5] = [
    resources::USER,
    resources::CUSTOMER,
    resources::INVOICE,
    resources::ROLE,
    resources::SYSTEM,
];

const DEFAULT_ROLES: [(&str, &str); 4] = [
    (roles::ADMIN, "Administrator with full access"),
    (roles::USER, "Regular user with basic access"),
    (roles::MODERATOR, "Moderator with limited admin access"),
    (roles::GUEST, "Guest user with read-only access"),
];

/// Granted to the `user` role on seeding.
const BASIC_USER_GRANTS: [(&str, &str); 5] = [
    (resources::CUSTOMER, actions::READ),
    (resources::CUSTOMER, actions::LIST),
    (resources::INVOICE, actions::READ),
    (resources::INVOICE, actions::LIST),
    (resources::USER, actions::READ),
];

/// RBAC administration over the credential store.
pub struct RbacAdmin<U: UserRepository, R: RoleRepository, P: PermissionRepository> {
    users: U,
    roles: R,
    permissions: P,
    hasher: Arc<dyn PasswordHasher>,
}

impl<U: UserRepository, R: RoleRepository, P: PermissionRepository> RbacAdmin<U, R, P> {
    pub fn new(users: U, roles: R, permissions: P, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            users,
            roles,
            permissions,
            hasher,
        }
    }

    // -----------------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------------

    /// Fails with `DuplicatePermission` if `(resource, action)` already
    /// has a permission, whatever its name.
    pub async fn create_permission(&self, input: CreatePermission) -> WardenResult<Permission> {
        match self
            .permissions
            .get_by_resource_action(&input.resource, &input.action)
            .await
        {
            Ok(_) => {
                return Err(WardenError::DuplicatePermission {
                    resource: input.resource,
                    action: input.action,
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let permission = self.permissions.create(input).await?;
        info!(permission = %permission.name, "permission created");
        Ok(permission)
    }

    pub async fn get_permission(&self, id: Uuid) -> WardenResult<Permission> {
        self.permissions.get_by_id(id).await
    }

    pub async fn get_permission_by_name(&self, name: &str) -> WardenResult<Permission> {
        self.permissions.get_by_name(name).await
    }

    pub async fn list_permissions(
        &self,
        pagination: Pagination,
        resource: Option<&str>,
    ) -> WardenResult<PaginatedResult<Permission>> {
        self.permissions.list(pagination, resource).await
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> WardenResult<Permission> {
        self.permissions.update(id, input).await
    }

    pub async fn delete_permission(&self, id: Uuid) -> WardenResult<()> {
        self.permissions.delete(id).await?;
        info!(permission_id = %id, "permission deleted");
        Ok(())
    }

    pub async fn list_resources(&self) -> WardenResult<Vec<String>> {
        self.permissions.list_resources().await
    }

    pub async fn list_resource_actions(&self, resource: &str) -> WardenResult<Vec<String>> {
        self.permissions.list_resource_actions(resource).await
    }

    // -----------------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------------

    /// Create an active role holding `permission_ids`.
    ///
    /// Every id is checked before anything is written. Attaching the
    /// permissions happens after the role exists; a failure there names
    /// the step and leaves the role in place.
    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        permission_ids: &[Uuid],
    ) -> WardenResult<RoleWithPermissions> {
        match self.roles.get_by_name(name).await {
            Ok(_) => {
                return Err(WardenError::AlreadyExists {
                    entity: "role".into(),
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        for id in permission_ids {
            self.permissions.get_by_id(*id).await?;
        }

        let role = self
            .roles
            .create(CreateRole {
                name: name.to_string(),
                description: description.to_string(),
                is_active: true,
            })
            .await?;

        for id in permission_ids {
            self.permissions
                .grant_to_role(role.id, *id)
                .await
                .map_err(|e| e.at_step(format!("grant permission {id} to role {name}")))?;
        }

        info!(role = %role.name, permissions = permission_ids.len(), "role created");
        self.roles.get_with_permissions(role.id).await
    }

    pub async fn get_role(&self, id: Uuid) -> WardenResult<RoleWithPermissions> {
        self.roles.get_with_permissions(id).await
    }

    pub async fn get_role_by_name(&self, name: &str) -> WardenResult<RoleWithPermissions> {
        let role = self.roles.get_by_name(name).await?;
        self.roles.get_with_permissions(role.id).await
    }

    pub async fn get_role_permissions(&self, role_id: Uuid) -> WardenResult<Vec<Permission>> {
        self.roles.get_by_id(role_id).await?;
        self.permissions.get_role_permissions(role_id).await
    }

    pub async fn list_roles(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> WardenResult<PaginatedResult<Role>> {
        self.roles.list(pagination, active_only).await
    }

    /// Fails with `AlreadyExists` when renaming onto another role's name.
    pub async fn update_role(&self, id: Uuid, input: UpdateRole) -> WardenResult<Role> {
        if let Some(name) = &input.name {
            match self.roles.get_by_name(name).await {
                Ok(other) if other.id != id => {
                    return Err(WardenError::AlreadyExists {
                        entity: "role".into(),
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.roles.update(id, input).await
    }

    pub async fn delete_role(&self, id: Uuid) -> WardenResult<()> {
        self.roles.delete(id).await?;
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Associations
    // -----------------------------------------------------------------------

    pub async fn add_permission_to_role(&self, role_id: Uuid, permission_id: Uuid) -> WardenResult<()> {
        self.roles.get_by_id(role_id).await?;
        self.permissions.get_by_id(permission_id).await?;
        self.permissions.grant_to_role(role_id, permission_id).await
    }

    pub async fn remove_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> WardenResult<()> {
        self.permissions.revoke_from_role(role_id, permission_id).await
    }

    pub async fn assign_role_to_user(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<()> {
        self.users.get_by_id(user_id).await?;
        self.roles.get_by_id(role_id).await?;
        self.roles.assign_to_user(user_id, role_id).await?;
        info!(%user_id, %role_id, "role assigned");
        Ok(())
    }

    pub async fn remove_role_from_user(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<()> {
        self.roles.unassign_from_user(user_id, role_id).await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Create an active account and give it the default `user` role when
    /// that role exists.
    pub async fn create_user(&self, input: NewUser) -> WardenResult<User> {
        match self.users.get_by_email(&input.email).await {
            Ok(_) => {
                return Err(WardenError::AlreadyExists {
                    entity: "user".into(),
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .create(CreateUser {
                email: input.email,
                name: input.name,
                password_hash,
                is_active: true,
            })
            .await?;

        match self.roles.get_by_name(roles::USER).await {
            Ok(role) => self
                .roles
                .assign_to_user(user.id, role.id)
                .await
                .map_err(|e| e.at_step("assign default role"))?,
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user.id, "no default role to assign");
            }
            Err(e) => return Err(e.at_step("look up default role")),
        }

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Change a user's name and/or email. Fails with `AlreadyExists` when
    /// the email belongs to another account.
    pub async fn update_user(
        &self,
        user_id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> WardenResult<User> {
        if let Some(email) = &email {
            match self.users.get_by_email(email).await {
                Ok(other) if other.id != user_id => {
                    return Err(WardenError::AlreadyExists {
                        entity: "user".into(),
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        self.users
            .update(
                user_id,
                UpdateUser {
                    name,
                    email,
                    ..Default::default()
                },
            )
            .await
    }

    /// Set a new password without the old one or a reset token.
    pub async fn update_user_password(&self, user_id: Uuid, new_password: &str) -> WardenResult<()> {
        self.users.get_by_id(user_id).await?;
        let password_hash = self.hasher.hash(new_password)?;
        self.users
            .update(
                user_id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;
        info!(%user_id, "password set by administrator");
        Ok(())
    }

    pub async fn get_user_roles(&self, user_id: Uuid) -> WardenResult<Vec<Role>> {
        self.users.get_by_id(user_id).await?;
        self.roles.get_user_roles(user_id).await
    }

    pub async fn get_users_with_role(&self, role_id: Uuid) -> WardenResult<Vec<User>> {
        self.roles.get_by_id(role_id).await?;
        self.users.list_by_role(role_id).await
    }

    pub async fn get_user_with_roles(&self, user_id: Uuid) -> WardenResult<UserWithRoles> {
        self.users.get_with_roles(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> WardenResult<User> {
        self.users.get_by_email(email).await
    }

    pub async fn list_users(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> WardenResult<PaginatedResult<User>> {
        self.users.list(pagination, active_only).await
    }

    pub async fn set_user_active(&self, user_id: Uuid, active: bool) -> WardenResult<User> {
        self.users
            .update(
                user_id,
                UpdateUser {
                    is_active: Some(active),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn delete_user(&self, user_id: Uuid) -> WardenResult<()> {
        self.users.delete(user_id).await?;
        info!(%user_id, "user deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Create the default permission grid and roles, grant everything to
    /// `admin` and the basic read set to `user`. Safe to run repeatedly.
    ///
    /// Defaults an administrator has deleted stay deleted: their names are
    /// still held by the soft-deleted rows, so they are skipped.
    pub async fn seed_defaults(&self) -> WardenResult<()> {
        let mut all = Vec::new();
        for resource in DEFAULT_RESOURCES {
            for action in actions::ALL {
                if resource == resources::SYSTEM && action != actions::MANAGE {
                    continue;
                }
                if let Some(permission) = self.ensure_permission(resource, action).await? {
                    all.push(permission);
                }
            }
        }
        info!(count = all.len(), "default permissions ensured");

        let mut seeded = Vec::new();
        for (name, description) in DEFAULT_ROLES {
            if let Some(role) = self.ensure_role(name, description).await? {
                seeded.push(role);
            }
        }
        info!(count = seeded.len(), "default roles ensured");

        if let Some(admin) = seeded.iter().find(|r| r.name == roles::ADMIN) {
            for permission in &all {
                self.permissions
                    .grant_to_role(admin.id, permission.id)
                    .await
                    .map_err(|e| e.at_step(format!("grant {} to admin", permission.name)))?;
            }
        }

        if let Some(user) = seeded.iter().find(|r| r.name == roles::USER) {
            for (resource, action) in BASIC_USER_GRANTS {
                let Some(permission) = all
                    .iter()
                    .find(|p| p.resource == resource && p.action == action)
                else {
                    continue;
                };
                self.permissions
                    .grant_to_role(user.id, permission.id)
                    .await
                    .map_err(|e| e.at_step(format!("grant {} to user", permission.name)))?;
            }
        }

        info!("default roles and permissions seeded");
        Ok(())
    }

    async fn ensure_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> WardenResult<Option<Permission>> {
        match self
            .permissions
            .get_by_resource_action(resource, action)
            .await
        {
            Ok(existing) => return Ok(Some(existing)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let created = self
            .permissions
            .create(CreatePermission {
                name: permission_name(resource, action),
                resource: resource.to_string(),
                action: action.to_string(),
                description: format!("Allow {action} on {resource}"),
            })
            .await;

        match created {
            Ok(permission) => Ok(Some(permission)),
            Err(WardenError::AlreadyExists { .. } | WardenError::DuplicatePermission { .. }) => {
                warn!(resource, action, "default permission was deleted; not recreating");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_role(&self, name: &str, description: &str) -> WardenResult<Option<Role>> {
        match self.roles.get_by_name(name).await {
            Ok(existing) => return Ok(Some(existing)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let created = self
            .roles
            .create(CreateRole {
                name: name.to_string(),
                description: description.to_string(),
                is_active: true,
            })
            .await;

        match created {
            Ok(role) => Ok(Some(role)),
            Err(WardenError::AlreadyExists { .. }) => {
                warn!(role = name, "default role was deleted; not recreating");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
