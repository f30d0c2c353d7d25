//! Role-based permission evaluation.
//!
//! Pure functions over a resolved [`UserWithRoles`]. Inactive roles are
//! invisible here: they neither grant permissions nor satisfy role checks.
//! The user's own active flag is not consulted.

use std::collections::HashSet;

use warden_core::models::permission::Permission;
use warden_core::models::role::RoleWithPermissions;
use warden_core::models::user::UserWithRoles;

/// Well-known action names.
pub mod actions {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const LIST: &str = "list";
    /// Wildcard: grants every action on its resource.
    pub const MANAGE: &str = "manage";

    pub const ALL: [&str; 6] = [CREATE, READ, UPDATE, DELETE, LIST, MANAGE];
}

/// Resources seeded by default.
pub mod resources {
    pub const USER: &str = "user";
    pub const CUSTOMER: &str = "customer";
    pub const INVOICE: &str = "invoice";
    pub const ROLE: &str = "role";
    pub const SYSTEM: &str = "system";
}

/// Roles seeded by default.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";
    pub const MODERATOR: &str = "moderator";
    pub const GUEST: &str = "guest";
}

/// Conventional permission name, `resource:action`.
pub fn permission_name(resource: &str, action: &str) -> String {
    format!("{resource}:{action}")
}

fn active_roles(user: &UserWithRoles) -> impl Iterator<Item = &RoleWithPermissions> {
    user.roles.iter().filter(|r| r.role.is_active)
}

fn grants(permission: &Permission, resource: &str, action: &str) -> bool {
    permission.resource == resource
        && (permission.action == action || permission.action == actions::MANAGE)
}

pub fn has_permission(user: &UserWithRoles, resource: &str, action: &str) -> bool {
    active_roles(user)
        .flat_map(|r| r.permissions.iter())
        .any(|p| grants(p, resource, action))
}

pub fn has_role(user: &UserWithRoles, role_name: &str) -> bool {
    active_roles(user).any(|r| r.role.name == role_name)
}

/// True if the user holds at least one of `role_names`.
pub fn has_any_role(user: &UserWithRoles, role_names: &[&str]) -> bool {
    active_roles(user).any(|r| role_names.contains(&r.role.name.as_str()))
}

pub fn is_admin(user: &UserWithRoles) -> bool {
    has_role(user, roles::ADMIN)
}

/// Every permission granted through an active role, deduplicated by id
/// and kept in first-seen order.
pub fn effective_permissions(user: &UserWithRoles) -> Vec<Permission> {
    let mut seen = HashSet::new();
    active_roles(user)
        .flat_map(|r| r.permissions.iter())
        .filter(|p| seen.insert(p.id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;
    use warden_core::models::role::Role;
    use warden_core::models::user::User;

    use super::*;

    fn perm(resource: &str, action: &str) -> Permission {
        let now = Utc::now();
        Permission {
            id: Uuid::new_v4(),
            name: permission_name(resource, action),
            resource: resource.into(),
            action: action.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn role(name: &str, active: bool, permissions: Vec<Permission>) -> RoleWithPermissions {
        let now = Utc::now();
        RoleWithPermissions {
            role: Role {
                id: Uuid::new_v4(),
                name: name.into(),
                description: String::new(),
                is_active: active,
                created_at: now,
                updated_at: now,
            },
            permissions,
        }
    }

    fn user(roles: Vec<RoleWithPermissions>) -> UserWithRoles {
        let now = Utc::now();
        UserWithRoles {
            user: User {
                id: Uuid::new_v4(),
                email: "ada@example.com".into(),
                name: "Ada".into(),
                password_hash: String::new(),
                is_active: true,
                last_login: None,
                created_at: now,
                updated_at: now,
            },
            roles,
        }
    }

    #[test]
    fn exact_match_grants() {
        let u = user(vec![role("user", true, vec![perm("invoice", "read")])]);
        assert!(has_permission(&u, "invoice", "read"));
        assert!(!has_permission(&u, "invoice", "delete"));
        assert!(!has_permission(&u, "customer", "read"));
    }

    #[test]
    fn manage_is_a_wildcard_for_its_resource_only() {
        let u = user(vec![role("admin", true, vec![perm("invoice", "manage")])]);
        for action in actions::ALL {
            assert!(has_permission(&u, "invoice", action), "{action}");
        }
        assert!(!has_permission(&u, "customer", "read"));
    }

    #[test]
    fn inactive_role_never_grants() {
        let u = user(vec![role("admin", false, vec![perm("invoice", "manage")])]);
        assert!(!has_permission(&u, "invoice", "read"));
        assert!(!has_role(&u, "admin"));
        assert!(!is_admin(&u));
        assert!(effective_permissions(&u).is_empty());
    }

    #[test]
    fn inactive_user_still_resolves() {
        let mut u = user(vec![role("user", true, vec![perm("invoice", "read")])]);
        u.user.is_active = false;
        assert!(has_permission(&u, "invoice", "read"));
    }

    #[test]
    fn overlapping_roles_do_not_duplicate_permissions() {
        let shared = perm("invoice", "read");
        let u = user(vec![
            role("user", true, vec![shared.clone(), perm("customer", "read")]),
            role("moderator", true, vec![shared.clone(), perm("invoice", "list")]),
        ]);

        let effective = effective_permissions(&u);
        assert_eq!(effective.len(), 3);
        let ids: HashSet<_> = effective.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(effective[0].id, shared.id);
    }

    #[test]
    fn role_checks() {
        let u = user(vec![
            role("user", true, vec![]),
            role("moderator", false, vec![]),
        ]);
        assert!(has_role(&u, "user"));
        assert!(!has_role(&u, "moderator"));
        assert!(has_any_role(&u, &["admin", "user"]));
        assert!(!has_any_role(&u, &["admin", "moderator"]));
        assert!(!is_admin(&u));
    }
}
