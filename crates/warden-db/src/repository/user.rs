//! SurrealDB implementation of [`UserRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::role::RoleWithPermissions;
use warden_core::models::user::{CreateUser, UpdateUser, User, UserWithRoles};
use warden_core::repository::{PaginatedResult, Pagination, UserRepository};

use super::permission::{PERMISSION_FIELDS, PermissionRow, RoleGrantRow};
use super::role::{ROLE_FIELDS, RoleRow};
use super::{CountRow, TouchedRow, parse_uuid};
use crate::error::DbError;

/// Every user read projects the record id as `record_id`.
const USER_FIELDS: &str = "meta::id(id) AS record_id, email, name, password_hash, \
                           is_active, last_login, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    name: String,
    password_hash: String,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// One `has_role` edge, used to keep assignment order.
#[derive(Debug, SurrealValue)]
struct AssignmentRow {
    role_id: String,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, id: Uuid) -> Result<User, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "SELECT {USER_FIELDS} FROM type::record('user', $id) \
                 WHERE deleted_at = NONE"
            ))
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<UserRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            })?
            .try_into_user()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> WardenResult<User> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, name = $name, \
                 password_hash = $password_hash, \
                 is_active = $is_active",
            )
            .bind(("id", id.to_string()))
            .bind(("email", input.email))
            .bind(("name", input.name))
            .bind(("password_hash", input.password_hash))
            .bind(("is_active", input.is_active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "user"))?;

        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_email(&self, email: &str) -> WardenResult<User> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {USER_FIELDS} FROM user \
                 WHERE email = $email AND deleted_at = NONE"
            ))
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_with_roles(&self, id: Uuid) -> WardenResult<UserWithRoles> {
        let user = self.fetch_one(id).await?;

        // 0: assignment order, 1: live roles, 2: role->permission edges,
        // 3: live permissions reachable through those roles.
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(out) AS role_id, created_at FROM has_role \
                 WHERE in = type::record('user', $user_id) \
                 ORDER BY created_at ASC; \
                 SELECT {ROLE_FIELDS} FROM role \
                 WHERE deleted_at = NONE \
                 AND id IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 ); \
                 SELECT meta::id(in) AS role_id, meta::id(out) AS permission_id FROM grants \
                 WHERE in IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 ); \
                 SELECT {PERMISSION_FIELDS} FROM permission \
                 WHERE deleted_at = NONE \
                 AND id IN (\
                     SELECT VALUE out FROM grants \
                     WHERE in IN (\
                         SELECT VALUE out FROM has_role \
                         WHERE in = type::record('user', $user_id)\
                     )\
                 );"
            ))
            .bind(("user_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let order: Vec<AssignmentRow> = result.take(0).map_err(DbError::from)?;
        let role_rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let grant_rows: Vec<RoleGrantRow> = result.take(2).map_err(DbError::from)?;
        let permission_rows: Vec<PermissionRow> = result.take(3).map_err(DbError::from)?;

        let mut permissions = HashMap::new();
        for row in permission_rows {
            let permission = row.try_into_permission()?;
            permissions.insert(permission.id, permission);
        }

        let mut roles = HashMap::new();
        for row in role_rows {
            let role = row.try_into_role()?;
            roles.insert(role.id, role);
        }

        let mut granted: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in grant_rows {
            let role_id = parse_uuid(&row.role_id, "role")?;
            let permission_id = parse_uuid(&row.permission_id, "permission")?;
            granted.entry(role_id).or_default().push(permission_id);
        }

        let mut resolved = Vec::with_capacity(order.len());
        for edge in order {
            let role_id = parse_uuid(&edge.role_id, "role")?;
            // Inactive roles still resolve; soft-deleted ones do not.
            let Some(role) = roles.remove(&role_id) else {
                continue;
            };
            let mut role_permissions: Vec<_> = granted
                .remove(&role_id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|pid| permissions.get(&pid).cloned())
                .collect();
            role_permissions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            resolved.push(RoleWithPermissions {
                role,
                permissions: role_permissions,
            });
        }

        Ok(UserWithRoles {
            user,
            roles: resolved,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.last_login.is_some() {
            sets.push("last_login = $last_login");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE deleted_at = NONE",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(last_login) = input.last_login {
            builder = builder.bind(("last_login", last_login));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "user"))?;

        let touched: Vec<TouchedRow> = result.take(0).map_err(DbError::from)?;
        if touched.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        Ok(self.fetch_one(id).await?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.fetch_one(id).await?;

        self.db
            .query(
                "UPDATE type::record('user', $id) SET \
                 deleted_at = time::now(), is_active = false, \
                 updated_at = time::now(); \
                 DELETE has_role WHERE in = type::record('user', $id);",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        pagination: Pagination,
        active_only: bool,
    ) -> WardenResult<PaginatedResult<User>> {
        let filter = if active_only {
            "deleted_at = NONE AND is_active = true"
        } else {
            "deleted_at = NONE"
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM user WHERE {filter} GROUP ALL; \
                 SELECT {USER_FIELDS} FROM user WHERE {filter} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset;"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_role(&self, role_id: Uuid) -> WardenResult<Vec<User>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {USER_FIELDS} FROM user \
                 WHERE deleted_at = NONE \
                 AND id IN (\
                     SELECT VALUE in FROM has_role \
                     WHERE out = type::record('role', $role_id)\
                 ) \
                 ORDER BY created_at ASC"
            ))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
