//! SurrealDB implementation of [`RoleRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::role::{CreateRole, Role, RoleWithPermissions, UpdateRole};
use warden_core::repository::{PaginatedResult, Pagination, RoleRepository};

use super::permission::{PERMISSION_FIELDS, PermissionRow};
use super::{CountRow, TouchedRow, parse_uuid};
use crate::error::DbError;

pub(super) const ROLE_FIELDS: &str = "meta::id(id) AS record_id, name, description, \
                                      is_active, created_at, updated_at";

#[derive(Debug, SurrealValue)]
pub(super) struct RoleRow {
    record_id: String,
    name: String,
    description: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    pub(super) fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid(&self.record_id, "role")?,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct AssignedRoleRow {
    role_id: String,
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Role, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "SELECT {ROLE_FIELDS} FROM type::record('role', $id) \
                 WHERE deleted_at = NONE"
            ))
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<RoleRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "role".into(),
                id: id_str,
            })?
            .try_into_role()
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> WardenResult<Role> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('role', $id) SET \
                 name = $name, description = $description, \
                 is_active = $is_active",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_active", input.is_active))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "role"))?;

        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Role> {
        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_name(&self, name: &str) -> WardenResult<Role> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {ROLE_FIELDS} FROM role \
                 WHERE name = $name AND deleted_at = NONE"
            ))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: format!("name={name}"),
        })?;

        Ok(row.try_into_role()?)
    }

    async fn get_with_permissions(&self, id: Uuid) -> WardenResult<RoleWithPermissions> {
        let role = self.fetch_one(id).await?;

        let mut result = self
            .db
            .query(format!(
                "SELECT {PERMISSION_FIELDS} FROM permission \
                 WHERE deleted_at = NONE \
                 AND id IN (\
                     SELECT VALUE out FROM grants \
                     WHERE in = type::record('role', $role_id)\
                 ) \
                 ORDER BY created_at ASC"
            ))
            .bind(("role_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let permissions = rows
            .into_iter()
            .map(PermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(RoleWithPermissions { role, permissions })
    }

    async fn update(&self, id: Uuid, input: UpdateRole) -> WardenResult<Role> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('role', $id) SET {} \
             WHERE deleted_at = NONE",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "role"))?;

        let touched: Vec<TouchedRow> = result.take(0).map_err(DbError::from)?;
        if touched.is_empty() {
            return Err(DbError::NotFound {
                entity: "role".into(),
                id: id_str,
            }
            .into());
        }

        Ok(self.fetch_one(id).await?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.fetch_one(id).await?;
        let id_str = id.to_string();

        // Edges go first so no reader resolves a half-deleted role.
        let query = format!(
            "DELETE has_role WHERE out = role:`{id_str}`; \
             DELETE grants WHERE in = role:`{id_str}`; \
             UPDATE type::record('role', $id) SET \
             deleted_at = time::now(), is_active = false, \
             updated_at = time::now();"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
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
    ) -> WardenResult<PaginatedResult<Role>> {
        let filter = if active_only {
            "deleted_at = NONE AND is_active = true"
        } else {
            "deleted_at = NONE"
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM role WHERE {filter} GROUP ALL; \
                 SELECT {ROLE_FIELDS} FROM role WHERE {filter} \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset;"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(RoleRow::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn assign_to_user(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<()> {
        let query = format!("RELATE user:`{user_id}` -> has_role -> role:`{role_id}`;");

        let outcome = self
            .db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "role assignment"));

        match outcome {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn unassign_from_user(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<()> {
        self.db
            .query(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_user_roles(&self, user_id: Uuid) -> WardenResult<Vec<Role>> {
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
                 );"
            ))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let order: Vec<AssignedRoleRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;

        let mut by_id = HashMap::new();
        for row in rows {
            let role = row.try_into_role()?;
            by_id.insert(role.id, role);
        }

        let mut roles = Vec::with_capacity(order.len());
        for edge in order {
            let role_id = parse_uuid(&edge.role_id, "role")?;
            if let Some(role) = by_id.remove(&role_id) {
                roles.push(role);
            }
        }

        Ok(roles)
    }
}
