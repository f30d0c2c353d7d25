//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::{CreatePermission, Permission, UpdatePermission};
use warden_core::repository::{PaginatedResult, Pagination, PermissionRepository};

use super::{CountRow, TouchedRow, parse_uuid};
use crate::error::DbError;

pub(super) const PERMISSION_FIELDS: &str = "meta::id(id) AS record_id, name, resource, \
                                            action, description, created_at, updated_at";

const RESOURCE_ACTION_INDEX: &str = "idx_permission_resource_action";

#[derive(Debug, SurrealValue)]
pub(super) struct PermissionRow {
    record_id: String,
    name: String,
    resource: String,
    action: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    pub(super) fn try_into_permission(self) -> Result<Permission, DbError> {
        Ok(Permission {
            id: parse_uuid(&self.record_id, "permission")?,
            name: self.name,
            resource: self.resource,
            action: self.action,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// One `grants` edge as `(role, permission)` ids.
#[derive(Debug, SurrealValue)]
pub(super) struct RoleGrantRow {
    pub(super) role_id: String,
    pub(super) permission_id: String,
}

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    resource: String,
}

#[derive(Debug, SurrealValue)]
struct ActionRow {
    action: String,
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, id: Uuid) -> Result<Permission, DbError> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(format!(
                "SELECT {PERMISSION_FIELDS} FROM type::record('permission', $id) \
                 WHERE deleted_at = NONE"
            ))
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<PermissionRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "permission".into(),
                id: id_str,
            })?
            .try_into_permission()
    }

    /// Whether any row, live or soft-deleted, holds `(resource, action)`.
    async fn pair_taken(&self, resource: &str, action: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM permission \
                 WHERE resource = $resource AND action = $action GROUP ALL",
            )
            .bind(("resource", resource.to_string()))
            .bind(("action", action.to_string()))
            .await?;

        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> WardenResult<Permission> {
        let id = Uuid::new_v4();
        let resource = input.resource.clone();
        let action = input.action.clone();

        let outcome = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 name = $name, resource = $resource, \
                 action = $action, description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("resource", input.resource))
            .bind(("action", input.action))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "permission"));

        match outcome {
            Ok(_) => {}
            // The name index may fire before the pair index, so ask
            // about the pair directly, soft-deleted rows included.
            Err(DbError::Conflict { detail, .. }) => {
                if detail.contains(RESOURCE_ACTION_INDEX)
                    || self.pair_taken(&resource, &action).await?
                {
                    return Err(WardenError::DuplicatePermission { resource, action });
                }
                return Err(WardenError::AlreadyExists {
                    entity: "permission".into(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Permission> {
        Ok(self.fetch_one(id).await?)
    }

    async fn get_by_name(&self, name: &str) -> WardenResult<Permission> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {PERMISSION_FIELDS} FROM permission \
                 WHERE name = $name AND deleted_at = NONE"
            ))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: format!("name={name}"),
        })?;

        Ok(row.try_into_permission()?)
    }

    async fn get_by_resource_action(&self, resource: &str, action: &str) -> WardenResult<Permission> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {PERMISSION_FIELDS} FROM permission \
                 WHERE resource = $resource AND action = $action \
                 AND deleted_at = NONE"
            ))
            .bind(("resource", resource.to_string()))
            .bind(("action", action.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: format!("{resource}:{action}"),
        })?;

        Ok(row.try_into_permission()?)
    }

    async fn update(&self, id: Uuid, input: UpdatePermission) -> WardenResult<Permission> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('permission', $id) SET {} \
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

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "permission"))?;

        let touched: Vec<TouchedRow> = result.take(0).map_err(DbError::from)?;
        if touched.is_empty() {
            return Err(DbError::NotFound {
                entity: "permission".into(),
                id: id_str,
            }
            .into());
        }

        Ok(self.fetch_one(id).await?)
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        self.fetch_one(id).await?;
        let id_str = id.to_string();

        let query = format!(
            "DELETE grants WHERE out = permission:`{id_str}`; \
             UPDATE type::record('permission', $id) SET \
             deleted_at = time::now(), updated_at = time::now();"
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
        resource: Option<&str>,
    ) -> WardenResult<PaginatedResult<Permission>> {
        let filter = if resource.is_some() {
            "deleted_at = NONE AND resource = $resource"
        } else {
            "deleted_at = NONE"
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permission WHERE {filter} GROUP ALL; \
                 SELECT {PERMISSION_FIELDS} FROM permission WHERE {filter} \
                 ORDER BY resource ASC, action ASC \
                 LIMIT $limit START $offset;"
            ))
            .bind(("resource", resource.map(str::to_string)))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<PermissionRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(PermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_resources(&self) -> WardenResult<Vec<String>> {
        let mut result = self
            .db
            .query(
                "SELECT resource FROM permission WHERE deleted_at = NONE \
                 GROUP BY resource ORDER BY resource ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.resource).collect())
    }

    async fn list_resource_actions(&self, resource: &str) -> WardenResult<Vec<String>> {
        let mut result = self
            .db
            .query(
                "SELECT action FROM permission \
                 WHERE resource = $resource AND deleted_at = NONE \
                 GROUP BY action ORDER BY action ASC",
            )
            .bind(("resource", resource.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ActionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.action).collect())
    }

    async fn grant_to_role(&self, role_id: Uuid, permission_id: Uuid) -> WardenResult<()> {
        let query = format!("RELATE role:`{role_id}` -> grants -> permission:`{permission_id}`;");

        let outcome = self
            .db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "permission grant"));

        match outcome {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn revoke_from_role(&self, role_id: Uuid, permission_id: Uuid) -> WardenResult<()> {
        self.db
            .query(
                "DELETE grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $permission_id)",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("permission_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> WardenResult<Vec<Permission>> {
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
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(PermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
