//! User directory queries
//!
//! Credentials live with the upstream auth collaborator; this table only
//! holds what the record engines need to resolve references and pick
//! assignees.

use crate::identity::{Role, User, UserRef};
use crate::{time, Error, Result};
use sqlx::{Executor, QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use uuid::Uuid;

/// Input for [`create_user`]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

impl NewUser {
    pub fn new(username: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            email: None,
            role,
        }
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let role: String = row.get("role");
    Ok(User {
        id: parse_stored_uuid(&id)?,
        username: row.get("username"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        role: role.parse()?,
    })
}

fn parse_stored_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt user id '{}': {}", value, e)))
}

/// Insert a user; duplicate usernames are a [`Error::Conflict`]
pub async fn create_user<'e, E>(executor: E, new_user: NewUser) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let username = new_user.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::InvalidArgument("username is required".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        username,
        full_name: new_user.full_name.trim().to_string(),
        email: new_user.email,
        role: new_user.role,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, username, full_name, email, role, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(time::to_db(time::now()))
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(user),
        Err(e) => {
            let err = Error::from(e);
            if err.is_unique_violation() {
                Err(Error::Conflict(format!("Username already exists: {}", user.username)))
            } else {
                Err(err)
            }
        }
    }
}

pub async fn get_user<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, username, full_name, email, role FROM users WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Users holding a role, in insertion order
pub async fn list_users_by_role<'e, E>(executor: E, role: Role) -> Result<Vec<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, username, full_name, email, role FROM users WHERE role = ? ORDER BY rowid",
    )
    .bind(role.as_str())
    .fetch_all(executor)
    .await?;

    rows.iter().map(user_from_row).collect()
}

/// Resolve ids to populated references. Unknown ids are absent from the map.
pub async fn find_user_refs<'e, E>(executor: E, ids: &[Uuid]) -> Result<HashMap<Uuid, UserRef>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut refs = HashMap::new();
    if ids.is_empty() {
        return Ok(refs);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT id, username, full_name, email, role FROM users WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");

    let rows = builder.build().fetch_all(executor).await?;
    for row in &rows {
        let user = user_from_row(row)?;
        refs.insert(user.id, user.to_ref());
    }
    Ok(refs)
}
