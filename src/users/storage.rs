use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::users;
use crate::users::types::{DepartmentMembership, Role, User};

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub department_ids: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn db_user_to_user(db: DbUser) -> User {
    let role: Role = db.role.parse().unwrap_or_default();
    let department_ids: DepartmentMembership =
        serde_json::from_value(db.department_ids).unwrap_or_default();

    User {
        id: db.id,
        name: db.name,
        email: db.email,
        role,
        department_ids,
        created_at: db.created_at,
        updated_at: db.updated_at,
    }
}
