use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    User,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manager => write!(f, "manager"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    /// Accepts the legacy Arabic spellings still present in old records.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" | "مدير" => Ok(Self::Manager),
            "user" | "مستخدم" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Department membership of a user.
///
/// Persisted records come in three shapes: the current JSON array of ids,
/// the legacy singular `departmentId` string, and null/absent. All of them
/// deserialize into the same id list here, so no caller ever sees the
/// legacy shape. Ids that are not valid UUIDs (pre-migration artifacts) are
/// dropped at read time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DepartmentMembership(pub Vec<Uuid>);

impl DepartmentMembership {
    pub fn contains(&self, id: Uuid) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Uuid>> for DepartmentMembership {
    fn from(ids: Vec<Uuid>) -> Self {
        Self(ids)
    }
}

impl<'de> Deserialize<'de> for DepartmentMembership {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self(normalize_membership(&value)))
    }
}

fn normalize_membership(value: &serde_json::Value) -> Vec<Uuid> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(|s| s.parse().ok())
            .collect(),
        serde_json::Value::String(s) => s.parse().ok().into_iter().collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department_ids: DepartmentMembership,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub department_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub department_ids: Option<Vec<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_reads_current_array_shape() {
        let id = Uuid::new_v4();
        let value = serde_json::json!([id.to_string()]);
        let m: DepartmentMembership = serde_json::from_value(value).unwrap();
        assert!(m.contains(id));
    }

    #[test]
    fn membership_reads_legacy_singular_shape() {
        let id = Uuid::new_v4();
        let value = serde_json::json!(id.to_string());
        let m: DepartmentMembership = serde_json::from_value(value).unwrap();
        assert_eq!(m.0, vec![id]);
    }

    #[test]
    fn membership_reads_null_and_garbage_as_empty() {
        let m: DepartmentMembership = serde_json::from_value(serde_json::json!(null)).unwrap();
        assert!(m.is_empty());
        let m: DepartmentMembership =
            serde_json::from_value(serde_json::json!(["not-a-uuid"])).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn membership_serializes_as_plain_array() {
        let id = Uuid::new_v4();
        let m = DepartmentMembership(vec![id]);
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            serde_json::json!([id.to_string()])
        );
    }

    #[test]
    fn role_parses_legacy_arabic_spellings() {
        assert_eq!("مدير".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!("مستخدم".parse::<Role>().unwrap(), Role::User);
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("admin".parse::<Role>().is_err());
    }
}
