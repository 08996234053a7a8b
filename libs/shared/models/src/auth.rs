use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: Option<String>,
}

/// Claims issued by the external account service.
///
/// The account id travels as `userID` (number or numeric string); `sub` is
/// only consulted when it is numeric.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Option<serde_json::Value>,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub roles: Option<Vec<String>>,
}

impl JwtClaims {
    pub fn account_id(&self) -> Option<i64> {
        let from_claim = match &self.user_id {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        from_claim.or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
    }

    pub fn role_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.role.iter().map(String::as_str).collect();
        if let Some(roles) = &self.roles {
            names.extend(roles.iter().map(String::as_str));
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Consultant,
    Staff,
    Manager,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let name = normalized.strip_prefix("ROLE_").unwrap_or(&normalized);

        match name {
            "CUSTOMER" => Ok(Role::Customer),
            "CONSULTANT" => Ok(Role::Consultant),
            "STAFF" => Ok(Role::Staff),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "CUSTOMER"),
            Role::Consultant => write!(f, "CONSULTANT"),
            Role::Staff => write!(f, "STAFF"),
            Role::Manager => write!(f, "MANAGER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub roles: Vec<Role>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }

    /// Staff, managers and admins operate on records they do not own.
    pub fn is_back_office(&self) -> bool {
        self.has_any_role(&[Role::Staff, Role::Manager, Role::Admin])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_id_from_numeric_and_string_claims() {
        let claims: JwtClaims = serde_json::from_value(json!({ "userID": 42 })).unwrap();
        assert_eq!(claims.account_id(), Some(42));

        let claims: JwtClaims = serde_json::from_value(json!({ "userID": "17" })).unwrap();
        assert_eq!(claims.account_id(), Some(17));

        let claims: JwtClaims = serde_json::from_value(json!({ "sub": "9" })).unwrap();
        assert_eq!(claims.account_id(), Some(9));

        let claims: JwtClaims = serde_json::from_value(json!({ "sub": "not-a-number" })).unwrap();
        assert_eq!(claims.account_id(), None);
    }

    #[test]
    fn test_role_parsing_accepts_spring_prefix() {
        assert_eq!("ROLE_Consultant".parse::<Role>(), Ok(Role::Consultant));
        assert_eq!("manager".parse::<Role>(), Ok(Role::Manager));
        assert!("doctor".parse::<Role>().is_err());
    }
}
