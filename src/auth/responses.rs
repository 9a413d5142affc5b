use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::auth::directory::UserRecord;
use crate::auth::tokens::IssuedToken;

#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            last_login_at: user.last_login_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_passwords() {
        let login = LoginRequest {
            username: "alice".into(),
            password: "correct-pw".into(),
        };
        assert!(!format!("{login:?}").contains("correct-pw"));

        let register = RegisterRequest {
            username: "alice".into(),
            email: "alice@school.test".into(),
            password: "correct-pw".into(),
            role: Role::Teacher,
            display_name: None,
        };
        assert!(!format!("{register:?}").contains("correct-pw"));
    }

    #[test]
    fn login_response_flattens_token_metadata() {
        let response = LoginResponse {
            token: IssuedToken {
                access_token: "a.b.c".into(),
                token_type: "Bearer".into(),
                expires_in: 900,
                expires_at: Utc::now(),
                token_id: "jti".into(),
            },
            user: UserSummary {
                id: "u1".into(),
                username: "alice".into(),
                email: "alice@school.test".into(),
                display_name: None,
                role: Role::Teacher,
                last_login_at: None,
            },
        };
        let json = serde_json::to_value(&response).expect("json");
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["expires_in"], 900);
        assert_eq!(json["user"]["role"], "TEACHER");
        assert!(json.get("token_id").is_none());
    }
}
