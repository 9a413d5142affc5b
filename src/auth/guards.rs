use std::marker::PhantomData;

use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};

use crate::auth::{AuthError, AuthResult, AuthState, AuthorizationEngine, Principal, Role};

/// Caller authenticated by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    pub fn principal(&self) -> &Principal {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_principal(request).await {
            Ok(principal) => Outcome::Success(AuthUser(principal)),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

/// Marker naming the least privileged role a route accepts.
pub trait MinimumRole: Send + Sync + 'static {
    const ROLE: Role;
}

#[derive(Debug, Clone, Copy)]
pub struct TeacherLevel;
#[derive(Debug, Clone, Copy)]
pub struct AdminLevel;
#[derive(Debug, Clone, Copy)]
pub struct SuperAdminLevel;

impl MinimumRole for TeacherLevel {
    const ROLE: Role = Role::Teacher;
}

impl MinimumRole for AdminLevel {
    const ROLE: Role = Role::Admin;
}

impl MinimumRole for SuperAdminLevel {
    const ROLE: Role = Role::SuperAdmin;
}

/// Caller whose role ranks at least `R::ROLE`.
#[derive(Debug, Clone)]
pub struct RequireRole<R: MinimumRole> {
    pub principal: Principal,
    _level: PhantomData<R>,
}

pub type RequireTeacher = RequireRole<TeacherLevel>;
pub type RequireAdmin = RequireRole<AdminLevel>;
pub type RequireSuperAdmin = RequireRole<SuperAdminLevel>;

#[rocket::async_trait]
impl<'r, R: MinimumRole> FromRequest<'r> for RequireRole<R> {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(request).await {
            Outcome::Success(AuthUser(principal)) => {
                match AuthorizationEngine::require(&principal, R::ROLE) {
                    Ok(()) => Outcome::Success(RequireRole {
                        principal,
                        _level: PhantomData,
                    }),
                    Err(err) => Outcome::Error((err.status(), err)),
                }
            }
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(_) => Outcome::Error((Status::Unauthorized, AuthError::Unauthorized)),
        }
    }
}

async fn extract_principal(request: &Request<'_>) -> AuthResult<Principal> {
    let token = bearer_token_from_request(request)?;

    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    auth_state.authorization.authenticate(token)
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::Unauthorized)?;
    parse_bearer(header)
}

fn parse_bearer(header: &str) -> AuthResult<&str> {
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::Unauthorized)
    }
}
