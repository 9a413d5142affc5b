use identity_core::auth::{
    AuthUser, AuthorizationEngine, RequireAdmin, RequireTeacher, Role,
};
use identity_core::test_support::TestIdentity;
use rocket::http::{Header, Status};
use rocket::local::blocking::Client;
use rocket::{get, routes};

#[get("/me")]
fn me(user: AuthUser) -> String {
    user.principal().username.clone()
}

#[get("/staff")]
fn staff(teacher: RequireTeacher) -> String {
    teacher.principal.role.to_string()
}

#[get("/admin")]
fn admin(_admin: RequireAdmin) -> &'static str {
    "ok"
}

#[get("/students/<id>/profile")]
fn profile(id: &str, user: AuthUser) -> Result<String, Status> {
    AuthorizationEngine::ensure_owner_or_privileged(user.principal(), id, Role::Teacher)
        .map(|()| format!("profile of {id}"))
        .map_err(|err| err.status())
}

fn client(identity: &TestIdentity) -> Client {
    let figment = rocket::Config::figment().merge(("log_level", "off"));
    let rocket = rocket::custom(figment)
        .manage(identity.state.clone())
        .mount("/", routes![me, staff, admin, profile]);
    Client::tracked(rocket).expect("valid rocket instance")
}

fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

#[test]
fn missing_or_malformed_credentials_are_unauthorized() {
    let identity = TestIdentity::new();
    let client = client(&identity);

    assert_eq!(client.get("/me").dispatch().status(), Status::Unauthorized);
    assert_eq!(
        client
            .get("/me")
            .header(Header::new("Authorization", "Basic c2FtOnB3"))
            .dispatch()
            .status(),
        Status::Unauthorized
    );
    assert_eq!(
        client.get("/me").header(bearer("a.b.c")).dispatch().status(),
        Status::Unauthorized
    );
}

#[test]
fn valid_token_resolves_the_principal() {
    let identity = TestIdentity::new();
    let client = client(&identity);
    let token = identity
        .state
        .tokens
        .issue("s1", "sam", Role::Student)
        .expect("issue");

    let response = client.get("/me").header(bearer(&token.access_token)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().as_deref(), Some("sam"));
}

#[test]
fn role_guards_enforce_the_hierarchy() {
    let identity = TestIdentity::new();
    let client = client(&identity);
    let tokens = &identity.state.tokens;
    let student = tokens.issue("s1", "sam", Role::Student).expect("issue");
    let teacher = tokens.issue("t1", "terry", Role::Teacher).expect("issue");
    let admin = tokens.issue("a1", "ada", Role::Admin).expect("issue");

    let status = |path: &str, token: &str| {
        client.get(path.to_string()).header(bearer(token)).dispatch().status()
    };

    assert_eq!(status("/staff", &student.access_token), Status::Forbidden);
    assert_eq!(status("/staff", &teacher.access_token), Status::Ok);
    assert_eq!(status("/staff", &admin.access_token), Status::Ok);
    assert_eq!(status("/admin", &teacher.access_token), Status::Forbidden);
    assert_eq!(status("/admin", &admin.access_token), Status::Ok);
}

#[test]
fn revoked_tokens_are_turned_away() {
    let identity = TestIdentity::new();
    let client = client(&identity);
    let token = identity
        .state
        .tokens
        .issue("t1", "terry", Role::Teacher)
        .expect("issue");
    identity.state.tokens.revoke(&token.access_token).expect("revoke");

    let response = client.get("/staff").header(bearer(&token.access_token)).dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn students_only_reach_their_own_profile() {
    let identity = TestIdentity::new();
    let client = client(&identity);
    let tokens = &identity.state.tokens;
    let student = tokens.issue("s1", "sam", Role::Student).expect("issue");
    let teacher = tokens.issue("t1", "terry", Role::Teacher).expect("issue");

    let own = client
        .get("/students/s1/profile")
        .header(bearer(&student.access_token))
        .dispatch();
    assert_eq!(own.status(), Status::Ok);
    assert_eq!(own.into_string().as_deref(), Some("profile of s1"));

    let other = client
        .get("/students/s2/profile")
        .header(bearer(&student.access_token))
        .dispatch();
    assert_eq!(other.status(), Status::Forbidden);

    let by_teacher = client
        .get("/students/s2/profile")
        .header(bearer(&teacher.access_token))
        .dispatch();
    assert_eq!(by_teacher.status(), Status::Ok);
}
