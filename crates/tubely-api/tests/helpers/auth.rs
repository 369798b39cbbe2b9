use chrono::Duration;
use tubely_api::auth::JwtService;
use uuid::Uuid;

/// Signing secret shared by the test router and token helpers.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// `Authorization` header value for `user_id`.
pub fn bearer(jwt: &JwtService, user_id: Uuid) -> String {
    let token = jwt
        .issue(user_id, Duration::hours(1))
        .expect("Failed to issue test token");
    format!("Bearer {}", token)
}
