use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tubely_core::AppError;
use uuid::Uuid;

/// Parse a `{id}` path segment.
pub fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Ok(Uuid::parse_str(raw.trim())?)
}

/// Map a multipart read failure. Bodies cut off by the request limit become 413.
pub fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart: {}", err.body_text()))
    }
}

pub fn missing_field(field_name: &str) -> AppError {
    AppError::BadRequest(format!("Missing form field '{}'", field_name))
}
