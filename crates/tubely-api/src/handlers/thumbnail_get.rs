use crate::error::{ErrorResponse, HttpAppError};
use crate::state::MediaState;
use crate::utils::upload::parse_video_id;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use tubely_core::AppError;
use tubely_storage::ThumbnailError;

/// Serve a thumbnail held by the configured thumbnail store.
#[utoipa::path(
    get,
    path = "/thumbnails/{id}",
    tag = "thumbnails",
    params(
        ("id" = String, Path, description = "Video ID (UUID)")
    ),
    responses(
        (status = 200, description = "Thumbnail image bytes with its stored Content-Type"),
        (status = 400, description = "Invalid ID", body = ErrorResponse),
        (status = 404, description = "Thumbnail not found", body = ErrorResponse)
    )
)]
pub async fn get_thumbnail(
    Path(id): Path<String>,
    State(media): State<MediaState>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video_id = parse_video_id(&id)?;

    let thumbnail = media
        .thumbnails
        .fetch(video_id)
        .await
        .map_err(|e| match e {
            ThumbnailError::NotFound(_) => AppError::NotFound("Thumbnail not found".to_string()),
            other => AppError::Internal(format!("Failed to load thumbnail: {}", other)),
        })?;

    Ok((
        [(header::CONTENT_TYPE, thumbnail.content_type)],
        thumbnail.data,
    ))
}
