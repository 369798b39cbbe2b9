use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::ingest::Upload;
use crate::state::MediaState;
use crate::utils::upload::{missing_field, multipart_error, parse_video_id};
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use tubely_core::Video;
use tubely_processing::AssetClass;

#[utoipa::path(
    post,
    path = "/videos/{id}/thumbnail",
    tag = "thumbnails",
    params(
        ("id" = String, Path, description = "Video ID (UUID)")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Form field `thumbnail` with a JPEG or PNG image"),
    responses(
        (status = 200, description = "Thumbnail uploaded", body = Video),
        (status = 400, description = "Invalid ID or form", body = ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 403, description = "Caller does not own the video", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Not a JPEG or PNG", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(
    skip(media, multipart),
    fields(user_id = %user.user_id, video_id = %id, operation = "upload_thumbnail")
)]
pub async fn upload_thumbnail(
    user: AuthUser,
    Path(id): Path<String>,
    State(media): State<MediaState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let video_id = parse_video_id(&id)?;
    let field_name = AssetClass::Thumbnail.form_field();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let upload = Upload::new(content_type, field.map_err(multipart_error));
        let video: Video = media
            .ingest
            .ingest_thumbnail(user.user_id, video_id, upload)
            .await?;

        return Ok(Json(video));
    }

    Err(missing_field(field_name).into())
}
