use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::blob::{content_type_for, object_key, BlobError};
use crate::chat::{access, directory};
use crate::db::timestamp;
use crate::error::{ApiError, ApiResult};
use crate::models::AuthUser;
use crate::routes::require_field;
use crate::AppState;

struct UploadedImage {
    filename: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    image: Option<UploadedImage>,
    conversation_id: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".into())
    } else {
        ApiError::validation(err.body_text())
    }
}

/// Drain the form, keeping the first file under one of `file_fields`.
async fn read_form(
    state: &AppState,
    mut multipart: Multipart,
    file_fields: &[&str],
) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name == "conversationId" {
            form.conversation_id = Some(field.text().await.map_err(multipart_error)?);
            continue;
        }
        if !file_fields.contains(&field_name.as_str()) || form.image.is_some() {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::validation("Only image uploads are allowed"));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() as u64 > state.config.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File too large. Max size: {} MB",
                state.config.max_upload_bytes / 1_048_576
            )));
        }

        form.image = Some(UploadedImage {
            filename,
            content_type,
            data,
        });
    }

    Ok(form)
}

async fn store(
    state: &AppState,
    prefix: &str,
    owner: &str,
    image: UploadedImage,
) -> ApiResult<String> {
    let key = object_key(prefix, owner, &image.filename);
    Ok(state.blobs.put(&key, image.data, &image.content_type).await?)
}

/// POST /files/avatar
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_form(&state, multipart, &["avatar"]).await?;
    let image = form
        .image
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;

    let url = store(&state, "avatars", &user.id, image).await?;

    sqlx::query(r#"UPDATE "users" SET avatar = ?, updated_at = ? WHERE id = ?"#)
        .bind(&url)
        .bind(timestamp())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Avatar uploaded successfully",
        "avatar": url,
    })))
}

/// POST /files/image
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_form(&state, multipart, &["image", "avatar"]).await?;
    let image = form
        .image
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;

    let url = store(&state, "images", &user.id, image).await?;
    Ok(Json(serde_json::json!({"imageUrl": url})))
}

/// POST /files/groupAvatar
pub async fn upload_group_avatar(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_form(&state, multipart, &["avatar"]).await?;
    let conversation_id = require_field(form.conversation_id, "Conversation ID is required")?;
    let image = form
        .image
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;

    // Check authority before the bytes go anywhere
    {
        let mut conn = state.db.acquire().await?;
        let conversation = access::require_conversation(&mut conn, &conversation_id).await?;
        access::require_admin(&mut conn, &user.id, &conversation.id).await?;
    }

    let url = store(&state, "groups", &conversation_id, image).await?;

    let mut conn = state.db.acquire().await?;
    let conversation =
        directory::set_group_avatar(&mut conn, &user.id, &conversation_id, &url).await?;

    Ok(Json(serde_json::json!({
        "message": "Group avatar uploaded successfully",
        "conversation": conversation,
    })))
}

/// GET /uploads/*key
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state
        .blobs
        .as_local()
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = match store.open(&key).await {
        Ok(f) => f,
        Err(BlobError::Io(_)) | Err(BlobError::InvalidKey(_)) => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(e.into()),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&key)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        body,
    ))
}
