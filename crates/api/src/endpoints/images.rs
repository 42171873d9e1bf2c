//! Image upload and retrieval endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use quill_common::{AppError, AppResult};
use quill_core::{ImageUpload, UpdateImageInput};
use quill_db::{
    entities::{image, image::ImageType},
    repositories::ImageStats,
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Page, no_content},
};

/// Image metadata response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub id: String,
    pub file_name: String,
    pub stored_file_name: String,
    pub content_type: String,
    pub file_size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    pub image_type: ImageType,
    pub uploader_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<image::Model> for ImageResponse {
    fn from(i: image::Model) -> Self {
        Self {
            url: format!("/api/v1/images/{}/file", i.id),
            id: i.id,
            file_name: i.file_name,
            stored_file_name: i.stored_file_name,
            content_type: i.content_type,
            file_size: i.file_size,
            width: i.width,
            height: i.height,
            image_type: i.image_type,
            uploader_id: i.uploader_id,
            alt_text: i.alt_text,
            description: i.description,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

fn parse_image_type(text: &str) -> AppResult<ImageType> {
    match text.trim().to_ascii_uppercase().as_str() {
        "PROFILE_PICTURE" => Ok(ImageType::ProfilePicture),
        "FEATURED_IMAGE" => Ok(ImageType::FeaturedImage),
        other => Err(AppError::BadRequest(format!("Invalid image type: {other}"))),
    }
}

/// Fields of an upload form.
struct UploadForm {
    upload: ImageUpload,
    image_type: Option<ImageType>,
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut image_type = None;
    let mut alt_text = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some((file_name, content_type, data));
            }
            "imageType" => {
                let text = field.text().await.map_err(multipart_error)?;
                image_type = Some(parse_image_type(&text)?);
            }
            "altText" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.is_empty() {
                    alt_text = Some(text);
                }
            }
            "description" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.is_empty() {
                    description = Some(text);
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    Ok(UploadForm {
        upload: ImageUpload {
            file_name,
            content_type,
            data,
            alt_text,
            description,
        },
        image_type,
    })
}

async fn upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<ImageResponse>> {
    let form = read_upload_form(multipart).await?;
    let image_type = form.image_type.unwrap_or(ImageType::FeaturedImage);
    let image = state.image_service.upload(&user, image_type, form.upload).await?;
    Ok(ApiResponse::created(image.into()))
}

async fn upload_profile_picture(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<ImageResponse>> {
    let form = read_upload_form(multipart).await?;
    let image = state
        .image_service
        .upload_profile_picture(&user, form.upload)
        .await?;
    Ok(ApiResponse::created(image.into()))
}

async fn show(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ImageResponse>> {
    let image = state.image_service.get(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(image.into()))
}

async fn file(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let (image, data) = state.image_service.file(viewer.as_ref(), &id).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], data))
}

async fn profile_picture(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<ImageResponse>> {
    let image = state.image_service.profile_picture(&user, &user_id).await?;
    Ok(ApiResponse::ok(image.into()))
}

async fn by_uploader(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(uploader_id): Path<String>,
) -> AppResult<ApiResponse<Vec<ImageResponse>>> {
    let images = state.image_service.by_uploader(&user, &uploader_id).await?;
    Ok(ApiResponse::ok(images.into_iter().map(Into::into).collect()))
}

async fn uploader_stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(uploader_id): Path<String>,
) -> AppResult<ApiResponse<ImageStats>> {
    let stats = state.image_service.uploader_stats(&user, &uploader_id).await?;
    Ok(ApiResponse::ok(stats))
}

async fn by_type(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(image_type): Path<ImageType>,
) -> AppResult<ApiResponse<Vec<ImageResponse>>> {
    let images = state.image_service.by_type(&user, image_type).await?;
    Ok(ApiResponse::ok(images.into_iter().map(Into::into).collect()))
}

async fn type_stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(image_type): Path<ImageType>,
) -> AppResult<ApiResponse<ImageStats>> {
    let stats = state.image_service.type_stats(&user, image_type).await?;
    Ok(ApiResponse::ok(stats))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: u64,
    #[serde(default = "default_size")]
    size: u64,
}

const fn default_size() -> u64 {
    20
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> AppResult<ApiResponse<Page<ImageResponse>>> {
    let size = q.size.clamp(1, 100);
    let (images, total) = state.image_service.list(&user, q.page, size).await?;
    let items = images.into_iter().map(Into::into).collect();
    Ok(ApiResponse::ok(Page::new(items, q.page, size, total)))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateImageInput>,
) -> AppResult<ApiResponse<ImageResponse>> {
    let image = state.image_service.update(&user, &id, input).await?;
    Ok(ApiResponse::ok(image.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.image_service.delete(&user, &id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/upload", post(upload))
        .route("/profile-picture", post(upload_profile_picture))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/file", get(file))
        .route("/profile/{user_id}", get(profile_picture))
        .route("/user/{uploader_id}", get(by_uploader))
        .route("/user/{uploader_id}/stats", get(uploader_stats))
        .route("/type/{image_type}", get(by_type))
        .route("/type/{image_type}/stats", get(type_stats))
}
