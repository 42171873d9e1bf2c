//! Image upload, processing and access control.

use std::{io::Cursor, path::Path, sync::Arc};

use chrono::Utc;
use image::{GenericImageView, ImageFormat, imageops::FilterType};
use quill_common::{
    AppError, AppResult, IdGenerator, StorageBackend, generate_stored_file_name,
};
use quill_db::{
    entities::{image as image_entity, image::ImageType, user},
    repositories::{ImageRepository, ImageStats},
};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

use super::user::{UserService, ensure_staff};

/// Largest stored width; wider images are scaled down.
pub const MAX_WIDTH: u32 = 1920;
/// Largest stored height; taller images are scaled down.
pub const MAX_HEIGHT: u32 = 1080;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub alt_text: Option<String>,
    pub description: Option<String>,
}

/// Editable image metadata.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageInput {
    #[validate(length(max = 255, message = "Alt text must not exceed 255 characters"))]
    pub alt_text: Option<String>,

    #[validate(length(max = 1000, message = "Description must not exceed 1000 characters"))]
    pub description: Option<String>,
}

/// Result of decoding and, if needed, downscaling an upload.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Check an upload's size, content type and extension.
///
/// Returns the decoder format and the lowercase extension to store under.
pub fn validate_upload(
    file_name: &str,
    content_type: &str,
    size: usize,
    max_size: usize,
) -> AppResult<(ImageFormat, String)> {
    if size == 0 {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    if size > max_size {
        return Err(AppError::BadRequest(format!(
            "File size {size} exceeds the maximum of {max_size} bytes"
        )));
    }

    let content_type = content_type.to_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported content type: {content_type}"
        )));
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported file extension: {file_name}")))?;

    let format = match content_type.as_str() {
        "image/png" => ImageFormat::Png,
        "image/gif" => ImageFormat::Gif,
        "image/webp" => ImageFormat::WebP,
        _ => ImageFormat::Jpeg,
    };
    Ok((format, extension))
}

/// Decode an image and scale it to fit within [`MAX_WIDTH`] x [`MAX_HEIGHT`].
///
/// Images already within bounds keep their original bytes. Larger ones are
/// resized with Lanczos3, preserving aspect ratio, and re-encoded in `format`.
pub fn process_image(data: &[u8], format: ImageFormat) -> AppResult<ProcessedImage> {
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| AppError::BadRequest(format!("Invalid image file: {e}")))?;
    let (width, height) = img.dimensions();

    if width <= MAX_WIDTH && height <= MAX_HEIGHT {
        return Ok(ProcessedImage {
            data: data.to_vec(),
            width,
            height,
        });
    }

    let resized = img.resize(MAX_WIDTH, MAX_HEIGHT, FilterType::Lanczos3);
    let mut buffer = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| AppError::Internal(format!("Failed to encode image: {e}")))?;

    let (width, height) = resized.dimensions();
    Ok(ProcessedImage {
        data: buffer,
        width,
        height,
    })
}

/// Image service.
#[derive(Clone)]
pub struct ImageService {
    image_repo: ImageRepository,
    user_service: UserService,
    storage: Arc<dyn StorageBackend>,
    max_file_size: usize,
    id_gen: IdGenerator,
}

impl ImageService {
    /// Create a new image service.
    #[must_use]
    pub fn new(
        image_repo: ImageRepository,
        user_service: UserService,
        storage: Arc<dyn StorageBackend>,
        max_file_size: usize,
    ) -> Self {
        Self {
            image_repo,
            user_service,
            storage,
            max_file_size,
            id_gen: IdGenerator::new(),
        }
    }

    /// Validate, process, store and record an upload.
    pub async fn upload(
        &self,
        uploader: &user::Model,
        image_type: ImageType,
        upload: ImageUpload,
    ) -> AppResult<image_entity::Model> {
        let (format, extension) = validate_upload(
            &upload.file_name,
            &upload.content_type,
            upload.data.len(),
            self.max_file_size,
        )?;

        let data = upload.data;
        let processed = tokio::task::spawn_blocking(move || process_image(&data, format))
            .await
            .map_err(|e| AppError::Internal(format!("Image processing task failed: {e}")))??;

        let now = Utc::now();
        let stored_name = generate_stored_file_name(now, &self.id_gen.generate_short(), &extension);
        let stored = self.storage.store(&stored_name, &processed.data).await?;

        let model = image_entity::ActiveModel {
            id: Set(self.id_gen.generate()),
            file_name: Set(upload.file_name),
            stored_file_name: Set(stored.key.clone()),
            file_path: Set(stored.path.to_string_lossy().into_owned()),
            content_type: Set(upload.content_type.to_lowercase()),
            file_size: Set(i64::try_from(stored.size).unwrap_or(i64::MAX)),
            width: Set(i32::try_from(processed.width).ok()),
            height: Set(i32::try_from(processed.height).ok()),
            image_type: Set(image_type),
            uploader_id: Set(uploader.id.clone()),
            alt_text: Set(upload.alt_text),
            description: Set(upload.description),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        match self.image_repo.create(model).await {
            Ok(image) => {
                tracing::info!(
                    image_id = %image.id,
                    uploader_id = %uploader.id,
                    size = image.file_size,
                    "Image uploaded"
                );
                Ok(image)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored.key).await {
                    tracing::warn!(key = %stored.key, error = %cleanup, "Failed to remove orphaned file");
                }
                Err(e)
            }
        }
    }

    /// Replace the caller's profile picture.
    pub async fn upload_profile_picture(
        &self,
        user: &user::Model,
        upload: ImageUpload,
    ) -> AppResult<image_entity::Model> {
        validate_upload(
            &upload.file_name,
            &upload.content_type,
            upload.data.len(),
            self.max_file_size,
        )?;

        let image = self.upload(user, ImageType::ProfilePicture, upload).await?;
        let replaced = self
            .image_repo
            .deactivate_by_uploader_and_type(&user.id, ImageType::ProfilePicture, &image.id)
            .await?;

        self.user_service
            .set_profile_picture(
                &user.id,
                self.storage.public_url(&image.stored_file_name),
                image.stored_file_name.clone(),
            )
            .await?;

        tracing::debug!(user_id = %user.id, replaced, "Profile picture updated");
        Ok(image)
    }

    /// Image metadata, subject to access rules.
    pub async fn get(&self, viewer: Option<&user::Model>, id: &str) -> AppResult<image_entity::Model> {
        let image = self.image_repo.get_active(id).await?;
        ensure_can_view(viewer, &image)?;
        Ok(image)
    }

    /// Image bytes, subject to access rules.
    pub async fn file(
        &self,
        viewer: Option<&user::Model>,
        id: &str,
    ) -> AppResult<(image_entity::Model, Vec<u8>)> {
        let image = self.get(viewer, id).await?;
        let data = self.storage.read(&image.stored_file_name).await?;
        Ok((image, data))
    }

    /// Current profile picture of a user.
    pub async fn profile_picture(
        &self,
        viewer: &user::Model,
        user_id: &str,
    ) -> AppResult<image_entity::Model> {
        ensure_self_or_staff(viewer, user_id)?;
        self.image_repo
            .find_active_by_uploader_and_type(user_id, ImageType::ProfilePicture)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ImageNotFound(format!("profile picture of user {user_id}")))
    }

    /// Active images of an uploader.
    pub async fn by_uploader(
        &self,
        viewer: &user::Model,
        uploader_id: &str,
    ) -> AppResult<Vec<image_entity::Model>> {
        ensure_self_or_staff(viewer, uploader_id)?;
        self.image_repo.find_active_by_uploader(uploader_id).await
    }

    /// Active images of a type.
    pub async fn by_type(
        &self,
        viewer: &user::Model,
        image_type: ImageType,
    ) -> AppResult<Vec<image_entity::Model>> {
        ensure_staff(viewer)?;
        self.image_repo.find_active_by_type(image_type).await
    }

    /// One page (zero-based) of active images and the total count.
    pub async fn list(
        &self,
        viewer: &user::Model,
        page: u64,
        size: u64,
    ) -> AppResult<(Vec<image_entity::Model>, u64)> {
        ensure_staff(viewer)?;
        self.image_repo
            .find_active_paged(page, size.clamp(1, 100))
            .await
    }

    /// Edit alt text and description.
    pub async fn update(
        &self,
        actor: &user::Model,
        id: &str,
        input: UpdateImageInput,
    ) -> AppResult<image_entity::Model> {
        input.validate()?;
        let image = self.image_repo.get_active(id).await?;
        ensure_owner_or_admin(actor, &image)?;

        let mut model = image.into_active_model();
        if let Some(alt_text) = input.alt_text {
            model.alt_text = Set(Some(alt_text));
        }
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        model.updated_at = Set(Some(Utc::now().into()));
        self.image_repo.update(model).await
    }

    /// Soft-delete an image. The stored file stays on disk.
    pub async fn delete(&self, actor: &user::Model, id: &str) -> AppResult<()> {
        let image = self.image_repo.get_active(id).await?;
        ensure_owner_or_admin(actor, &image)?;

        let mut model = image.into_active_model();
        model.is_active = Set(false);
        model.updated_at = Set(Some(Utc::now().into()));
        let image = self.image_repo.update(model).await?;

        tracing::info!(image_id = %image.id, by = %actor.id, "Image deactivated");
        Ok(())
    }

    /// Count and total size of a user's active images.
    pub async fn uploader_stats(
        &self,
        viewer: &user::Model,
        uploader_id: &str,
    ) -> AppResult<ImageStats> {
        ensure_self_or_staff(viewer, uploader_id)?;
        self.image_repo.stats_by_uploader(uploader_id).await
    }

    /// Count and total size of active images of a type.
    pub async fn type_stats(&self, viewer: &user::Model, image_type: ImageType) -> AppResult<ImageStats> {
        ensure_staff(viewer)?;
        self.image_repo.stats_by_type(image_type).await
    }
}

fn ensure_can_view(viewer: Option<&user::Model>, image: &image_entity::Model) -> AppResult<()> {
    if image.is_public() {
        return Ok(());
    }
    match viewer {
        Some(v) if v.is_staff() || v.id == image.uploader_id => Ok(()),
        _ => Err(AppError::Forbidden(
            "Access denied. Only featured images are publicly accessible.".to_string(),
        )),
    }
}

fn ensure_self_or_staff(viewer: &user::Model, user_id: &str) -> AppResult<()> {
    if viewer.is_staff() || viewer.id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied.".to_string()))
    }
}

fn ensure_owner_or_admin(actor: &user::Model, image: &image_entity::Model) -> AppResult<()> {
    if actor.is_admin() || actor.id == image.uploader_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the uploader or an admin may change this image".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{exec, image as image_row, user};
    use image::{ImageBuffer, Rgb};
    use quill_common::LocalStorage;
    use quill_db::{entities::user::UserRole, repositories::UserRepository};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([200u8, 40, 40]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn temp_storage() -> LocalStorage {
        let dir = std::env::temp_dir().join(format!("quill-images-{}", uuid::Uuid::new_v4()));
        LocalStorage::new(dir, "/uploads/images".to_string())
    }

    fn service(db: DatabaseConnection, storage: LocalStorage) -> ImageService {
        let db = Arc::new(db);
        ImageService::new(
            ImageRepository::new(Arc::clone(&db)),
            UserService::new(UserRepository::new(db)),
            Arc::new(storage),
            5 * 1024 * 1024,
        )
    }

    fn upload(data: Vec<u8>) -> ImageUpload {
        ImageUpload {
            file_name: "photo.PNG".to_string(),
            content_type: "image/png".to_string(),
            data,
            alt_text: Some("A photo".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_validate_upload_rules() {
        let max = 5 * 1024 * 1024;
        assert!(validate_upload("a.png", "image/png", 0, max).is_err());
        assert!(validate_upload("a.png", "image/png", max + 1, max).is_err());
        assert!(validate_upload("a.bmp", "image/png", 10, max).is_err());
        assert!(validate_upload("a.png", "application/pdf", 10, max).is_err());
        assert!(validate_upload("noext", "image/png", 10, max).is_err());

        let (format, ext) = validate_upload("Photo.JPG", "image/jpg", 10, max).unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!(ext, "jpg");
    }

    #[test]
    fn test_small_image_kept_as_is() {
        let data = png(8, 6);
        let processed = process_image(&data, ImageFormat::Png).unwrap();
        assert_eq!((processed.width, processed.height), (8, 6));
        assert_eq!(processed.data, data);
    }

    #[test]
    fn test_large_image_scaled_to_fit() {
        let processed = process_image(&png(2400, 100), ImageFormat::Png).unwrap();
        assert_eq!(processed.width, MAX_WIDTH);
        assert_eq!(processed.height, 80);

        let decoded = image::load_from_memory(&processed.data).unwrap();
        assert_eq!(decoded.dimensions(), (MAX_WIDTH, 80));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            process_image(b"not an image", ImageFormat::Png),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_metadata() {
        let storage = temp_storage();
        let root = storage.base_path().to_path_buf();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[image_row("i1", "u1", ImageType::FeaturedImage)]])
            .into_connection();
        let service = service(db, storage);

        let stored = service
            .upload(
                &user("u1", UserRole::User),
                ImageType::FeaturedImage,
                upload(png(4, 4)),
            )
            .await
            .unwrap();
        assert_eq!(stored.id, "i1");

        let files: Vec<_> = std::fs::read_dir(&root).unwrap().collect();
        assert_eq!(files.len(), 1);
        let name = files[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().ends_with(".png"));

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_profile_picture_replaces_previous() {
        let storage = temp_storage();
        let root = storage.base_path().to_path_buf();
        let mut updated_user = user("u1", UserRole::User);
        updated_user.profile_picture_url = Some("/uploads/images/x.png".to_string());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .append_query_results([[image_row("i2", "u1", ImageType::ProfilePicture)]])
                .append_query_results([[user("u1", UserRole::User)], [updated_user]])
                .into_connection(),
        );
        let service = ImageService::new(
            ImageRepository::new(Arc::clone(&db)),
            UserService::new(UserRepository::new(Arc::clone(&db))),
            Arc::new(storage),
            5 * 1024 * 1024,
        );

        let image = service
            .upload_profile_picture(&user("u1", UserRole::User), upload(png(4, 4)))
            .await
            .unwrap();
        assert_eq!(image.image_type, ImageType::ProfilePicture);
        drop(service);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log[0].statements()[0].sql.starts_with("INSERT INTO \"image\""));
        let deactivate = &log[1].statements()[0].sql;
        assert!(deactivate.starts_with("UPDATE \"image\""));
        assert!(deactivate.contains("\"id\" <>"));
        assert!(log[3].statements()[0].sql.contains("\"profile_picture_url\""));

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_failed_profile_picture_keeps_previous() {
        let storage = temp_storage();
        let root = storage.base_path().to_path_buf();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = ImageService::new(
            ImageRepository::new(Arc::clone(&db)),
            UserService::new(UserRepository::new(Arc::clone(&db))),
            Arc::new(storage),
            5 * 1024 * 1024,
        );

        let result = service
            .upload_profile_picture(&user("u1", UserRole::User), upload(b"not a png".to_vec()))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        drop(service);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert!(log.is_empty());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service(db, temp_storage());
        let mut bad = upload(png(4, 4));
        bad.content_type = "text/plain".to_string();

        assert!(matches!(
            service
                .upload(&user("u1", UserRole::User), ImageType::FeaturedImage, bad)
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_access_rules() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [image_row("f1", "u1", ImageType::FeaturedImage)],
                [image_row("p1", "u1", ImageType::ProfilePicture)],
                [image_row("p1", "u1", ImageType::ProfilePicture)],
                [image_row("p1", "u1", ImageType::ProfilePicture)],
                [image_row("p1", "u1", ImageType::ProfilePicture)],
            ])
            .into_connection();
        let service = service(db, temp_storage());

        assert!(service.get(None, "f1").await.is_ok());
        assert!(matches!(
            service.get(None, "p1").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.get(Some(&user("u2", UserRole::User)), "p1").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(service.get(Some(&user("u1", UserRole::User)), "p1").await.is_ok());
        assert!(
            service
                .get(Some(&user("m1", UserRole::Moderator)), "p1")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_inactive_image_is_not_found() {
        let mut inactive = image_row("i1", "u1", ImageType::FeaturedImage);
        inactive.is_active = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[inactive]])
            .into_connection();
        assert!(matches!(
            service(db, temp_storage()).get(None, "i1").await,
            Err(AppError::ImageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_by_other_user_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[image_row("i1", "u1", ImageType::FeaturedImage)]])
            .into_connection();
        assert!(matches!(
            service(db, temp_storage())
                .delete(&user("u2", UserRole::Moderator), "i1")
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_type_listing_requires_staff() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        assert!(matches!(
            service(db, temp_storage())
                .by_type(&user("u1", UserRole::User), ImageType::FeaturedImage)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }
}
