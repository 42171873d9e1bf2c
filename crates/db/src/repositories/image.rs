//! Image repository.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};
use serde::Serialize;

use crate::entities::{Image, image, image::ImageType};
use quill_common::{AppError, AppResult};

/// Count and total size of a set of images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub count: i64,
    pub total_size: i64,
}

/// Image repository for database operations.
#[derive(Clone)]
pub struct ImageRepository {
    db: Arc<DatabaseConnection>,
}

impl ImageRepository {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an image by ID, active or not.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<image::Model>> {
        Image::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an active image, returning an error if missing or deactivated.
    pub async fn get_active(&self, id: &str) -> AppResult<image::Model> {
        self.find_by_id(id)
            .await?
            .filter(|img| img.is_active)
            .ok_or_else(|| AppError::ImageNotFound(id.to_string()))
    }

    /// Insert image metadata.
    pub async fn create(&self, model: image::ActiveModel) -> AppResult<image::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update image metadata.
    pub async fn update(&self, model: image::ActiveModel) -> AppResult<image::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active images uploaded by a user, newest first.
    pub async fn find_active_by_uploader(&self, uploader_id: &str) -> AppResult<Vec<image::Model>> {
        Image::find()
            .filter(image::Column::UploaderId.eq(uploader_id))
            .filter(image::Column::IsActive.eq(true))
            .order_by_desc(image::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active images of one type from one uploader.
    pub async fn find_active_by_uploader_and_type(
        &self,
        uploader_id: &str,
        image_type: ImageType,
    ) -> AppResult<Vec<image::Model>> {
        Image::find()
            .filter(image::Column::UploaderId.eq(uploader_id))
            .filter(image::Column::ImageType.eq(image_type))
            .filter(image::Column::IsActive.eq(true))
            .order_by_desc(image::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active images of a type, newest first.
    pub async fn find_active_by_type(&self, image_type: ImageType) -> AppResult<Vec<image::Model>> {
        Image::find()
            .filter(image::Column::ImageType.eq(image_type))
            .filter(image::Column::IsActive.eq(true))
            .order_by_desc(image::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of active images plus the total count.
    pub async fn find_active_paged(
        &self,
        page: u64,
        size: u64,
    ) -> AppResult<(Vec<image::Model>, u64)> {
        let paginator = Image::find()
            .filter(image::Column::IsActive.eq(true))
            .order_by_desc(image::Column::CreatedAt)
            .paginate(self.db.as_ref(), size);

        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let items = paginator
            .fetch_page(page)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((items, total))
    }

    /// Soft-delete the active images of a type from an uploader, except `keep_id`.
    pub async fn deactivate_by_uploader_and_type(
        &self,
        uploader_id: &str,
        image_type: ImageType,
        keep_id: &str,
    ) -> AppResult<u64> {
        let res = Image::update_many()
            .col_expr(image::Column::IsActive, Expr::value(false))
            .filter(image::Column::UploaderId.eq(uploader_id))
            .filter(image::Column::ImageType.eq(image_type))
            .filter(image::Column::Id.ne(keep_id))
            .filter(image::Column::IsActive.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(res.rows_affected)
    }

    /// Count and total size of an uploader's active images.
    pub async fn stats_by_uploader(&self, uploader_id: &str) -> AppResult<ImageStats> {
        self.stats(image::Column::UploaderId.eq(uploader_id)).await
    }

    /// Count and total size of active images of a type.
    pub async fn stats_by_type(&self, image_type: ImageType) -> AppResult<ImageStats> {
        self.stats(image::Column::ImageType.eq(image_type)).await
    }

    async fn stats(&self, condition: sea_orm::sea_query::SimpleExpr) -> AppResult<ImageStats> {
        let stats = Image::find()
            .select_only()
            .column_as(Expr::cust("COUNT(*)"), "count")
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(file_size), 0) AS BIGINT)"),
                "total_size",
            )
            .filter(condition)
            .filter(image::Column::IsActive.eq(true))
            .into_model::<ImageStats>()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(stats.unwrap_or_default())
    }
}
