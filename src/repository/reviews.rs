//! Reviews repository for database operations

use sqlx::{PgExecutor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::review::{Review, ReviewDetails},
};

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.book_id, r.rating, r.comment, r.created_at,
           u.username, b.title AS book_title
    FROM reviews r
    JOIN users u ON r.user_id = u.id
    JOIN books b ON r.book_id = b.id
"#;

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Review> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review with id {} not found", id)))
    }

    pub async fn list_for_book(&self, book_id: i32) -> AppResult<Vec<ReviewDetails>> {
        let reviews = sqlx::query_as::<_, ReviewDetails>(&format!(
            "{} WHERE r.book_id = $1 ORDER BY r.created_at DESC, r.id DESC",
            DETAILS_SELECT
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ReviewDetails>> {
        let reviews = sqlx::query_as::<_, ReviewDetails>(&format!(
            "{} WHERE r.user_id = $1 ORDER BY r.created_at DESC, r.id DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    pub async fn exists(&self, conn: impl PgExecutor<'_>, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE user_id = $1 AND book_id = $2)",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// Raw sqlx error so callers can inspect constraint violations
    pub async fn insert(
        &self,
        conn: impl PgExecutor<'_>,
        user_id: i32,
        book_id: i32,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Review, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (user_id, book_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(conn)
        .await
    }

    pub async fn delete(&self, conn: impl PgExecutor<'_>, id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_for_book(&self, conn: impl PgExecutor<'_>, book_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reviews WHERE book_id = $1")
            .bind(book_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
