use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use shared_types::{AnalysisResult, FeedbackResult, Place};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

pub async fn connect_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

pub async fn fetch_places(pool: &PgPool) -> Result<Vec<Place>, sqlx::Error> {
    let rows = sqlx::query(
        "
            SELECT place_id, place_num
            FROM place
            WHERE place_num IS NOT NULL
              AND TRIM(place_num) != ''
            ORDER BY place_id
        ",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(Place {
                place_id: row.try_get("place_id")?,
                place_num: row.try_get("place_num")?,
            })
        })
        .collect()
}

pub async fn fetch_place(pool: &PgPool, place_id: i32) -> Result<Option<Place>, sqlx::Error> {
    let row = sqlx::query("SELECT place_id, place_num FROM place WHERE place_id = $1")
        .bind(place_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        Ok(Place {
            place_id: row.try_get("place_id")?,
            place_num: row.try_get("place_num")?,
        })
    })
    .transpose()
}

/// Registered places, re-read at every scheduled trigger.
#[async_trait]
pub trait PlaceSource: Send + Sync {
    async fn places(&self) -> Result<Vec<Place>, sqlx::Error>;
    async fn place(&self, place_id: i32) -> Result<Option<Place>, sqlx::Error>;
}

pub struct PgPlaceSource {
    pool: PgPool,
}

impl PgPlaceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaceSource for PgPlaceSource {
    async fn places(&self) -> Result<Vec<Place>, sqlx::Error> {
        fetch_places(&self.pool).await
    }

    async fn place(&self, place_id: i32) -> Result<Option<Place>, sqlx::Error> {
        fetch_place(&self.pool, place_id).await
    }
}

/// Outcome of writing analysis results onto a place's feedback row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackUpdate {
    Updated,
    /// No feedback row exists for the place; nothing was written.
    NotFound,
}

/// Keywords beyond this many are dropped before joining.
pub const MAX_KEYWORDS: usize = 5;

/// Column values written by an update, in the order they are bound.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackColumns {
    pub p_summary: String,
    pub n_summary: String,
    pub keyword: String,
    pub p_body: String,
    pub n_body: String,
    pub updated_at: NaiveDateTime,
}

impl FeedbackColumns {
    /// `updated_at` is the wall-clock time in `timezone`, stored without offset.
    pub fn new(
        analysis: &AnalysisResult,
        feedback: &FeedbackResult,
        now: DateTime<Utc>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            p_summary: analysis.positive.clone(),
            n_summary: analysis.negative.clone(),
            keyword: analysis
                .keyword
                .iter()
                .take(MAX_KEYWORDS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            p_body: feedback.positive_feedback.clone(),
            n_body: feedback.negative_feedback.clone(),
            updated_at: now.with_timezone(&timezone).naive_local(),
        }
    }
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Overwrites the existing row for `place_id`. Rows are never created here;
    /// they are provisioned when the place is registered.
    async fn update_feedback(
        &self,
        place_id: i32,
        columns: &FeedbackColumns,
    ) -> Result<FeedbackUpdate, sqlx::Error>;
}

pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn update_feedback(
        &self,
        place_id: i32,
        columns: &FeedbackColumns,
    ) -> Result<FeedbackUpdate, sqlx::Error> {
        // A single statement, so the five fields and the timestamp land together.
        let result = sqlx::query(
            "
                UPDATE feedback
                SET p_summary = $2,
                    n_summary = $3,
                    keyword = $4,
                    p_body = $5,
                    n_body = $6,
                    updated_at = $7
                WHERE feedback_id = (
                    SELECT feedback_id
                    FROM feedback
                    WHERE place_id = $1
                    ORDER BY feedback_id
                    LIMIT 1
                )
            ",
        )
        .bind(place_id)
        .bind(&columns.p_summary)
        .bind(&columns.n_summary)
        .bind(&columns.keyword)
        .bind(&columns.p_body)
        .bind(&columns.n_body)
        .bind(columns.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(match result.rows_affected() {
            0 => FeedbackUpdate::NotFound,
            _ => FeedbackUpdate::Updated,
        })
    }
}
