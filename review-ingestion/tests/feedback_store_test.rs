//! Postgres-backed checks for the feedback and place queries.
//!
//! Needs Docker: `cargo test -p review-ingestion -- --ignored`.

use anyhow::{Context, Result};
use chrono::{FixedOffset, TimeZone, Utc};
use shared_types::{AnalysisResult, FeedbackResult};
use sqlx::{PgPool, Row};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

use review_ingestion::repository::{
    fetch_place, fetch_places, FeedbackColumns, FeedbackStore, FeedbackUpdate, PgFeedbackStore,
};

struct TestDb {
    pool: PgPool,
    _container: ContainerAsync<Postgres>,
}

async fn start_db() -> Result<TestDb> {
    let container = Postgres::default()
        .start()
        .await
        .context("Failed to start Postgres container")?;
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    let pool = PgPool::connect(&url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(TestDb {
        pool,
        _container: container,
    })
}

async fn insert_place(pool: &PgPool, place_id: i32, place_num: &str) -> Result<()> {
    sqlx::query("INSERT INTO place (place_id, place_name, place_num) VALUES ($1, $2, $3)")
        .bind(place_id)
        .bind(format!("place {}", place_id))
        .bind(place_num)
        .execute(pool)
        .await?;
    Ok(())
}

fn columns(hour: u32) -> FeedbackColumns {
    let analysis = AnalysisResult {
        positive: "음식이 맛있어요".into(),
        negative: "주차가 불편해요".into(),
        keyword: vec!["맛".into(), "주차".into()],
    };
    let feedback = FeedbackResult {
        positive_feedback: "맛을 알리세요".into(),
        negative_feedback: "주차 안내를 추가하세요".into(),
    };
    let now = Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap();
    FeedbackColumns::new(&analysis, &feedback, now, FixedOffset::east_opt(9 * 3600).unwrap())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn missing_feedback_row_is_not_created() -> Result<()> {
    let db = start_db().await?;
    insert_place(&db.pool, 1, "1111").await?;
    let store = PgFeedbackStore::new(db.pool.clone());

    let outcome = store.update_feedback(1, &columns(1)).await?;

    assert_eq!(outcome, FeedbackUpdate::NotFound);
    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM feedback")
        .fetch_one(&db.pool)
        .await?
        .try_get("n")?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn update_overwrites_first_row_only() -> Result<()> {
    let db = start_db().await?;
    insert_place(&db.pool, 2, "2222").await?;
    sqlx::query("INSERT INTO feedback (place_id) VALUES ($1), ($1)")
        .bind(2)
        .execute(&db.pool)
        .await?;
    let store = PgFeedbackStore::new(db.pool.clone());

    assert_eq!(store.update_feedback(2, &columns(1)).await?, FeedbackUpdate::Updated);
    assert_eq!(store.update_feedback(2, &columns(5)).await?, FeedbackUpdate::Updated);

    let rows = sqlx::query(
        "SELECT p_summary, keyword, n_body, updated_at FROM feedback WHERE place_id = $1 ORDER BY feedback_id",
    )
    .bind(2)
    .fetch_all(&db.pool)
    .await?;

    let first = &rows[0];
    assert_eq!(first.try_get::<String, _>("p_summary")?, "음식이 맛있어요");
    assert_eq!(first.try_get::<String, _>("keyword")?, "맛, 주차");
    assert_eq!(first.try_get::<String, _>("n_body")?, "주차 안내를 추가하세요");
    let updated_at: chrono::NaiveDateTime = first.try_get("updated_at")?;
    assert_eq!(updated_at, columns(5).updated_at);
    assert_eq!(updated_at.format("%H:%M").to_string(), "14:00");

    let second = &rows[1];
    assert!(second.try_get::<Option<String>, _>("p_summary")?.is_none());
    Ok(())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn places_without_number_are_skipped() -> Result<()> {
    let db = start_db().await?;
    insert_place(&db.pool, 3, "3333").await?;
    insert_place(&db.pool, 4, "  ").await?;
    sqlx::query("INSERT INTO place (place_id, place_name) VALUES (5, 'unlinked')")
        .execute(&db.pool)
        .await?;

    let places = fetch_places(&db.pool).await?;
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].place_num, "3333");

    assert!(fetch_place(&db.pool, 3).await?.is_some());
    assert!(fetch_place(&db.pool, 99).await?.is_none());
    Ok(())
}
