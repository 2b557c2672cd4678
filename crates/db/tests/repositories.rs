//! Integration tests for the category, account and validation run
//! repositories against an in-memory database.

use account_hub_core::validation::status::RunStatus;
use account_hub_db::models::category::{CreateCategory, UpdateValidationSettings};
use account_hub_db::models::validation_run::{CreateValidationRun, UpdateValidationRun};
use account_hub_db::repositories::{AccountRepo, CategoryRepo, ValidationRunRepo};
use account_hub_db::{create_memory_pool, DbPool};
use chrono::{Duration, Utc};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn pool() -> DbPool {
    create_memory_pool().await.expect("in-memory pool")
}

async fn new_category(pool: &DbPool, name: &str) -> i64 {
    CategoryRepo::create(
        pool,
        &CreateCategory {
            name: name.to_string(),
        },
    )
    .await
    .expect("create category")
    .id
}

fn payloads(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn category_defaults() {
    let pool = pool().await;
    let id = new_category(&pool, "steam").await;
    let cat = CategoryRepo::find_by_id(&pool, id).await.unwrap().unwrap();

    assert_eq!(cat.name, "steam");
    assert_eq!(cat.validation_script, "");
    assert_eq!(cat.validation_concurrency, 1);
    assert_eq!(cat.validation_cron, "0 0 * * *");
    assert_eq!(cat.history_limit, 1000);
    assert!(cat.last_validated_at.is_none());
    assert!(!cat.has_script());
}

#[tokio::test]
async fn duplicate_category_name_is_rejected() {
    let pool = pool().await;
    new_category(&pool, "dup").await;
    let err = CategoryRepo::create(
        &pool,
        &CreateCategory {
            name: "dup".to_string(),
        },
    )
    .await
    .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert!(db_err.is_unique_violation());
}

#[tokio::test]
async fn schedulable_requires_script_and_cron() {
    let pool = pool().await;
    let with_script = new_category(&pool, "a").await;
    let no_cron = new_category(&pool, "b").await;
    new_category(&pool, "c").await;

    CategoryRepo::update_validation_settings(
        &pool,
        with_script,
        &UpdateValidationSettings {
            validation_script: "def validate(d):\n    return False, False".to_string(),
            validation_concurrency: 4,
            validation_cron: "*/5 * * * *".to_string(),
        },
    )
    .await
    .unwrap()
    .unwrap();
    CategoryRepo::update_validation_settings(
        &pool,
        no_cron,
        &UpdateValidationSettings {
            validation_script: "def validate(d):\n    return False, False".to_string(),
            validation_concurrency: 1,
            validation_cron: String::new(),
        },
    )
    .await
    .unwrap()
    .unwrap();

    let ids: Vec<i64> = CategoryRepo::list_schedulable(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![with_script]);
}

#[tokio::test]
async fn update_missing_category_returns_none() {
    let pool = pool().await;
    let updated = CategoryRepo::update_history_limit(&pool, 999, 5).await.unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn mark_validated_sets_timestamp() {
    let pool = pool().await;
    let id = new_category(&pool, "mark").await;
    let at = Utc::now();
    assert!(CategoryRepo::mark_validated(&pool, id, at).await.unwrap());
    let cat = CategoryRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(cat.last_validated_at.is_some());
}

#[tokio::test]
async fn deleting_category_cascades() {
    let pool = pool().await;
    let id = new_category(&pool, "gone").await;
    AccountRepo::create_bulk(&pool, id, &payloads(&["x"])).await.unwrap();
    ValidationRunRepo::create(&pool, &CreateValidationRun::running(id, 1, Utc::now()))
        .await
        .unwrap();

    assert!(CategoryRepo::delete(&pool, id).await.unwrap());
    assert!(AccountRepo::list_by_category(&pool, id).await.unwrap().is_empty());
    assert!(ValidationRunRepo::list_for_category(&pool, id, None)
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bulk_insert_skips_duplicates() {
    let pool = pool().await;
    let id = new_category(&pool, "bulk").await;
    let first = AccountRepo::create_bulk(&pool, id, &payloads(&["a", "b"])).await.unwrap();
    let second = AccountRepo::create_bulk(&pool, id, &payloads(&["b", "c"])).await.unwrap();
    assert_eq!(first, 2);
    assert_eq!(second, 1);
    assert_eq!(AccountRepo::list_by_category(&pool, id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn candidates_include_used_but_not_banned() {
    let pool = pool().await;
    let id = new_category(&pool, "cand").await;
    AccountRepo::create_bulk(&pool, id, &payloads(&["fresh", "used", "banned"]))
        .await
        .unwrap();
    let accounts = AccountRepo::list_by_category(&pool, id).await.unwrap();
    AccountRepo::update_flags(&pool, accounts[1].id, true, false).await.unwrap();
    AccountRepo::update_flags(&pool, accounts[2].id, false, true).await.unwrap();

    let candidates: Vec<String> = AccountRepo::list_candidates(&pool, id, true)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.data)
        .collect();
    assert_eq!(candidates, vec!["fresh", "used"]);

    let all = AccountRepo::list_candidates(&pool, id, false).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn stats_count_each_state() {
    let pool = pool().await;
    let id = new_category(&pool, "stats").await;
    assert_eq!(AccountRepo::count_stats(&pool, id).await.unwrap().total, 0);

    AccountRepo::create_bulk(&pool, id, &payloads(&["1", "2", "3", "4"]))
        .await
        .unwrap();
    let accounts = AccountRepo::list_by_category(&pool, id).await.unwrap();
    AccountRepo::update_flags(&pool, accounts[0].id, true, false).await.unwrap();
    AccountRepo::update_flags(&pool, accounts[1].id, true, true).await.unwrap();

    let stats = AccountRepo::count_stats(&pool, id).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.used, 2);
    assert_eq!(stats.banned, 1);
    assert_eq!(stats.available, 2);
}

// ---------------------------------------------------------------------------
// Validation runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_partial_updates_leave_other_fields() {
    let pool = pool().await;
    let id = new_category(&pool, "runs").await;
    let run = ValidationRunRepo::create(&pool, &CreateValidationRun::running(id, 3, Utc::now()))
        .await
        .unwrap();
    assert_eq!(run.run_status(), RunStatus::Running);
    assert!(run.finished_at.is_none());

    ValidationRunRepo::update(&pool, run.id, &UpdateValidationRun::processed(2))
        .await
        .unwrap();
    ValidationRunRepo::update(&pool, run.id, &UpdateValidationRun::log("line\n".to_string()))
        .await
        .unwrap();
    ValidationRunRepo::update(
        &pool,
        run.id,
        &UpdateValidationRun::finish(RunStatus::Success, 1, Utc::now()),
    )
    .await
    .unwrap();

    let run = ValidationRunRepo::find_by_id(&pool, run.id).await.unwrap().unwrap();
    assert_eq!(run.processed_count, 2);
    assert_eq!(run.banned_count, 1);
    assert_eq!(run.log, "line\n");
    assert_eq!(run.run_status(), RunStatus::Success);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn failed_run_is_recorded_finished() {
    let pool = pool().await;
    let id = new_category(&pool, "failed").await;
    let run = ValidationRunRepo::create(
        &pool,
        &CreateValidationRun::failed(id, "store offline".to_string(), Utc::now()),
    )
    .await
    .unwrap();
    assert_eq!(run.run_status(), RunStatus::Failed);
    assert_eq!(run.error_message, "store offline");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn runs_list_newest_first_with_limit() {
    let pool = pool().await;
    let id = new_category(&pool, "order").await;
    let base = Utc::now() - Duration::hours(1);
    for i in 0..4 {
        ValidationRunRepo::create(
            &pool,
            &CreateValidationRun::running(id, 0, base + Duration::minutes(i)),
        )
        .await
        .unwrap();
    }

    let runs = ValidationRunRepo::list_for_category(&pool, id, None).await.unwrap();
    assert_eq!(runs.len(), 4);
    assert!(runs.windows(2).all(|w| w[0].started_at >= w[1].started_at));

    let limited = ValidationRunRepo::list_for_category(&pool, id, Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, runs[0].id);
}

#[tokio::test]
async fn delete_many_never_removes_running_runs() {
    let pool = pool().await;
    let id = new_category(&pool, "delete").await;
    let running = ValidationRunRepo::create(&pool, &CreateValidationRun::running(id, 0, Utc::now()))
        .await
        .unwrap();
    let done = ValidationRunRepo::create(&pool, &CreateValidationRun::running(id, 0, Utc::now()))
        .await
        .unwrap();
    ValidationRunRepo::update(
        &pool,
        done.id,
        &UpdateValidationRun::finish(RunStatus::Success, 0, Utc::now()),
    )
    .await
    .unwrap();

    let deleted = ValidationRunRepo::delete_many(&pool, &[running.id, done.id]).await.unwrap();
    assert_eq!(deleted, 1);
    let left = ValidationRunRepo::list_for_category(&pool, id, None).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, running.id);
}

#[tokio::test]
async fn expired_ids_skip_newest_and_running() {
    let pool = pool().await;
    let id = new_category(&pool, "expiry").await;
    let other = new_category(&pool, "other").await;
    let base = Utc::now() - Duration::hours(1);

    let mut finished = Vec::new();
    for i in 0..8 {
        let at = base + Duration::minutes(i);
        let run = ValidationRunRepo::create(&pool, &CreateValidationRun::running(id, 0, at))
            .await
            .unwrap();
        ValidationRunRepo::update(
            &pool,
            run.id,
            &UpdateValidationRun {
                log: Some("x".repeat(4096)),
                ..UpdateValidationRun::finish(RunStatus::Success, 0, at)
            },
        )
        .await
        .unwrap();
        finished.push(run.id);
    }
    // Oldest of all, but still running.
    let running = ValidationRunRepo::create(
        &pool,
        &CreateValidationRun::running(id, 0, base - Duration::hours(1)),
    )
    .await
    .unwrap();
    ValidationRunRepo::create(&pool, &CreateValidationRun::running(other, 0, base))
        .await
        .unwrap();

    let expired = ValidationRunRepo::list_expired_ids(&pool, id, 5).await.unwrap();
    assert_eq!(expired, vec![finished[2], finished[1], finished[0]]);
    assert!(!expired.contains(&running.id));

    assert!(ValidationRunRepo::list_expired_ids(&pool, id, 8)
        .await
        .unwrap()
        .is_empty());
}
