// Tests for the content retry policy and the progress store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use habla_live::content::{fetch_with_retry, RetryPolicy};
use habla_live::progress::{Category, Level, ProgressSink, ProgressTracker};
use habla_live::SessionError;

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failures() {
    let calls = AtomicUsize::new(0);

    let result = fetch_with_retry(fast_policy(3), || {
        let attempt = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                anyhow::bail!("transient")
            }
            Ok("scenario text".to_string())
        }
    })
    .await;

    assert_eq!(result.unwrap(), "scenario text");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_exhaustion_yields_content_error() {
    let calls = AtomicUsize::new(0);

    let result: Result<String, _> = fetch_with_retry(fast_policy(3), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { anyhow::bail!("service unavailable") }
    })
    .await;

    assert!(matches!(result, Err(SessionError::Content(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "Exactly attempts calls");
}

#[tokio::test]
async fn test_first_try_success_makes_one_call() {
    let calls = AtomicUsize::new(0);

    let result = fetch_with_retry(fast_policy(3), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(42u32) }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_progress_accumulates_points_including_repeats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tracker = ProgressTracker::open(dir.path().join("progress.json"))?;

    tracker.mark_complete(Category::Live, "cafe")?;
    tracker.mark_complete(Category::Live, "cafe")?;
    tracker.mark_complete(Category::Reading, "story-1")?;
    tracker.mark_complete(Category::Vocab, "cafe")?;

    // Repeats keep earning: 15 + 15 + 10 + 5
    assert_eq!(tracker.total_points(), 45);
    assert_eq!(tracker.completed_ids(Category::Live).len(), 2);
    assert!(tracker.is_completed(Category::Live, "cafe"));
    assert!(!tracker.is_completed(Category::Reading, "cafe"));

    Ok(())
}

#[test]
fn test_progress_persists_across_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("progress.json");

    {
        let tracker = ProgressTracker::open(&path)?;
        tracker.mark_complete(Category::Live, "cafe")?;
        tracker.mark_complete(Category::Reading, "story-1")?;
    }

    let reopened = ProgressTracker::open(&path)?;
    assert_eq!(reopened.total_points(), 25);
    assert!(reopened.is_completed(Category::Live, "cafe"));

    Ok(())
}

#[test]
fn test_malformed_progress_file_resets_to_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("progress.json");
    std::fs::write(&path, "{ not json")?;

    let tracker = ProgressTracker::open(&path)?;
    assert_eq!(tracker.total_points(), 0);
    assert_eq!(tracker.level(), Level::Novice);

    Ok(())
}

#[test]
fn test_level_thresholds() {
    assert_eq!(Level::for_points(0), Level::Novice);
    assert_eq!(Level::for_points(149), Level::Novice);
    assert_eq!(Level::for_points(150), Level::Apprentice);
    assert_eq!(Level::for_points(399), Level::Apprentice);
    assert_eq!(Level::for_points(400), Level::BasicUser);
}

#[test]
fn test_level_follows_accumulated_points() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let tracker = ProgressTracker::open(dir.path().join("progress.json"))?;

    assert_eq!(tracker.level(), Level::Novice);

    // Ten live sessions at 15 points each crosses the 150 threshold
    for i in 0..10 {
        tracker.mark_complete(Category::Live, &format!("topic-{}", i))?;
    }
    assert_eq!(tracker.level(), Level::Apprentice);

    Ok(())
}
