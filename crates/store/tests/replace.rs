#![forbid(unsafe_code)]

use std::time::Duration;

use vigil_core::{AnalysisResult, Summary};
use vigil_store::ResultStore;

fn result(id: i64, site: &str, score: f64) -> AnalysisResult {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "website_name": site,
        "website_url": format!("https://{}.example", site),
        "question_text": "q",
        "llm_service": "openai",
        "accuracy_score": score,
        "misrepresentation_detected": score < 0.5,
        "analyzed_at": "2024-01-01T00:00:00",
    }))
    .unwrap()
}

fn summary(total: u64) -> Summary { Summary { total_misrepresentations: total, ..Default::default() } }

#[test]
fn starts_empty_at_version_zero() {
    let store = ResultStore::new();
    let snap = store.get();
    assert_eq!(snap.version, 0);
    assert!(snap.is_empty());
    assert_eq!(snap.summary.total_misrepresentations, 0);
}

#[test]
fn replace_swaps_everything_and_bumps_version() {
    let store = ResultStore::new();

    let v1 = store.replace(vec![result(1, "a", 0.9), result(2, "b", 0.2)], summary(1));
    assert_eq!(v1, 1);
    let snap1 = store.get();
    assert_eq!(snap1.len(), 2);
    assert_eq!(snap1.summary.total_misrepresentations, 1);

    // second replace drops id 1 entirely; no merge with the previous set
    let v2 = store.replace(vec![result(3, "c", 0.4)], summary(7));
    assert_eq!(v2, 2);
    let snap2 = store.get();
    assert_eq!(snap2.version, 2);
    assert_eq!(snap2.len(), 1);
    assert!(!snap2.contains(1));
    assert!(snap2.contains(3));
    assert_eq!(snap2.summary.total_misrepresentations, 7);

    // readers holding the old snapshot keep a consistent view
    assert_eq!(snap1.version, 1);
    assert!(snap1.contains(1));
    assert_eq!(store.version(), 2);
}

#[tokio::test]
async fn subscribers_observe_new_versions() {
    let store = ResultStore::new();
    let mut rx = store.subscribe_version();
    assert_eq!(*rx.borrow(), 0);

    store.replace(vec![result(1, "a", 0.9)], Summary::default());
    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
    assert_eq!(*rx.borrow_and_update(), 1);
    assert_eq!(store.get().version, 1);
}
