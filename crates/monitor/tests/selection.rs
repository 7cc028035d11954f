use std::sync::Arc;

use vigil_api::MockApi;
use vigil_core::{AnalysisResult, Summary};
use vigil_monitor::{AnalysisDetails, RefreshCoordinator, ViewState};
use vigil_search::{SelectionStatus, SortKey, ViewQuery};
use vigil_store::ResultStore;

fn rec(id: i64, score: f64, details: Option<&str>) -> AnalysisResult {
    AnalysisResult {
        id,
        website_name: format!("site{}", id),
        website_url: String::new(),
        content_title: String::new(),
        question_text: String::new(),
        llm_service: "openai".into(),
        response_text: String::new(),
        accuracy_score: score,
        misrepresentation_detected: score < 0.5,
        analyzed_at: format!("2024-02-0{} 12:00:00", id),
        analysis_details: details.map(str::to_string),
    }
}

#[tokio::test]
async fn open_detail_survives_refresh_until_its_record_disappears() {
    let api = Arc::new(MockApi::with_results(
        vec![rec(1, 0.9, None), rec(2, 0.3, Some("{\"confidence\": 0.7}")), rec(3, 0.2, Some("{oops"))],
        Summary::default(),
    ));
    let store = Arc::new(ResultStore::new());
    let coord = RefreshCoordinator::new(api.clone(), store.clone(), 100);
    let mut view = ViewState::new(ViewQuery { misrepresentations_only: true, sort: SortKey::Accuracy, text: String::new() });

    coord.fetch_now().await;
    let snap = store.get();
    assert_eq!(view.frame(&snap).ids(), vec![3, 2]);

    view.select(3);
    let detail = view.detail(&snap).unwrap();
    assert!(detail.details.is_fallback());

    // same id still present after a refresh: the detail stays open
    api.set_results(vec![rec(3, 0.2, Some("{oops")), rec(4, 0.1, None)], Summary::default());
    coord.fetch_now().await;
    let snap = store.get();
    assert_eq!(view.on_snapshot(&snap), SelectionStatus::Valid(3));
    assert_eq!(view.frame(&snap).ids(), vec![4, 3]);

    view.select(2);
    assert_eq!(view.on_snapshot(&snap), SelectionStatus::Invalidated(2));
    assert!(view.selected().is_none());

    api.set_results(vec![rec(2, 0.3, Some("{\"confidence\": 0.7}"))], Summary::default());
    coord.fetch_now().await;
    let snap = store.get();
    view.select(2);
    assert_eq!(view.on_snapshot(&snap), SelectionStatus::Valid(2));
    match view.detail(&snap).map(|d| d.details) {
        Some(AnalysisDetails::Parsed(p)) => assert_eq!(p.confidence.map(|c| c.percent()), Some("70.0%".to_string())),
        other => panic!("unexpected details: {:?}", other),
    }
}
