//! Job submission through the service layer

mod common;

use common::{miami_poster, FailAt, MockLauncher, FAKE_PNG};
use mapposter::jobs::{png_data_url, JobRegistry, JobStatus, PosterService, SubmitError, DEFAULT_RETENTION};
use mapposter::validate::validate_config;
use mapposter::RenderOptions;
use serde_json::json;

fn service(launcher: MockLauncher, dir: &std::path::Path) -> PosterService<MockLauncher> {
    let registry = JobRegistry::new(dir, DEFAULT_RETENTION).unwrap();
    let defaults = RenderOptions {
        timeout_ms: 50,
        poll_interval_ms: 5,
        stabilization_ms: 0,
        ..RenderOptions::default()
    };
    PosterService::new(launcher, registry, defaults)
}

#[tokio::test]
async fn test_submit_records_completed_job() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MockLauncher::new();
    let service = service(launcher.clone(), dir.path());

    let report = service.submit(&miami_poster(), |_| {}).await.unwrap();

    assert_eq!(
        report.output_path,
        dir.path().join(format!("poster-{}.png", report.job_id))
    );
    assert_eq!(std::fs::read(&report.output_path).unwrap(), FAKE_PNG);

    let job = service.registry().get(&report.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.metadata, Some(report.metadata.clone()));
    assert_eq!(service.registry().result_path(&report.job_id), Some(report.output_path.clone()));

    let url = png_data_url(&report.output_path).unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_invalid_config_creates_no_job() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MockLauncher::new();
    let service = service(launcher.clone(), dir.path());
    let raw = json!({"maps": [], "print": {"widthCm": 250, "heightCm": 60}});

    let err = service.submit(&raw, |_| {}).await.unwrap_err();

    match err {
        SubmitError::Invalid { errors } => {
            assert!(errors.len() >= 3);
            assert_eq!(errors, validate_config(&raw).errors);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(service.registry().list().is_empty());
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn test_failed_render_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MockLauncher::failing_at(FailAt::Complete);
    let service = service(launcher.clone(), dir.path());

    let err = service.submit(&miami_poster(), |_| {}).await.unwrap_err();

    let SubmitError::Failed { job_id, message } = err else {
        panic!("expected render failure");
    };
    assert_eq!(message, "Map rendering did not complete within 50ms");
    let job = service.registry().get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(message.as_str()));
    assert!(service.registry().result_path(&job_id).is_none());
    assert!(!job.output_path.exists());
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn test_overrides_apply_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MockLauncher::new();
    let service = service(launcher.clone(), dir.path());

    service
        .submit(&miami_poster(), |opts| opts.debug = true)
        .await
        .unwrap();
    service.submit(&miami_poster(), |_| {}).await.unwrap();

    let record = launcher.record.lock().unwrap();
    assert!(record.launches[0].debug);
    assert!(!record.launches[1].debug);
    assert_eq!(service.registry().list().len(), 2);
}

#[tokio::test]
async fn test_invalid_layout_cardinality_is_itemised() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = MockLauncher::new();
    let service = service(launcher.clone(), dir.path());
    let mut raw = miami_poster();
    raw["layout"]["type"] = json!("double");

    let Err(SubmitError::Invalid { errors }) = service.submit(&raw, |_| {}).await else {
        panic!("expected validation failure");
    };
    assert_eq!(errors, vec!["Layout double requires 2 map(s), got 1".to_string()]);
    assert_eq!(launcher.launches(), 0);
}
