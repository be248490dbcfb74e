use jiff::Timestamp;
use jiff::civil::time;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uptime_report::model::{BusinessInterval, Observation, StoreStatus};
use uptime_report::report::{
    PollOutcome, ReportContext, ReportQueue, ReportService, ReportSettings, artifact,
    spawn_report_worker,
};
use uptime_report::store::{MemoryJobRegistry, MemoryStore};

fn ts(value: &str) -> Timestamp {
    value.parse().expect("valid timestamp")
}

fn observation(store_id: &str, timestamp: &str, status: StoreStatus) -> Observation {
    Observation {
        store_id: store_id.to_string(),
        timestamp: ts(timestamp),
        status,
    }
}

fn seeded_store() -> Result<MemoryStore, uptime_report::store::StoreError> {
    let store = MemoryStore::new();
    // 2024-01-01 is a Monday.
    store.insert_observations(vec![
        observation("S1", "2024-01-01T10:00:00Z", StoreStatus::Active),
        observation("S1", "2024-01-01T10:50:00Z", StoreStatus::Active),
        observation("S1", "2024-01-01T12:00:00Z", StoreStatus::Inactive),
        observation("S2", "2024-01-01T11:40:00Z", StoreStatus::Active),
        observation("S3", "2023-12-01T11:40:00Z", StoreStatus::Active),
    ])?;
    store.insert_business_intervals((0..5).map(|day_of_week| BusinessInterval {
        store_id: "S1".to_string(),
        day_of_week,
        start_time_local: time(10, 0, 0, 0),
        end_time_local: time(17, 0, 0, 0),
    }))?;
    store.insert_timezone("S1", "UTC")?;
    Ok(store)
}

fn start(output_dir: &Path) -> Result<ReportService, uptime_report::store::StoreError> {
    let registry = Arc::new(MemoryJobRegistry::new());
    let ctx = ReportContext {
        store: Arc::new(seeded_store()?),
        registry: registry.clone(),
        settings: Arc::new(ReportSettings {
            output_dir: output_dir.to_path_buf(),
            ..ReportSettings::default()
        }),
    };
    let (queue, rx) = ReportQueue::channel();
    spawn_report_worker(rx, ctx);
    Ok(ReportService::new(registry, queue, output_dir.to_path_buf()))
}

async fn poll_until_done(service: &ReportService, report_id: &str) -> PollOutcome {
    for _ in 0..500 {
        let outcome = service.poll(report_id);
        if outcome != PollOutcome::Running {
            return outcome;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    PollOutcome::Running
}

#[tokio::test]
async fn triggered_report_completes_with_one_row_per_store() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let service = start(dir.path())?;

    let report_id = service.trigger()?;
    let outcome = poll_until_done(&service, &report_id).await;

    let PollOutcome::Ready(path) = outcome else {
        panic!("expected finished report, got {outcome:?}");
    };
    let contents = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], artifact::HEADER);
    assert_eq!(lines[1], "S1,0.00,2.00,27.33,60.00,1.00,13.67");
    assert!(lines[2].starts_with("S2,60.00,"));
    assert_eq!(lines[3], "S3,0.00,0.00,0.00,0.00,0.00,0.00");
    assert_eq!(lines.len(), 4);

    // A finished job keeps its terminal outcome.
    assert_eq!(service.poll(&report_id), PollOutcome::Ready(path));
    Ok(())
}

#[tokio::test]
async fn repeated_runs_produce_identical_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let service = start(dir.path())?;

    let first = service.trigger()?;
    let second = service.trigger()?;
    assert_ne!(first, second);

    let PollOutcome::Ready(first_path) = poll_until_done(&service, &first).await else {
        panic!("first report did not finish");
    };
    let PollOutcome::Ready(second_path) = poll_until_done(&service, &second).await else {
        panic!("second report did not finish");
    };

    assert_eq!(std::fs::read(first_path)?, std::fs::read(second_path)?);
    Ok(())
}

#[tokio::test]
async fn unknown_token_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let service = start(dir.path())?;

    assert_eq!(service.poll("does-not-exist"), PollOutcome::NotFound);
    Ok(())
}
