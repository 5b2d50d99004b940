/// scheduled jobs - drive the periodic notifications from a test clock
use debt_ledger_rs::{
    Job, Ledger, MemoryStore, Money, NewClient, NewDebt, RecordingNotifier, SafeTimeProvider,
    Scheduler, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== scheduled jobs example ===\n");

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let ledger = Ledger::builder(MemoryStore::new())
        .clock(time.clone())
        .notifier(notifier.clone())
        .build()?;
    debt_ledger_rs::telemetry::init_tracing(&ledger.config().log_level)?;
    ledger.bootstrap_admin("Owner", "+15550001", None)?;
    let admin = ledger.authenticate("+15550001")?;

    let client = ledger.create_client(&admin, NewClient::new("Tom Reyes", "+15550500"))?;
    let due = ledger.today() + Duration::days(2);
    ledger.create_debt(
        &admin,
        NewDebt::new(client.id, Money::from_major(300), "Engagement ring").due(due),
    )?;
    notifier.take();

    let mut scheduler = Scheduler::for_ledger(&ledger);
    for job in Job::ALL {
        if let Some(next) = scheduler.next_run(job) {
            println!("{} next runs at {}", job, next);
        }
    }

    // walk a week forward one day at a time
    for _ in 0..7 {
        controller.advance(Duration::days(1));
        for report in scheduler.tick(&ledger) {
            println!(
                "{} {}: {} prepared, {} delivered",
                report.ran_at.format("%Y-%m-%d"),
                report.job,
                report.prepared,
                report.delivered
            );
        }
    }

    println!("\nnotifications:");
    for notification in notifier.take() {
        println!("  {}", notification.kind());
    }
    Ok(())
}
