/// payment lifecycle - apply, settle, reverse and amend payments
use debt_ledger_rs::{
    Ledger, MemoryStore, Money, NewClient, NewDebt, NewPayment, PaymentMethod, PaymentUpdate,
    RecordingNotifier, SafeTimeProvider, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== payment lifecycle example ===\n");

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let notifier = Arc::new(RecordingNotifier::new());

    let ledger = Ledger::builder(MemoryStore::new())
        .clock(time.clone())
        .notifier(notifier.clone())
        .build()?;
    ledger.bootstrap_admin("Owner", "+15550001", None)?;
    let admin = ledger.authenticate("+15550001")?;

    let client = ledger.create_client(&admin, NewClient::new("Jon Park", "+15550200"))?;
    let debt = ledger.create_debt(&admin, NewDebt::new(client.id, Money::from_major(100), "Silver chain"))?;
    println!("debt opened: {} remaining", debt.remaining_amount);

    // 40 cash, then 60 by card settles the debt
    ledger.add_payment(&admin, NewPayment::new(debt.id, Money::from_major(40), PaymentMethod::Cash))?;
    controller.advance(Duration::days(7));
    let card = ledger.add_payment(&admin, NewPayment::new(debt.id, Money::from_major(60), PaymentMethod::Card))?;
    let settled = ledger.debt(&admin, debt.id)?;
    println!("after two payments: {} remaining, status {:?}", settled.remaining_amount, settled.status);

    // an overpayment is refused and leaves the balance alone
    match ledger.add_payment(&admin, NewPayment::new(debt.id, Money::from_major(1), PaymentMethod::Cash)) {
        Ok(_) => println!("unexpected: payment on settled debt accepted"),
        Err(err) => println!("rejected: {}", err),
    }

    // card chargeback reopens the debt
    ledger.reverse_payment(&admin, card.id, Some("chargeback".to_string()))?;
    let reopened = ledger.debt(&admin, debt.id)?;
    println!("after reversal: {} remaining, status {:?}", reopened.remaining_amount, reopened.status);

    // correct the first payment's amount; the debt is recalculated
    let first = ledger.payments_for_debt(&admin, debt.id)?.remove(0);
    ledger.update_payment(
        &admin,
        first.id,
        PaymentUpdate {
            amount: Some(Money::from_major(45)),
            ..PaymentUpdate::default()
        },
    )?;
    let amended = ledger.debt(&admin, debt.id)?;
    println!("after amendment: {} remaining", amended.remaining_amount);

    println!("\nevents:");
    for event in ledger.take_events() {
        println!("  {}", serde_json::to_string(&event)?);
    }
    println!("\nnotifications sent: {}", notifier.sent().len());

    Ok(())
}
