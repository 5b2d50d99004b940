/// reports - dashboard, monthly and projection figures over a small ledger
use debt_ledger_rs::{
    Ledger, MemoryStore, Money, NewClient, NewDebt, NewPayment, PaymentMethod, SafeTimeProvider,
    TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== reports example ===\n");

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();
    let ledger = Ledger::builder(MemoryStore::new()).clock(time.clone()).build()?;
    ledger.bootstrap_admin("Owner", "+15550001", None)?;
    let admin = ledger.authenticate("+15550001")?;

    let names = [("Lena", "+15550401"), ("Marco", "+15550402"), ("Priya", "+15550403")];
    let mut debts = Vec::new();
    for (i, (name, phone)) in names.iter().enumerate() {
        let client = ledger.create_client(&admin, NewClient::new(*name, *phone))?;
        let total = Money::from_major(600 * (i as i64 + 1));
        debts.push(ledger.create_debt(&admin, NewDebt::new(client.id, total, "Custom piece"))?);
    }

    // six months of instalments, growing slowly
    for month in 0..6i64 {
        for (i, debt) in debts.iter().enumerate() {
            let method = if i % 2 == 0 { PaymentMethod::Cash } else { PaymentMethod::Card };
            let amount = Money::from_major(40 + month * 5);
            ledger.add_payment(&admin, NewPayment::new(debt.id, amount, method))?;
        }
        controller.advance(Duration::days(30));
    }

    let dashboard = ledger.dashboard(&admin)?;
    println!("total outstanding: ${}", dashboard.total_outstanding);
    println!("clients owing: {}", dashboard.clients_with_outstanding);
    for month in &dashboard.revenue_trend {
        println!("  {}-{:02}: ${} ({} payments)", month.year, month.month, month.revenue, month.payment_count);
    }

    let report = ledger.monthly_report(&admin, 2024, 3)?;
    println!("\nmarch: ${} over {} payments", report.total_payments, report.payment_count);

    let performance = ledger.collection_performance(&admin, 6)?;
    println!("collected over 6 months: ${}", performance.total_collections);

    let projection = ledger.business_projection(&admin, 3)?;
    println!(
        "next 3 months: ${} collected, ${} still outstanding",
        projection.projected_collections, projection.projected_outstanding
    );

    let top = ledger.top_clients_by_debt(&admin, 1)?;
    if let Some(first) = top.first() {
        println!("largest debtor: {} owes ${}", first.client.name, first.outstanding);
    }

    Ok(())
}
