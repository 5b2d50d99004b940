/// bulk operations - per-item results for settle and delete batches
use debt_ledger_rs::{Ledger, Money, NewClient, NewDebt, NewPayment, PaymentMethod, Uuid};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== bulk operations example ===\n");

    let ledger = Ledger::in_memory()?;
    ledger.bootstrap_admin("Owner", "+15550001", None)?;
    let admin = ledger.authenticate("+15550001")?;

    let client = ledger.create_client(&admin, NewClient::new("Ada Greene", "+15550300"))?;
    let mut debts = Vec::new();
    for (amount, description) in [(120, "Watch strap"), (80, "Earrings"), (45, "Cleaning")] {
        debts.push(ledger.create_debt(&admin, NewDebt::new(client.id, Money::from_major(amount), description))?);
    }
    let payment = ledger.add_payment(&admin, NewPayment::new(debts[0].id, Money::from_major(20), PaymentMethod::Cash))?;

    // delete one real payment and one unknown id
    let result = ledger.delete_payments(&admin, &[payment.id, Uuid::new_v4()])?;
    println!(
        "delete payments: {} ok, {} failed",
        result.success_count, result.failure_count
    );
    for error in &result.errors {
        println!("  {} -> {}", error.id, error.message);
    }

    // write off two debts administratively
    let result = ledger.settle_debts(&admin, &[debts[1].id, debts[2].id])?;
    println!("settle debts: {} ok, {} failed", result.success_count, result.failure_count);

    // a debt without payments can be deleted
    let result = ledger.delete_debts(&admin, &[debts[0].id])?;
    println!("delete debts: {} ok, {} failed", result.success_count, result.failure_count);

    println!("\nremaining debts: {}", ledger.debts(&admin)?.len());
    Ok(())
}
