/// quick start - minimal example to get started
use debt_ledger_rs::{Ledger, Money, NewClient, NewDebt, NewPayment, PaymentMethod};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Ledger::in_memory()?;
    ledger.bootstrap_admin("Owner", "+15550001", None)?;
    let admin = ledger.authenticate("+15550001")?;

    // register a client and record what they owe
    let client = ledger.create_client(&admin, NewClient::new("Maria Lopez", "+15550100"))?;
    let debt = ledger.create_debt(&admin, NewDebt::new(client.id, Money::from_major(250), "Gold ring"))?;

    // take a first cash payment
    ledger.add_payment(&admin, NewPayment::new(debt.id, Money::from_major(100), PaymentMethod::Cash))?;

    let debt = ledger.debt(&admin, debt.id)?;
    println!("{}", serde_json::to_string_pretty(&debt)?);

    Ok(())
}
