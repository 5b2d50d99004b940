//! Ledger records: users, clients, debts and payments.

mod client;
mod debt;
mod payment;
mod user;

pub use client::{Client, ClientUpdate, NewClient};
pub use debt::{Debt, DebtUpdate, NewDebt};
pub use payment::{NewPayment, Payment, PaymentUpdate};
pub use user::User;
