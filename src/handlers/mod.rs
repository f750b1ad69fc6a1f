pub mod checkout;
pub mod common;
pub mod ledger;
pub mod orders;
