pub mod carts;
pub mod checkout;
pub mod discounts;
pub mod inventory;
pub mod ledger;
pub mod notifications;
pub mod orders;
pub mod partition;
pub mod payments;
pub mod validation;
