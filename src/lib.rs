//! Shared-trip expense tracking: who paid what, who owes whom, and the
//! transfers that settle everyone up.

pub mod balance;
pub mod calculation;
pub mod exchange;
pub mod money;
pub mod repository;
pub mod routes;
pub mod schemas;
pub mod service;
pub mod settings;
pub mod statistics;
pub mod validation;

pub use balance::{compute_balances, Balances, ConsistencyWarning};
pub use calculation::{calculate, Calculation};
pub use exchange::{format_settlements, match_settlements, DisplaySettlement, Settlement};
pub use money::Money;
pub use statistics::{compute_member_stats, MemberStats};
pub use validation::ValidationError;
