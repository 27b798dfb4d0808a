use serde::Serialize;
use tracing::{debug, warn};

use crate::balance::{compute_balances, member_order, ConsistencyWarning};
use crate::exchange::{format_settlements, match_settlements, DisplaySettlement};
use crate::schemas::{Expense, Member};
use crate::statistics::{compute_member_stats, MemberStats};
use crate::validation::ValidationError;

/// Everything a client needs to settle up a trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub member_stats: Vec<MemberStats>,
    pub settlements: Vec<DisplaySettlement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_warning: Option<ConsistencyWarning>,
}

pub fn calculate(expenses: &[Expense], members: &[Member]) -> Result<Calculation, ValidationError> {
    let balances = compute_balances(expenses, members)?;
    let consistency_warning = balances.consistency();
    if let Some(warning) = &consistency_warning {
        warn!(drift = %warning.drift, "balances do not sum to zero");
    }

    let settlements = match_settlements(&balances, &member_order(members));
    debug!(
        members = members.len(),
        expenses = expenses.len(),
        settlements = settlements.len(),
        "computed settlements"
    );

    Ok(Calculation {
        member_stats: compute_member_stats(expenses, members, &balances)?,
        settlements: format_settlements(&settlements, members),
        consistency_warning,
    })
}
