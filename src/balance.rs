use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::money::{Money, MoneyOverflow};
use crate::schemas::{Expense, Member, MemberId};
use crate::validation::{check_expense, ValidationError};

/// Net position of every trip member, kept in roster order.
///
/// A positive amount means the member is owed money, a negative one means
/// they owe money.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    order: Vec<MemberId>,
    amounts: HashMap<MemberId, Money>,
}

impl Balances {
    pub fn get(&self, id: MemberId) -> Option<Money> {
        self.amounts.get(&id).copied()
    }

    pub fn member_order(&self) -> &[MemberId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (MemberId, Money)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.amounts.get(id).map(|amount| (*id, *amount)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total(&self) -> Money {
        self.amounts.values().copied().sum()
    }

    /// Reports rounding drift that exceeds a single cent.
    pub fn consistency(&self) -> Option<ConsistencyWarning> {
        let drift = self.total();
        (drift.abs() > Money::EPSILON).then_some(ConsistencyWarning { drift })
    }
}

impl FromIterator<(MemberId, Money)> for Balances {
    fn from_iter<I: IntoIterator<Item = (MemberId, Money)>>(iter: I) -> Self {
        let mut balances = Balances::default();
        for (id, amount) in iter {
            if balances.amounts.insert(id, amount).is_none() {
                balances.order.push(id);
            }
        }
        balances
    }
}

/// Balances that do not add up to zero after rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, serde::Serialize)]
#[error("balances drift {drift} away from zero")]
pub struct ConsistencyWarning {
    pub drift: Money,
}

/// Computes every member's net balance from the trip's expenses.
///
/// Each expense credits its payer with the full amount and debits each
/// participant an equal share. Sums are kept exact and rounded to cents
/// once per member at the end.
pub fn compute_balances(expenses: &[Expense], members: &[Member]) -> Result<Balances, ValidationError> {
    let mut order = Vec::with_capacity(members.len());
    let mut exact: HashMap<MemberId, Decimal> = HashMap::with_capacity(members.len());
    for member in members {
        if exact.insert(member.id, Decimal::ZERO).is_none() {
            order.push(member.id);
        }
    }

    for expense in expenses {
        check_expense(expense, |id| exact.contains_key(&id))?;
        let share = expense.amount / Decimal::from(expense.participant_ids.len());
        adjust(&mut exact, expense.payer_id, expense.amount)?;
        for participant in &expense.participant_ids {
            adjust(&mut exact, *participant, -share)?;
        }
    }

    let amounts: HashMap<MemberId, Money> = exact
        .into_iter()
        .map(|(id, balance)| Money::round_half_up(balance).map(|amount| (id, amount)))
        .collect::<Result<_, MoneyOverflow>>()?;
    Ok(Balances { order, amounts })
}

fn adjust(
    exact: &mut HashMap<MemberId, Decimal>,
    id: MemberId,
    delta: Decimal,
) -> Result<(), MoneyOverflow> {
    if let Some(balance) = exact.get_mut(&id) {
        *balance = balance.checked_add(delta).ok_or(MoneyOverflow)?;
    }
    Ok(())
}

/// Distinct ids of `members`, in roster order.
pub fn member_order(members: &[Member]) -> Vec<MemberId> {
    let mut seen = HashSet::with_capacity(members.len());
    members
        .iter()
        .map(|member| member.id)
        .filter(|id| seen.insert(*id))
        .collect()
}
