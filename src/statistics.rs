use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::balance::Balances;
use crate::money::{Money, MoneyOverflow};
use crate::schemas::{Expense, Member, MemberId};
use crate::validation::{check_expense, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub id: MemberId,
    pub name: String,
    pub payment_handle: Option<String>,
    pub paid: Money,
    pub owed: Money,
    pub balance: Money,
}

#[derive(Default)]
struct Totals {
    paid: Decimal,
    owed: Decimal,
}

/// Per-member totals for display.
///
/// `balance` is copied from `balances` rather than derived from
/// `paid - owed`, so it always agrees with the settlements built from it.
pub fn compute_member_stats(
    expenses: &[Expense],
    members: &[Member],
    balances: &Balances,
) -> Result<Vec<MemberStats>, ValidationError> {
    let mut totals: HashMap<MemberId, Totals> = members
        .iter()
        .map(|member| (member.id, Totals::default()))
        .collect();

    for expense in expenses {
        check_expense(expense, |id| totals.contains_key(&id))?;
        let share = expense.amount / Decimal::from(expense.participant_ids.len());
        if let Some(payer) = totals.get_mut(&expense.payer_id) {
            payer.paid = payer.paid.checked_add(expense.amount).ok_or(MoneyOverflow)?;
        }
        for participant in &expense.participant_ids {
            if let Some(entry) = totals.get_mut(participant) {
                entry.owed = entry.owed.checked_add(share).ok_or(MoneyOverflow)?;
            }
        }
    }

    members
        .iter()
        .map(|member| -> Result<MemberStats, ValidationError> {
            let (paid, owed) = totals
                .get(&member.id)
                .map(|totals| (totals.paid, totals.owed))
                .unwrap_or_default();
            Ok(MemberStats {
                id: member.id,
                name: member.name.clone(),
                payment_handle: member.payment_handle.clone(),
                paid: Money::round_half_up(paid)?,
                owed: Money::round_half_up(owed)?,
                balance: balances.get(member.id).unwrap_or(Money::ZERO),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::compute_balances;
    use crate::validation::ExpenseRef;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn members() -> Vec<Member> {
        vec![
            Member {
                id: 1,
                name: String::from("A"),
                payment_handle: Some(String::from("a@upi")),
            },
            Member {
                id: 2,
                name: String::from("B"),
                payment_handle: None,
            },
            Member {
                id: 3,
                name: String::from("C"),
                payment_handle: None,
            },
        ]
    }

    fn expense(id: i64, amount: Decimal, payer_id: MemberId, participant_ids: &[MemberId]) -> Expense {
        Expense {
            id,
            description: String::from("shared"),
            amount,
            payer_id,
            participant_ids: participant_ids.to_vec(),
            category: String::from("food"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_paid_and_owed() {
        let members = members();
        let expenses = [
            expense(1, dec!(90), 1, &[1, 2, 3]),
            expense(2, dec!(30), 2, &[2, 3]),
        ];
        let balances = compute_balances(&expenses, &members).unwrap();

        let stats = compute_member_stats(&expenses, &members, &balances).unwrap();

        let summary: Vec<(MemberId, i64, i64, i64)> = stats
            .iter()
            .map(|s| (s.id, s.paid.cents(), s.owed.cents(), s.balance.cents()))
            .collect();
        assert_eq!(
            summary,
            vec![(1, 9000, 3000, 6000), (2, 3000, 4500, -1500), (3, 0, 4500, -4500)]
        );
        assert_eq!(stats[0].payment_handle.as_deref(), Some("a@upi"));
    }

    #[test]
    fn balance_comes_from_the_calculator() {
        let members = members();
        let expenses = [expense(1, dec!(10), 1, &[1, 2, 3])];
        let balances: Balances = [(1, 1), (2, 2), (3, 3)]
            .into_iter()
            .map(|(id, cents)| (id, Money::from_cents(cents)))
            .collect();

        let stats = compute_member_stats(&expenses, &members, &balances).unwrap();

        assert_eq!(stats[0].paid, Money::from_cents(1000));
        assert_eq!(stats[0].owed, Money::from_cents(333));
        assert_eq!(stats[0].balance, Money::from_cents(1));
        assert_eq!(stats[2].balance, Money::from_cents(3));
    }

    #[test]
    fn owed_is_rounded_once_per_member() {
        let members = members();
        let expenses = [
            expense(1, dec!(0.01), 1, &[2, 3]),
            expense(2, dec!(0.01), 1, &[2, 3]),
        ];
        let balances = compute_balances(&expenses, &members).unwrap();
        let stats = compute_member_stats(&expenses, &members, &balances).unwrap();
        assert_eq!(stats[1].owed, Money::from_cents(1));
    }

    #[test]
    fn rejects_expense_with_unknown_payer() {
        let members = members();
        let expenses = [expense(4, dec!(10), 8, &[1])];
        let err = compute_member_stats(&expenses, &members, &Balances::default()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownMember {
                expense: ExpenseRef::Stored(4),
                member_id: 8
            }
        );
    }
}
