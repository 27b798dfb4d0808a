use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::balance::Balances;
use crate::money::Money;
use crate::schemas::{find_member, Member, MemberId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub from_id: MemberId,
    pub to_id: MemberId,
    pub amount: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettlement {
    pub from_name: String,
    pub to_name: String,
    pub from_id: MemberId,
    pub to_id: MemberId,
    pub amount: Money,
    pub to_payment_handle: Option<String>,
    pub from_payment_handle: Option<String>,
}

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: MemberId,
    remaining: Money,
}

// Creditors and debtors in the order given, never re-sorted by amount.
fn split_by_sign(
    balances: &Balances,
    member_order: &[MemberId],
) -> (Vec<PersonalBalance>, Vec<PersonalBalance>) {
    let mut seen = HashSet::with_capacity(member_order.len());
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();

    for &id in member_order {
        if !seen.insert(id) {
            continue;
        }
        let balance = balances.get(id).unwrap_or(Money::ZERO);
        if balance > Money::EPSILON {
            creditors.push(PersonalBalance {
                id,
                remaining: balance,
            });
        } else if balance < -Money::EPSILON {
            debtors.push(PersonalBalance {
                id,
                remaining: balance.abs(),
            });
        }
    }
    (creditors, debtors)
}

/// Pairs debtors with creditors greedily, walking both lists front to back.
///
/// Each step moves the smaller of the two outstanding amounts from the
/// current debtor to the current creditor, and moves past whichever side
/// (or both) has been fully settled. The result has at most
/// `creditors + debtors - 1` transfers but is not guaranteed to be the
/// smallest possible set.
pub fn match_settlements(balances: &Balances, member_order: &[MemberId]) -> Vec<Settlement> {
    let (mut creditors, mut debtors) = split_by_sign(balances, member_order);
    let mut settlements = Vec::new();
    let mut creditor_idx = 0;
    let mut debtor_idx = 0;

    while let (Some(creditor), Some(debtor)) =
        (creditors.get_mut(creditor_idx), debtors.get_mut(debtor_idx))
    {
        let amount = creditor.remaining.min(debtor.remaining);
        settlements.push(Settlement {
            from_id: debtor.id,
            to_id: creditor.id,
            amount,
        });

        creditor.remaining -= amount;
        debtor.remaining -= amount;

        if creditor.remaining < Money::EPSILON {
            creditor_idx += 1;
        }
        if debtor.remaining < Money::EPSILON {
            debtor_idx += 1;
        }
    }
    settlements
}

/// Resolves the members on both ends of every settlement.
///
/// An id missing from `members` is shown as `User <id>` without a payment
/// handle and logged, since it means an expense outlived its member.
pub fn format_settlements(settlements: &[Settlement], members: &[Member]) -> Vec<DisplaySettlement> {
    settlements
        .iter()
        .map(|settlement| {
            let (from_name, from_payment_handle) = display_party(members, settlement.from_id);
            let (to_name, to_payment_handle) = display_party(members, settlement.to_id);
            DisplaySettlement {
                from_name,
                to_name,
                from_id: settlement.from_id,
                to_id: settlement.to_id,
                amount: settlement.amount,
                to_payment_handle,
                from_payment_handle,
            }
        })
        .collect()
}

fn display_party(members: &[Member], id: MemberId) -> (String, Option<String>) {
    match find_member(members, id) {
        Some(member) => (member.name.clone(), member.payment_handle.clone()),
        None => {
            warn!(member_id = id, "settlement references a member missing from the roster");
            (format!("User {id}"), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn balances(entries: &[(MemberId, i64)]) -> Balances {
        entries
            .iter()
            .map(|(id, cents)| (*id, Money::from_cents(*cents)))
            .collect()
    }

    fn transfer(from_id: MemberId, to_id: MemberId, cents: i64) -> Settlement {
        Settlement {
            from_id,
            to_id,
            amount: Money::from_cents(cents),
        }
    }

    #[test]
    fn one_creditor_two_debtors() {
        let balances = balances(&[(1, 6000), (2, -1500), (3, -4500)]);
        let settlements = match_settlements(&balances, &[1, 2, 3]);
        assert_eq!(settlements, vec![transfer(2, 1, 1500), transfer(3, 1, 4500)]);
    }

    #[test]
    fn two_members() {
        let balances = balances(&[(1, 2500), (2, -2500)]);
        assert_eq!(match_settlements(&balances, &[1, 2]), vec![transfer(2, 1, 2500)]);
    }

    #[test]
    fn follows_member_order_not_magnitude() {
        let balances = balances(&[(1, -1000), (2, 3000), (3, -2000)]);

        assert_eq!(
            match_settlements(&balances, &[1, 2, 3]),
            vec![transfer(1, 2, 1000), transfer(3, 2, 2000)]
        );
        assert_eq!(
            match_settlements(&balances, &[3, 2, 1]),
            vec![transfer(3, 2, 2000), transfer(1, 2, 1000)]
        );
    }

    #[test]
    fn both_pointers_advance_on_exact_match() {
        let balances = balances(&[(1, 1000), (2, 500), (3, -1000), (4, -500)]);
        assert_eq!(
            match_settlements(&balances, &[1, 2, 3, 4]),
            vec![transfer(3, 1, 1000), transfer(4, 2, 500)]
        );
    }

    #[test]
    fn splits_a_debtor_across_creditors() {
        let balances = balances(&[(1, 700), (2, 300), (3, -1000)]);
        assert_eq!(
            match_settlements(&balances, &[1, 2, 3]),
            vec![transfer(3, 1, 700), transfer(3, 2, 300)]
        );
    }

    #[rstest]
    #[case(&[(1, 1), (2, -1)])]
    #[case(&[(1, 0), (2, 0)])]
    #[case(&[])]
    fn balances_within_a_cent_need_no_transfer(#[case] entries: &[(MemberId, i64)]) {
        let balances = balances(entries);
        let order: Vec<MemberId> = entries.iter().map(|(id, _)| *id).collect();
        assert!(match_settlements(&balances, &order).is_empty());
    }

    #[test]
    fn ignores_ids_without_balance_and_repeated_ids() {
        let balances = balances(&[(1, 500), (2, -500)]);
        assert_eq!(
            match_settlements(&balances, &[9, 1, 1, 2, 2]),
            vec![transfer(2, 1, 500)]
        );
    }

    #[test]
    fn formats_with_names_and_handles() {
        let members = vec![
            Member {
                id: 1,
                name: String::from("Asha"),
                payment_handle: Some(String::from("asha@upi")),
            },
            Member {
                id: 2,
                name: String::from("Bram"),
                payment_handle: None,
            },
        ];

        let display = format_settlements(&[transfer(2, 1, 1500)], &members);

        assert_eq!(
            display,
            vec![DisplaySettlement {
                from_name: String::from("Bram"),
                to_name: String::from("Asha"),
                from_id: 2,
                to_id: 1,
                amount: Money::from_cents(1500),
                to_payment_handle: Some(String::from("asha@upi")),
                from_payment_handle: None,
            }]
        );
    }

    #[test]
    fn formats_unknown_members_with_fallback_label() {
        let display = format_settlements(&[transfer(4, 5, 100)], &[]);
        assert_eq!(display[0].from_name, "User 4");
        assert_eq!(display[0].to_name, "User 5");
        assert_eq!(display[0].to_payment_handle, None);
    }

    #[test]
    fn serializes_display_settlement_in_camel_case() {
        let display = format_settlements(&[transfer(2, 1, 2500)], &[]);
        let json = serde_json::to_value(&display[0]).unwrap();
        assert_eq!(json["fromId"], 2);
        assert_eq!(json["toName"], "User 1");
        assert_eq!(json["amount"], 25.0);
        assert!(json["toPaymentHandle"].is_null());
    }

    // Even cents keep every nonzero balance above the one-cent threshold.
    fn zero_sum_balances() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(-25_000i64..=25_000, 1..=8).prop_map(|halves| {
            let mut cents: Vec<i64> = halves.into_iter().map(|half| half * 2).collect();
            let total: i64 = cents.iter().sum();
            cents.push(-total);
            cents
        })
    }

    proptest! {
        #[test]
        fn settles_every_zero_sum_balance(cents in zero_sum_balances()) {
            let entries: Vec<(MemberId, i64)> =
                cents.iter().enumerate().map(|(idx, c)| (idx as MemberId + 1, *c)).collect();
            let order: Vec<MemberId> = entries.iter().map(|(id, _)| *id).collect();
            let balances = balances(&entries);

            let settlements = match_settlements(&balances, &order);

            for settlement in &settlements {
                prop_assert!(settlement.amount > Money::ZERO);
                prop_assert_ne!(settlement.from_id, settlement.to_id);
            }
            let active = entries.iter().filter(|(_, c)| c.abs() > 1).count();
            prop_assert!(settlements.len() <= active.saturating_sub(1));

            for (id, balance) in balances.iter() {
                let paid: Money = settlements.iter().filter(|s| s.from_id == id).map(|s| s.amount).sum();
                let received: Money = settlements.iter().filter(|s| s.to_id == id).map(|s| s.amount).sum();
                prop_assert_eq!(received - paid, balance);
            }

            prop_assert_eq!(match_settlements(&balances, &order), settlements);
        }
    }
}
