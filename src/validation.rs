//! Checks that must hold before an expense is allowed anywhere near the
//! balance engine.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::money::MoneyOverflow;
use crate::schemas::{Expense, ExpenseDraft, ExpenseId, MemberId};

/// Largest amount a single expense may carry. Far below the `i64` cent
/// range so that sums over many expenses still fit.
pub const MAX_EXPENSE_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Identifies the expense a [`ValidationError`] is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseRef {
    Stored(ExpenseId),
    Draft,
}

impl fmt::Display for ExpenseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseRef::Stored(id) => write!(f, "expense {id}"),
            ExpenseRef::Draft => f.write_str("new expense"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{expense}: amount must be positive, got {amount}")]
    NonPositiveAmount { expense: ExpenseRef, amount: Decimal },
    #[error("{expense}: amount {amount} exceeds the limit of 1000000000")]
    AmountTooLarge { expense: ExpenseRef, amount: Decimal },
    #[error("{expense}: at least one participant is required")]
    EmptyParticipants { expense: ExpenseRef },
    #[error("{expense}: member {member_id} is not part of the trip")]
    UnknownMember {
        expense: ExpenseRef,
        member_id: MemberId,
    },
    #[error("{field} must not be blank")]
    Blank { field: &'static str },
    #[error(transparent)]
    Overflow(#[from] MoneyOverflow),
}

/// Borrowed view over the fields every expense check needs.
pub struct ExpenseFacts<'a> {
    pub expense: ExpenseRef,
    pub amount: Decimal,
    pub payer_id: MemberId,
    pub participant_ids: &'a [MemberId],
}

impl<'a> From<&'a Expense> for ExpenseFacts<'a> {
    fn from(expense: &'a Expense) -> Self {
        Self {
            expense: ExpenseRef::Stored(expense.id),
            amount: expense.amount,
            payer_id: expense.payer_id,
            participant_ids: &expense.participant_ids,
        }
    }
}

impl<'a> ExpenseFacts<'a> {
    pub fn draft(draft: &'a ExpenseDraft, expense: ExpenseRef) -> Self {
        Self {
            expense,
            amount: draft.amount,
            payer_id: draft.payer_id,
            participant_ids: &draft.participant_ids,
        }
    }
}

/// Rejects a non-positive or oversized amount, an empty participant set, or
/// any payer or participant id for which `is_member` returns false.
pub fn check_expense<'a>(
    facts: impl Into<ExpenseFacts<'a>>,
    is_member: impl Fn(MemberId) -> bool,
) -> Result<(), ValidationError> {
    let facts = facts.into();
    if facts.amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount {
            expense: facts.expense,
            amount: facts.amount,
        });
    }
    if facts.amount > MAX_EXPENSE_AMOUNT {
        return Err(ValidationError::AmountTooLarge {
            expense: facts.expense,
            amount: facts.amount,
        });
    }
    if facts.participant_ids.is_empty() {
        return Err(ValidationError::EmptyParticipants {
            expense: facts.expense,
        });
    }
    let unknown = std::iter::once(&facts.payer_id)
        .chain(facts.participant_ids)
        .find(|id| !is_member(**id));
    match unknown {
        Some(&member_id) => Err(ValidationError::UnknownMember {
            expense: facts.expense,
            member_id,
        }),
        None => Ok(()),
    }
}

/// Trims `value`, rejecting it when nothing is left.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<String, ValidationError> {
    match value.trim() {
        "" => Err(ValidationError::Blank { field }),
        trimmed => Ok(trimmed.to_owned()),
    }
}
