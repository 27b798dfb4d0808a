use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type TripId = String;
pub type MemberId = i64;
pub type ExpenseId = i64;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub settled: bool,
    pub members: Vec<Member>,
    pub expenses: Vec<Expense>,
}

impl Trip {
    pub fn summary(&self) -> TripSummary {
        TripSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            settled: self.settled,
            member_count: self.members.len(),
            expense_count: self.expenses.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub id: TripId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub settled: bool,
    pub member_count: usize,
    pub expense_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub payment_handle: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payer_id: MemberId,
    pub participant_ids: Vec<MemberId>,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    #[serde(default)]
    pub payment_handle: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandleUpdate {
    pub payment_handle: Option<String>,
}

/// Expense fields as submitted by a client, before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDraft {
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payer_id: MemberId,
    pub participant_ids: Vec<MemberId>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    String::from("general")
}

impl ExpenseDraft {
    pub fn into_expense(self, id: ExpenseId, created_at: DateTime<Utc>) -> Expense {
        Expense {
            id,
            description: self.description,
            amount: self.amount,
            payer_id: self.payer_id,
            participant_ids: self.participant_ids,
            category: self.category,
            created_at,
        }
    }
}

pub fn find_member(members: &[Member], id: MemberId) -> Option<&Member> {
    members.iter().find(|member| member.id == id)
}
