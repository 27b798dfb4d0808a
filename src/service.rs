//! Trip use cases: input normalization, the settled-trip lock, and the
//! settlement calculation over a freshly loaded snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::calculation::{calculate, Calculation};
use crate::repository::{RepositoryError, TripRepository};
use crate::schemas::{
    Expense, ExpenseDraft, ExpenseId, Member, MemberId, NewMember, Trip, TripId, TripSummary,
};
use crate::validation::{check_expense, require_non_blank, ExpenseFacts, ExpenseRef, ValidationError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("trip `{0}` is settled; its expenses can no longer change")]
    TripSettled(TripId),
}

pub struct TripService {
    repository: Arc<dyn TripRepository>,
}

impl TripService {
    pub fn new(repository: Arc<dyn TripRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_trips(&self) -> Result<Vec<TripSummary>, ServiceError> {
        Ok(self.repository.list_trips().await?)
    }

    pub async fn create_trip(&self, id: &str, name: &str) -> Result<Trip, ServiceError> {
        let id = require_non_blank("trip id", id)?;
        let name = require_non_blank("name", name)?;
        let trip = self.repository.create_trip(&id, &name).await?;
        info!(trip_id = %trip.id, "trip created");
        Ok(trip)
    }

    pub async fn trip(&self, trip_id: &str) -> Result<Trip, ServiceError> {
        Ok(self.repository.load_trip(trip_id).await?)
    }

    pub async fn add_member(&self, trip_id: &str, member: NewMember) -> Result<Member, ServiceError> {
        let member = NewMember {
            name: require_non_blank("name", &member.name)?,
            payment_handle: normalize_handle(member.payment_handle),
        };
        let roster = self.repository.load_members(trip_id).await?;
        if roster.iter().any(|existing| existing.name == member.name) {
            return Err(RepositoryError::MemberExists {
                trip_id: trip_id.to_owned(),
                name: member.name,
            }
            .into());
        }
        let member = self.repository.add_member(trip_id, member).await?;
        info!(trip_id, member_id = member.id, "member added");
        Ok(member)
    }

    pub async fn update_payment_handle(
        &self,
        trip_id: &str,
        member_id: MemberId,
        payment_handle: Option<String>,
    ) -> Result<Member, ServiceError> {
        Ok(self
            .repository
            .set_payment_handle(trip_id, member_id, normalize_handle(payment_handle))
            .await?)
    }

    pub async fn expenses(&self, trip_id: &str) -> Result<Vec<Expense>, ServiceError> {
        Ok(self.repository.load_expenses_with_participants(trip_id).await?)
    }

    pub async fn add_expense(&self, trip_id: &str, draft: ExpenseDraft) -> Result<Expense, ServiceError> {
        let draft = self.prepare_expense(trip_id, draft, ExpenseRef::Draft).await?;
        let expense = self.repository.add_expense(trip_id, draft).await?;
        info!(trip_id, expense_id = expense.id, amount = %expense.amount, "expense added");
        Ok(expense)
    }

    pub async fn update_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<Expense, ServiceError> {
        let draft = self
            .prepare_expense(trip_id, draft, ExpenseRef::Stored(expense_id))
            .await?;
        let expense = self.repository.replace_expense(trip_id, expense_id, draft).await?;
        info!(trip_id, expense_id, "expense updated");
        Ok(expense)
    }

    pub async fn delete_expense(&self, trip_id: &str, expense_id: ExpenseId) -> Result<(), ServiceError> {
        ensure_open(&self.repository.load_trip(trip_id).await?)?;
        self.repository.delete_expense(trip_id, expense_id).await?;
        info!(trip_id, expense_id, "expense deleted");
        Ok(())
    }

    pub async fn settle(&self, trip_id: &str) -> Result<Trip, ServiceError> {
        let trip = self.repository.mark_settled(trip_id).await?;
        info!(trip_id, "trip settled");
        Ok(trip)
    }

    /// Loads the trip's roster and expenses and runs the settlement engine.
    pub async fn calculate(&self, trip_id: &str) -> Result<Calculation, ServiceError> {
        let members = self.repository.load_members(trip_id).await?;
        let expenses = self
            .repository
            .load_expenses_with_participants(trip_id)
            .await?;
        Ok(calculate(&expenses, &members)?)
    }

    async fn prepare_expense(
        &self,
        trip_id: &str,
        draft: ExpenseDraft,
        expense: ExpenseRef,
    ) -> Result<ExpenseDraft, ServiceError> {
        let trip = self.repository.load_trip(trip_id).await?;
        ensure_open(&trip)?;

        let draft = normalize_draft(draft)?;
        let roster: HashSet<MemberId> = trip.members.iter().map(|member| member.id).collect();
        check_expense(ExpenseFacts::draft(&draft, expense), |id| roster.contains(&id))?;
        Ok(draft)
    }
}

fn ensure_open(trip: &Trip) -> Result<(), ServiceError> {
    if trip.settled {
        return Err(ServiceError::TripSettled(trip.id.clone()));
    }
    Ok(())
}

fn normalize_handle(handle: Option<String>) -> Option<String> {
    handle
        .map(|handle| handle.trim().to_owned())
        .filter(|handle| !handle.is_empty())
}

// Participants form a set: repeated ids are dropped, first occurrence wins.
fn normalize_draft(draft: ExpenseDraft) -> Result<ExpenseDraft, ValidationError> {
    let mut seen = HashSet::with_capacity(draft.participant_ids.len());
    let participant_ids = draft
        .participant_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    Ok(ExpenseDraft {
        description: draft.description.trim().to_owned(),
        amount: draft.amount,
        payer_id: draft.payer_id,
        participant_ids,
        category: require_non_blank("category", &draft.category)?,
    })
}
