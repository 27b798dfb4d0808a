//! Storage port for trips, their rosters and their expenses.
//!
//! The balance engine never talks to a store directly; the HTTP layer loads
//! a snapshot through [`TripRepository`] and hands it to the engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::schemas::{
    Expense, ExpenseDraft, ExpenseId, Member, MemberId, NewMember, Trip, TripId, TripSummary,
};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryTripRepository;
pub use mongo::MongoTripRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("trip `{0}` not found")]
    TripNotFound(TripId),
    #[error("member {member_id} not found in trip `{trip_id}`")]
    MemberNotFound { trip_id: TripId, member_id: MemberId },
    #[error("expense {expense_id} not found in trip `{trip_id}`")]
    ExpenseNotFound {
        trip_id: TripId,
        expense_id: ExpenseId,
    },
    #[error("trip `{0}` already exists")]
    TripExists(TripId),
    #[error("member `{name}` already exists in trip `{trip_id}`")]
    MemberExists { trip_id: TripId, name: String },
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encoding(#[from] bson::ser::Error),
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError>;

    async fn create_trip(&self, id: &str, name: &str) -> Result<Trip, RepositoryError>;

    async fn load_trip(&self, trip_id: &str) -> Result<Trip, RepositoryError>;

    /// Members in insertion order.
    async fn load_members(&self, trip_id: &str) -> Result<Vec<Member>, RepositoryError>;

    /// Expenses with their full participant id lists.
    async fn load_expenses_with_participants(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Expense>, RepositoryError>;

    async fn add_member(&self, trip_id: &str, member: NewMember) -> Result<Member, RepositoryError>;

    async fn set_payment_handle(
        &self,
        trip_id: &str,
        member_id: MemberId,
        payment_handle: Option<String>,
    ) -> Result<Member, RepositoryError>;

    async fn add_expense(
        &self,
        trip_id: &str,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError>;

    /// Replaces an expense's fields, keeping its id and creation time.
    async fn replace_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError>;

    async fn delete_expense(&self, trip_id: &str, expense_id: ExpenseId)
        -> Result<(), RepositoryError>;

    async fn mark_settled(&self, trip_id: &str) -> Result<Trip, RepositoryError>;
}
