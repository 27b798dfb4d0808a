use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{RepositoryError, TripRepository};
use crate::schemas::{
    Expense, ExpenseDraft, ExpenseId, Member, MemberId, NewMember, Trip, TripSummary,
};

struct TripRecord {
    trip: Trip,
    next_member_id: MemberId,
    next_expense_id: ExpenseId,
}

/// Process-local store, used by tests and for running without MongoDB.
#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: Mutex<BTreeMap<String, TripRecord>>,
}

impl InMemoryTripRepository {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, TripRecord>> {
        self.trips.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_record<T>(
        &self,
        trip_id: &str,
        f: impl FnOnce(&mut TripRecord) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut trips = self.lock();
        let record = trips
            .get_mut(trip_id)
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_owned()))?;
        f(record)
    }
}

fn expense_not_found(trip_id: &str, expense_id: ExpenseId) -> RepositoryError {
    RepositoryError::ExpenseNotFound {
        trip_id: trip_id.to_owned(),
        expense_id,
    }
}

#[async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError> {
        let mut summaries: Vec<TripSummary> =
            self.lock().values().map(|record| record.trip.summary()).collect();
        summaries.sort_by_key(|summary| summary.created_at);
        Ok(summaries)
    }

    async fn create_trip(&self, id: &str, name: &str) -> Result<Trip, RepositoryError> {
        let mut trips = self.lock();
        if trips.contains_key(id) {
            return Err(RepositoryError::TripExists(id.to_owned()));
        }
        let trip = Trip {
            id: id.to_owned(),
            name: name.to_owned(),
            created_at: Utc::now(),
            settled: false,
            members: Vec::new(),
            expenses: Vec::new(),
        };
        trips.insert(
            id.to_owned(),
            TripRecord {
                trip: trip.clone(),
                next_member_id: 1,
                next_expense_id: 1,
            },
        );
        Ok(trip)
    }

    async fn load_trip(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        self.with_record(trip_id, |record| Ok(record.trip.clone()))
    }

    async fn load_members(&self, trip_id: &str) -> Result<Vec<Member>, RepositoryError> {
        self.with_record(trip_id, |record| Ok(record.trip.members.clone()))
    }

    async fn load_expenses_with_participants(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Expense>, RepositoryError> {
        self.with_record(trip_id, |record| Ok(record.trip.expenses.clone()))
    }

    async fn add_member(&self, trip_id: &str, member: NewMember) -> Result<Member, RepositoryError> {
        self.with_record(trip_id, |record| {
            if record.trip.members.iter().any(|m| m.name == member.name) {
                return Err(RepositoryError::MemberExists {
                    trip_id: trip_id.to_owned(),
                    name: member.name,
                });
            }
            let member = Member {
                id: record.next_member_id,
                name: member.name,
                payment_handle: member.payment_handle,
            };
            record.next_member_id += 1;
            record.trip.members.push(member.clone());
            Ok(member)
        })
    }

    async fn set_payment_handle(
        &self,
        trip_id: &str,
        member_id: MemberId,
        payment_handle: Option<String>,
    ) -> Result<Member, RepositoryError> {
        self.with_record(trip_id, |record| {
            let member = record
                .trip
                .members
                .iter_mut()
                .find(|member| member.id == member_id)
                .ok_or_else(|| RepositoryError::MemberNotFound {
                    trip_id: trip_id.to_owned(),
                    member_id,
                })?;
            member.payment_handle = payment_handle;
            Ok(member.clone())
        })
    }

    async fn add_expense(
        &self,
        trip_id: &str,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError> {
        self.with_record(trip_id, |record| {
            let expense = draft.into_expense(record.next_expense_id, Utc::now());
            record.next_expense_id += 1;
            record.trip.expenses.push(expense.clone());
            Ok(expense)
        })
    }

    async fn replace_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError> {
        self.with_record(trip_id, |record| {
            let slot = record
                .trip
                .expenses
                .iter_mut()
                .find(|expense| expense.id == expense_id)
                .ok_or_else(|| expense_not_found(trip_id, expense_id))?;
            *slot = draft.into_expense(expense_id, slot.created_at);
            Ok(slot.clone())
        })
    }

    async fn delete_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
    ) -> Result<(), RepositoryError> {
        self.with_record(trip_id, |record| {
            let before = record.trip.expenses.len();
            record.trip.expenses.retain(|expense| expense.id != expense_id);
            if record.trip.expenses.len() == before {
                return Err(expense_not_found(trip_id, expense_id));
            }
            Ok(())
        })
    }

    async fn mark_settled(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        self.with_record(trip_id, |record| {
            record.trip.settled = true;
            Ok(record.trip.clone())
        })
    }
}
