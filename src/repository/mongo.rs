use async_trait::async_trait;
use bson::{doc, DateTime as BsonDateTime, Document};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteError, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{RepositoryError, TripRepository};
use crate::schemas::{
    Expense, ExpenseDraft, ExpenseId, Member, MemberId, NewMember, Trip, TripSummary,
};

const TRIPS: &str = "Trips";
const DUPLICATE_KEY: i32 = 11000;

/// A trip as stored in MongoDB: one document embedding its roster and
/// expenses, plus the counters used to hand out member and expense ids.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TripDocument {
    id: String,
    name: String,
    created_at: BsonDateTime,
    settled: bool,
    members: Vec<Member>,
    expenses: Vec<ExpenseDocument>,
    next_member_id: MemberId,
    next_expense_id: ExpenseId,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseDocument {
    id: ExpenseId,
    description: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    payer_id: MemberId,
    participant_ids: Vec<MemberId>,
    category: String,
    created_at: BsonDateTime,
}

impl From<TripDocument> for Trip {
    fn from(document: TripDocument) -> Self {
        Trip {
            id: document.id,
            name: document.name,
            created_at: document.created_at.to_chrono(),
            settled: document.settled,
            members: document.members,
            expenses: document.expenses.into_iter().map(Expense::from).collect(),
        }
    }
}

impl From<ExpenseDocument> for Expense {
    fn from(document: ExpenseDocument) -> Self {
        Expense {
            id: document.id,
            description: document.description,
            amount: document.amount,
            payer_id: document.payer_id,
            participant_ids: document.participant_ids,
            category: document.category,
            created_at: document.created_at.to_chrono(),
        }
    }
}

impl From<&Expense> for ExpenseDocument {
    fn from(expense: &Expense) -> Self {
        ExpenseDocument {
            id: expense.id,
            description: expense.description.clone(),
            amount: expense.amount,
            payer_id: expense.payer_id,
            participant_ids: expense.participant_ids.clone(),
            category: expense.category.clone(),
            created_at: BsonDateTime::from_chrono(expense.created_at),
        }
    }
}

#[derive(Clone, Copy)]
enum Counter {
    Member,
    Expense,
}

impl Counter {
    fn field(self) -> &'static str {
        match self {
            Counter::Member => "nextMemberId",
            Counter::Expense => "nextExpenseId",
        }
    }
}

fn trip_id_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY,
            ..
        }))
    )
}

pub struct MongoTripRepository {
    trips: Collection<TripDocument>,
}

impl MongoTripRepository {
    /// Opens the `Trips` collection and makes sure trip ids are unique.
    pub async fn connect(client: &Client, database: &str) -> Result<Self, RepositoryError> {
        let trips: Collection<TripDocument> = client.database(database).collection(TRIPS);
        trips.create_index(trip_id_index(), None).await?;
        Ok(Self { trips })
    }

    async fn find(&self, trip_id: &str) -> Result<TripDocument, RepositoryError> {
        self.trips
            .find_one(doc! { "id": trip_id }, None)
            .await?
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_owned()))
    }

    /// Increments `counter` on the trip and returns the value it had before.
    async fn next_id(&self, trip_id: &str, counter: Counter) -> Result<i64, RepositoryError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let mut increment = Document::new();
        increment.insert(counter.field(), 1_i64);
        let document = self
            .trips
            .find_one_and_update(doc! { "id": trip_id }, doc! { "$inc": increment }, options)
            .await?
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_owned()))?;
        Ok(match counter {
            Counter::Member => document.next_member_id,
            Counter::Expense => document.next_expense_id,
        })
    }

    async fn find_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
    ) -> Result<Expense, RepositoryError> {
        self.find(trip_id)
            .await?
            .expenses
            .into_iter()
            .find(|expense| expense.id == expense_id)
            .map(Expense::from)
            .ok_or_else(|| RepositoryError::ExpenseNotFound {
                trip_id: trip_id.to_owned(),
                expense_id,
            })
    }
}

#[async_trait]
impl TripRepository for MongoTripRepository {
    async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError> {
        let options = FindOptions::builder().sort(doc! { "createdAt": 1 }).build();
        let documents: Vec<TripDocument> =
            self.trips.find(doc! {}, options).await?.try_collect().await?;
        Ok(documents
            .into_iter()
            .map(|document| Trip::from(document).summary())
            .collect())
    }

    async fn create_trip(&self, id: &str, name: &str) -> Result<Trip, RepositoryError> {
        let document = TripDocument {
            id: id.to_owned(),
            name: name.to_owned(),
            created_at: BsonDateTime::from_chrono(Utc::now()),
            settled: false,
            members: Vec::new(),
            expenses: Vec::new(),
            next_member_id: 1,
            next_expense_id: 1,
        };
        match self.trips.insert_one(&document, None).await {
            Ok(_) => Ok(document.into()),
            Err(error) if is_duplicate_key(&error) => {
                Err(RepositoryError::TripExists(id.to_owned()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn load_trip(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        self.find(trip_id).await.map(Trip::from)
    }

    async fn load_members(&self, trip_id: &str) -> Result<Vec<Member>, RepositoryError> {
        Ok(self.find(trip_id).await?.members)
    }

    async fn load_expenses_with_participants(
        &self,
        trip_id: &str,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let document = self.find(trip_id).await?;
        Ok(document.expenses.into_iter().map(Expense::from).collect())
    }

    async fn add_member(&self, trip_id: &str, member: NewMember) -> Result<Member, RepositoryError> {
        let id = self.next_id(trip_id, Counter::Member).await?;
        let member = Member {
            id,
            name: member.name,
            payment_handle: member.payment_handle,
        };
        let result = self
            .trips
            .update_one(
                doc! { "id": trip_id, "members.name": { "$ne": member.name.as_str() } },
                doc! { "$push": { "members": bson::to_bson(&member)? } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(RepositoryError::MemberExists {
                trip_id: trip_id.to_owned(),
                name: member.name,
            });
        }
        Ok(member)
    }

    async fn set_payment_handle(
        &self,
        trip_id: &str,
        member_id: MemberId,
        payment_handle: Option<String>,
    ) -> Result<Member, RepositoryError> {
        let result = self
            .trips
            .update_one(
                doc! { "id": trip_id, "members.id": member_id },
                doc! { "$set": { "members.$.paymentHandle": payment_handle } },
                None,
            )
            .await?;
        let not_found = || RepositoryError::MemberNotFound {
            trip_id: trip_id.to_owned(),
            member_id,
        };
        if result.matched_count == 0 {
            self.find(trip_id).await?;
            return Err(not_found());
        }
        self.find(trip_id)
            .await?
            .members
            .into_iter()
            .find(|member| member.id == member_id)
            .ok_or_else(not_found)
    }

    async fn add_expense(
        &self,
        trip_id: &str,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError> {
        let id = self.next_id(trip_id, Counter::Expense).await?;
        let expense = draft.into_expense(id, Utc::now());
        let document = bson::to_bson(&ExpenseDocument::from(&expense))?;
        self.trips
            .update_one(
                doc! { "id": trip_id },
                doc! { "$push": { "expenses": document } },
                None,
            )
            .await?;
        Ok(expense)
    }

    async fn replace_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
        draft: ExpenseDraft,
    ) -> Result<Expense, RepositoryError> {
        let current = self.find_expense(trip_id, expense_id).await?;
        let expense = draft.into_expense(expense_id, current.created_at);
        let document = bson::to_bson(&ExpenseDocument::from(&expense))?;
        let result = self
            .trips
            .update_one(
                doc! { "id": trip_id, "expenses.id": expense_id },
                doc! { "$set": { "expenses.$": document } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(RepositoryError::ExpenseNotFound {
                trip_id: trip_id.to_owned(),
                expense_id,
            });
        }
        Ok(expense)
    }

    async fn delete_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
    ) -> Result<(), RepositoryError> {
        let result = self
            .trips
            .update_one(
                doc! { "id": trip_id },
                doc! { "$pull": { "expenses": { "id": expense_id } } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(RepositoryError::TripNotFound(trip_id.to_owned()));
        }
        if result.modified_count == 0 {
            return Err(RepositoryError::ExpenseNotFound {
                trip_id: trip_id.to_owned(),
                expense_id,
            });
        }
        Ok(())
    }

    async fn mark_settled(&self, trip_id: &str) -> Result<Trip, RepositoryError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.trips
            .find_one_and_update(
                doc! { "id": trip_id },
                doc! { "$set": { "settled": true } },
                options,
            )
            .await?
            .map(Trip::from)
            .ok_or_else(|| RepositoryError::TripNotFound(trip_id.to_owned()))
    }
}
