use actix_web::{
    delete, get, http::StatusCode, patch, post, put, web, HttpResponse, ResponseError,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repository::RepositoryError;
use crate::schemas::{ExpenseDraft, ExpenseId, MemberId, NewMember, NewTrip, PaymentHandleUpdate};
use crate::service::{ServiceError, TripService};

/// A [`ServiceError`] on its way out as an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] ServiceError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::TripSettled(_) => StatusCode::CONFLICT,
            ServiceError::Repository(err) => match err {
                RepositoryError::TripNotFound(_)
                | RepositoryError::MemberNotFound { .. }
                | RepositoryError::ExpenseNotFound { .. } => StatusCode::NOT_FOUND,
                RepositoryError::TripExists(_) | RepositoryError::MemberExists { .. } => {
                    StatusCode::CONFLICT
                }
                RepositoryError::Database(_) | RepositoryError::Encoding(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self.0, "request failed");
            String::from("internal server error")
        } else {
            self.0.to_string()
        };
        HttpResponse::build(status).json(ErrorBody { error: message })
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(Health { status: "ok" })
}

#[get("/trips")]
async fn list_trips(service: web::Data<TripService>) -> ApiResult {
    Ok(HttpResponse::Ok().json(service.list_trips().await?))
}

#[put("/trips/{id}")]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
async fn add_trip(
    service: web::Data<TripService>,
    id: web::Path<String>,
    json: web::Json<NewTrip>,
) -> ApiResult {
    let trip = service.create_trip(&id, &json.name).await?;
    Ok(HttpResponse::Created().json(trip))
}

#[get("/trips/{id}")]
async fn get_trip(service: web::Data<TripService>, id: web::Path<String>) -> ApiResult {
    Ok(HttpResponse::Ok().json(service.trip(&id).await?))
}

#[post("/trips/{id}/members")]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
async fn add_member(
    service: web::Data<TripService>,
    id: web::Path<String>,
    member: web::Json<NewMember>,
) -> ApiResult {
    let member = service.add_member(&id, member.into_inner()).await?;
    Ok(HttpResponse::Created().json(member))
}

#[patch("/trips/{id}/members/{member_id}")]
#[tracing::instrument(skip_all)]
async fn update_member(
    service: web::Data<TripService>,
    path: web::Path<(String, MemberId)>,
    update: web::Json<PaymentHandleUpdate>,
) -> ApiResult {
    let (trip_id, member_id) = path.into_inner();
    let member = service
        .update_payment_handle(&trip_id, member_id, update.into_inner().payment_handle)
        .await?;
    Ok(HttpResponse::Ok().json(member))
}

#[get("/trips/{id}/expenses")]
async fn list_expenses(service: web::Data<TripService>, id: web::Path<String>) -> ApiResult {
    Ok(HttpResponse::Ok().json(service.expenses(&id).await?))
}

#[post("/trips/{id}/expenses")]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
async fn add_expense(
    service: web::Data<TripService>,
    id: web::Path<String>,
    expense: web::Json<ExpenseDraft>,
) -> ApiResult {
    let expense = service.add_expense(&id, expense.into_inner()).await?;
    Ok(HttpResponse::Created().json(expense))
}

#[put("/trips/{id}/expenses/{expense_id}")]
#[tracing::instrument(skip_all)]
async fn update_expense(
    service: web::Data<TripService>,
    path: web::Path<(String, ExpenseId)>,
    expense: web::Json<ExpenseDraft>,
) -> ApiResult {
    let (trip_id, expense_id) = path.into_inner();
    let expense = service
        .update_expense(&trip_id, expense_id, expense.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[delete("/trips/{id}/expenses/{expense_id}")]
#[tracing::instrument(skip_all)]
async fn delete_expense(
    service: web::Data<TripService>,
    path: web::Path<(String, ExpenseId)>,
) -> ApiResult {
    let (trip_id, expense_id) = path.into_inner();
    service.delete_expense(&trip_id, expense_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/trips/{id}/settle")]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
async fn settle_trip(service: web::Data<TripService>, id: web::Path<String>) -> ApiResult {
    Ok(HttpResponse::Ok().json(service.settle(&id).await?))
}

#[get("/trips/{id}/calculate")]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
async fn calculate(service: web::Data<TripService>, id: web::Path<String>) -> ApiResult {
    Ok(HttpResponse::Ok().json(service.calculate(&id).await?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(list_trips)
        .service(add_trip)
        .service(get_trip)
        .service(add_member)
        .service(update_member)
        .service(list_expenses)
        .service(add_expense)
        .service(update_expense)
        .service(delete_expense)
        .service(settle_trip)
        .service(calculate);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::test::{
        call_and_read_body_json, call_service, init_service, read_body_json, TestRequest,
    };
    use actix_web::App;
    use serde_json::{json, Value};

    use super::*;
    use crate::repository::InMemoryTripRepository;
    use crate::validation::ValidationError;

    macro_rules! app {
        () => {
            init_service(
                App::new()
                    .app_data(web::Data::new(TripService::new(Arc::new(
                        InMemoryTripRepository::default(),
                    ))))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn reports_health() {
        let app = app!();
        let response = call_service(&app, TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = read_body_json(response).await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[actix_web::test]
    async fn calculates_a_trip_end_to_end() {
        let app = app!();

        let request = TestRequest::put()
            .uri("/trips/goa")
            .set_json(json!({ "name": "Goa" }))
            .to_request();
        assert_eq!(call_service(&app, request).await.status(), StatusCode::CREATED);

        for (name, handle) in [("A", Some("a@upi")), ("B", None), ("C", None)] {
            let request = TestRequest::post()
                .uri("/trips/goa/members")
                .set_json(json!({ "name": name, "paymentHandle": handle }))
                .to_request();
            assert_eq!(call_service(&app, request).await.status(), StatusCode::CREATED);
        }

        for (amount, payer, participants) in [(90, 1, vec![1, 2, 3]), (30, 2, vec![2, 3])] {
            let request = TestRequest::post()
                .uri("/trips/goa/expenses")
                .set_json(json!({
                    "description": "shared",
                    "amount": amount,
                    "payerId": payer,
                    "participantIds": participants,
                    "category": "food"
                }))
                .to_request();
            assert_eq!(call_service(&app, request).await.status(), StatusCode::CREATED);
        }

        let request = TestRequest::get().uri("/trips/goa/calculate").to_request();
        let body: Value = call_and_read_body_json(&app, request).await;

        assert_eq!(body["settlements"][0]["fromName"], "B");
        assert_eq!(body["settlements"][0]["toPaymentHandle"], "a@upi");
        assert_eq!(body["settlements"][0]["amount"], 15.0);
        assert_eq!(body["settlements"][1]["fromId"], 3);
        assert_eq!(body["settlements"][1]["amount"], 45.0);
        assert_eq!(body["memberStats"][1]["paid"], 30.0);
        assert_eq!(body["memberStats"][1]["owed"], 45.0);
        assert_eq!(body["memberStats"][1]["balance"], -15.0);
    }

    #[actix_web::test]
    async fn settled_trip_answers_conflict() {
        let app = app!();
        let setup = [
            TestRequest::put()
                .uri("/trips/alps")
                .set_json(json!({ "name": "Alps" })),
            TestRequest::post()
                .uri("/trips/alps/members")
                .set_json(json!({ "name": "A" })),
            TestRequest::post().uri("/trips/alps/settle"),
        ];
        for request in setup {
            assert!(call_service(&app, request.to_request()).await.status().is_success());
        }

        let request = TestRequest::post()
            .uri("/trips/alps/expenses")
            .set_json(json!({ "amount": 10, "payerId": 1, "participantIds": [1] }))
            .to_request();
        let response = call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: Value = read_body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("settled"));
    }

    #[actix_web::test]
    async fn unknown_trip_is_not_found() {
        let app = app!();
        let request = TestRequest::get().uri("/trips/nowhere/calculate").to_request();
        let response = call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (
                ServiceError::Validation(ValidationError::Blank { field: "name" }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::TripSettled(String::from("x")),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Repository(RepositoryError::TripExists(String::from("x"))),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Repository(RepositoryError::ExpenseNotFound {
                    trip_id: String::from("x"),
                    expense_id: 1,
                }),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }
}
