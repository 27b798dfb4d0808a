use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use mongodb::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tripsplit::repository::{InMemoryTripRepository, MongoTripRepository, TripRepository};
use tripsplit::routes;
use tripsplit::service::TripService;
use tripsplit::settings::Settings;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::new().map_err(std::io::Error::other)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log)),
        )
        .init();

    let repository: Arc<dyn TripRepository> = match &settings.mongodb_uri {
        Some(uri) => {
            let client = Client::with_uri_str(uri)
                .await
                .map_err(std::io::Error::other)?;
            let repository = MongoTripRepository::connect(&client, &settings.database)
                .await
                .map_err(std::io::Error::other)?;
            info!(database = %settings.database, "connected to MongoDB");
            Arc::new(repository)
        }
        None => {
            warn!("MONGODB_URI is not set, trips will only be kept in memory");
            Arc::new(InMemoryTripRepository::default())
        }
    };
    let service = web::Data::new(TripService::new(repository));

    info!(host = %settings.host, port = settings.port, "starting server");
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(service.clone())
            .configure(routes::configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await
}
