use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::{get, HttpResponse, Responder};
use actix_web::{web, App, HttpServer};

use sqlx::SqlitePool;

use tracing_actix_web::TracingLogger;

use crate::controller;
use crate::delivery::Delivery;

/// Simple health-check endpoint
#[tracing::instrument(name = "Health check")]
#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("I am alive")
}

/// Run the HTTP API on a specified TCP listener
pub fn run(listener: TcpListener, pool: SqlitePool, delivery: Delivery) -> anyhow::Result<Server> {
    let pool = web::Data::new(pool);
    let delivery = web::Data::new(delivery);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(pool.clone())
            .app_data(delivery.clone())
            .service(health_check)
            .service(controller::newsletters_scope())
            .service(controller::admin_scope())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
