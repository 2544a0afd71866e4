use actix_web::web;

use crate::errors::ApiError;
use crate::middleware::auth::CheckLogin;
use crate::state::AppState;

pub mod claims;
pub mod config;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod models;
pub mod query;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;

/// Registers shared state, extractor error handling and the `/api/v1` surface.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let sessions = state.sessions.clone();

        cfg.app_data(state)
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                ApiError::bad_request(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                ApiError::bad_request(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _| {
                ApiError::bad_request(err.to_string()).into()
            }))
            .service(
                web::scope("/api/v1")
                    .wrap(CheckLogin { sessions })
                    .configure(routes::configure),
            );
    }
}
