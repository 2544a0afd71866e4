use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::errors::{ApiError, ApiResult};
use crate::helpers::response;
use crate::state::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[get("/healthcheck")]
pub async fn healthcheck(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let healthy = state
        .blocking(|store, _| Ok(store.ping()))
        .await?;

    if let Err(err) = healthy {
        tracing::error!("healthcheck failed: {err}");
        return Err(ApiError::Unavailable("Server is not healthy".to_string()));
    }

    Ok(response::ok(Health { status: "OK" }, "Server is healthy"))
}
