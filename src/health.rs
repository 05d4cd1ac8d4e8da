use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether the configured font file is present and loadable.
    pub font_available: bool,
    /// Whether the `typst` binary can be executed.
    pub renderer_available: bool,
    pub timestamp: String,
}

#[utoipa::path(
    tag = "Health",
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let renderer = state.renderer.clone();
    let (font_available, renderer_available) =
        web::block(move || (renderer.fonts().is_ok(), renderer.engine().is_available()))
            .await
            .unwrap_or((false, false));

    let status = if font_available && renderer_available {
        "healthy"
    } else {
        "degraded"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        font_available,
        renderer_available,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
