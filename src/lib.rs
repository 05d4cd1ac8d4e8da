use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod error;
pub mod health;
pub mod pdf;
pub mod request_form;
pub mod storage;

pub use crate::config::AppConfig;
pub use crate::error::{ErrorKind, ErrorResponse, RequestError};

use crate::pdf::PaymentRequestPdf;
use crate::request_form::registry::RequestRegistry;
use crate::storage::FileStorage;

/// Shared, read-mostly state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: FileStorage,
    pub registry: RequestRegistry,
    pub renderer: Arc<PaymentRequestPdf>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let storage = FileStorage::local(&config);
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: AppConfig, storage: FileStorage) -> Self {
        Self {
            registry: RequestRegistry::new(Duration::from_secs(config.request_ttl_secs)),
            renderer: Arc::new(PaymentRequestPdf::new(&config)),
            storage,
            config: Arc::new(config),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health::health,
        crate::request_form::handlers::upload_image,
        crate::request_form::handlers::create_request_form,
        crate::request_form::handlers::submit_request_form,
        crate::request_form::handlers::list_request_forms,
        crate::request_form::handlers::get_request_form,
        crate::request_form::handlers::get_request_form_pdf,
        crate::request_form::handlers::payment_methods,
        crate::request_form::handlers::requesting_units,
        crate::request_form::handlers::project_types,
        crate::request_form::handlers::expense_categories,
        crate::request_form::handlers::serve_image
    ),
    components(
        schemas(
            request_form::models::RequestFormSubmission,
            request_form::models::ExpenseLineSubmission,
            request_form::models::RequestFormResponse,
            request_form::models::RequestFormList,
            request_form::models::PaymentRequest,
            request_form::models::ExpenseLine,
            request_form::models::PaymentMethod,
            request_form::models::RequestingUnit,
            request_form::models::ProjectType,
            request_form::models::ExpenseCategory,
            request_form::models::FileUploadResponse,
            request_form::models::EnumOption,
            request_form::handlers::SubmitRequestForm,
            request_form::handlers::UploadImageRequest,
            storage::StoredFile,
            storage::FileCategory,
            health::HealthResponse,
            ErrorResponse,
            error::ErrorDetail,
            ErrorKind,
        )
    ),
    tags(
        (name = "Request Forms", description = "Payment request intake and PDF rendering."),
        (name = "Files", description = "Stored upload retrieval."),
        (name = "Health", description = "Liveness and renderer readiness.")
    ),
    servers(
        (url = "http://127.0.0.1:7860", description = "Local server")
    )
)]
pub struct ApiDoc;

/// Routes shared by the server and the HTTP tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health)).service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health))
            .configure(request_form::handlers::config),
    );
}

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {:#}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    config.ensure_directories()?;

    let app_state = AppState::new(config.clone());
    if let Err(e) = app_state.renderer.fonts() {
        log::error!("OPERATOR ALERT: {}. PDF rendering will fail until this is fixed.", e);
    }
    if !app_state.renderer.engine().is_available() {
        log::error!(
            "OPERATOR ALERT: typst binary '{}' not found. PDF rendering will fail.",
            config.typst_bin.display()
        );
    }
    let app_state = web::Data::new(app_state);

    let prometheus = PrometheusMetricsBuilder::new("request_payment_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let origins = config.cors_origins_list();
    let max_payload = config.max_file_size as usize * 2;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();

        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .max_age(3600);
        if origins.iter().any(|o| o == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &origins {
                cors = cors.allowed_origin(origin);
            }
        }

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .app_data(web::PayloadConfig::new(max_payload))
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
