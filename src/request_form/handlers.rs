use actix_multipart::Multipart;
use actix_web::{
    http::header,
    web::{self, Path},
    HttpResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info, warn};
use uuid::Uuid;

use super::builder::PaymentRequestBuilder;
use super::models::{
    EnumOption, ExpenseCategory, FileUploadResponse, PaymentMethod, PaymentRequest, ProjectType,
    RequestFormList, RequestFormResponse, RequestFormSubmission, RequestingUnit,
};
use super::multipart_parser::MultipartParser;
use super::validation::{validate_submission, ValidationError, ValidationErrors};
use crate::error::{ErrorResponse, RequestError};
use crate::pdf::{GeneratedDocument, RenderError, RenderInput};
use crate::storage::{FileCategory, StorageError, StoredFile};
use crate::AppState;

const BANKBOOK_PREFIX: &str = "bankbook";

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct SubmitRequestForm {
    /// JSON-encoded `RequestFormSubmission`.
    #[allow(unused)]
    pub metadata: String,
    #[allow(unused)]
    pub bank_book_image: Option<Vec<u8>>,
}

#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct UploadImageRequest {
    #[allow(unused)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    post,
    path = "/request-forms/upload-image",
    request_body(content = inline(UploadImageRequest), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored", body = FileUploadResponse),
        (status = 400, description = "No file in request", body = ErrorResponse),
        (status = 413, description = "Image too large", body = ErrorResponse),
        (status = 415, description = "Unsupported image type", body = ErrorResponse)
    )
)]
pub async fn upload_image(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let limit = state.storage.size_limit(FileCategory::Image);
    let upload = MultipartParser::parse_file_multipart(payload, limit).await?;
    debug!("Received image upload '{}' ({} bytes)", upload.filename, upload.data.len());

    let data_base64 = STANDARD.encode(&upload.data);
    let stored = state
        .storage
        .store(upload, FileCategory::Image, BANKBOOK_PREFIX)
        .await?;

    Ok(HttpResponse::Ok().json(FileUploadResponse {
        file_id: stored.file_id,
        filename: stored.original_filename,
        size: stored.size_bytes,
        content_type: stored.mime_type,
        data_base64,
    }))
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    post,
    path = "/request-forms",
    request_body = RequestFormSubmission,
    responses(
        (
            status = 201,
            description = "Request validated and registered",
            body = RequestFormResponse
        ),
        (status = 400, description = "Validation failed", body = ErrorResponse)
    )
)]
pub async fn create_request_form(
    submission: web::Json<RequestFormSubmission>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let submission = submission.into_inner();
    let image_id = submission
        .bank_book_image_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let fields = validate_submission(&submission, image_id.is_some())?;

    let bankbook = match image_id {
        Some(id) if fields.payment_method.requires_bankbook() => {
            Some(resolve_bankbook_reference(&state, id).await?)
        }
        Some(id) => {
            debug!("Ignoring bankbook reference {} for {:?}", id, fields.payment_method);
            None
        }
        None => None,
    };

    let request = PaymentRequestBuilder::new(fields)
        .bankbook_image(bankbook)
        .build()?;
    let stored = state.registry.insert(request).await;

    Ok(HttpResponse::Created().json(stored.to_response()))
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    post,
    path = "/request-forms/submit",
    request_body(content = inline(SubmitRequestForm), content_type = "multipart/form-data"),
    responses(
        (
            status = 200,
            description = "Rendered payment request PDF",
            content_type = "application/pdf"
        ),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 413, description = "Bankbook image too large", body = ErrorResponse),
        (status = 415, description = "Unsupported bankbook image type", body = ErrorResponse),
        (status = 500, description = "Rendering failed", body = ErrorResponse)
    )
)]
pub async fn submit_request_form(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let limit = state.storage.size_limit(FileCategory::Image);
    let parsed = MultipartParser::parse_submission_multipart(payload, limit).await?;

    let fields = validate_submission(&parsed.metadata, parsed.file.is_some())?;

    let bankbook = match parsed.file {
        Some(upload) if fields.payment_method.requires_bankbook() => Some(
            state
                .storage
                .store(upload, FileCategory::Image, BANKBOOK_PREFIX)
                .await?,
        ),
        Some(upload) => {
            debug!(
                "Dropping attachment '{}' for {:?}",
                upload.filename, fields.payment_method
            );
            None
        }
        None => None,
    };
    let stored_file_id = bankbook.as_ref().map(|f| f.file_id.clone());

    let rendered = match PaymentRequestBuilder::new(fields).bankbook_image(bankbook).build() {
        Ok(request) => render_pdf(&state, request.clone())
            .await
            .map(|document| (request, document)),
        Err(e) => Err(e),
    };
    let (request, document) = match rendered {
        Ok(rendered) => rendered,
        Err(e) => {
            if let Some(file_id) = &stored_file_id {
                discard_upload(&state, file_id).await;
            }
            return Err(e);
        }
    };

    let stored = state.registry.insert(request).await;
    info!(
        "Rendered request {} ({} pages, {} bytes)",
        stored.id,
        document.page_count,
        document.pdf.len()
    );

    Ok(pdf_response(document, Some(stored.id)))
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms",
    responses(
        (status = 200, description = "Registered requests, newest first", body = RequestFormList)
    )
)]
pub async fn list_request_forms(state: web::Data<AppState>) -> HttpResponse {
    let items: Vec<RequestFormResponse> = state
        .registry
        .list()
        .await
        .iter()
        .map(|stored| stored.to_response())
        .collect();
    let total = items.len();
    HttpResponse::Ok().json(RequestFormList { items, total })
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/{id}",
    responses(
        (status = 200, description = "Request found", body = RequestFormResponse),
        (status = 404, description = "Request not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the request")
    )
)]
pub async fn get_request_form(
    id: Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let id = id.into_inner();
    let stored = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| RequestError::NotFound(format!("request {} not found", id)))?;
    Ok(HttpResponse::Ok().json(stored.to_response()))
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/{id}/pdf",
    responses(
        (
            status = 200,
            description = "Rendered payment request PDF",
            content_type = "application/pdf"
        ),
        (status = 404, description = "Request not found", body = ErrorResponse),
        (status = 500, description = "Rendering failed", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "ID of the request")
    )
)]
pub async fn get_request_form_pdf(
    id: Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let id = id.into_inner();
    let stored = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| RequestError::NotFound(format!("request {} not found", id)))?;

    let document = render_pdf(&state, stored.request.clone()).await?;
    Ok(pdf_response(document, Some(id)))
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/enums/payment-methods",
    responses((status = 200, description = "Payment methods", body = [EnumOption]))
)]
pub async fn payment_methods() -> HttpResponse {
    HttpResponse::Ok().json(EnumOption::list::<PaymentMethod>())
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/enums/requesting-units",
    responses((status = 200, description = "Requesting units", body = [EnumOption]))
)]
pub async fn requesting_units() -> HttpResponse {
    HttpResponse::Ok().json(EnumOption::list::<RequestingUnit>())
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/enums/project-types",
    responses((status = 200, description = "Project types", body = [EnumOption]))
)]
pub async fn project_types() -> HttpResponse {
    HttpResponse::Ok().json(EnumOption::list::<ProjectType>())
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Request Forms",
    get,
    path = "/request-forms/enums/expense-categories",
    responses((status = 200, description = "Expense categories", body = [EnumOption]))
)]
pub async fn expense_categories() -> HttpResponse {
    HttpResponse::Ok().json(EnumOption::list::<ExpenseCategory>())
}

#[utoipa::path(
    context_path = "/api/v1",
    tag = "Files",
    get,
    path = "/files/images/{file_id}",
    responses(
        (status = 200, description = "Stored image bytes"),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    params(
        ("file_id" = String, Path, description = "Stored file name returned by the upload")
    )
)]
pub async fn serve_image(
    file_id: Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, RequestError> {
    let file_id = file_id.into_inner();
    let info = state.storage.info(&file_id).await?;
    let data = state.storage.read(&file_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(info.mime_type)
        .insert_header((header::CACHE_CONTROL, "private, max-age=3600"))
        .body(data))
}

/// Look up an uploaded bankbook by id. A reference to nothing counts as a
/// missing attachment.
async fn resolve_bankbook_reference(
    state: &AppState,
    file_id: &str,
) -> Result<StoredFile, RequestError> {
    match state.storage.info(file_id).await {
        Ok(file) if file.category == FileCategory::Image => Ok(file),
        Ok(file) => Err(StorageError::UnsupportedFileType {
            category: FileCategory::Image,
            detail: format!("{} is {}", file.file_id, file.mime_type),
        }
        .into()),
        Err(StorageError::NotFound(_)) => {
            let mut errors = ValidationErrors::new();
            errors.add(
                ValidationError::missing_attachment("bank_book_image_id")
                    .with_suggestion(format!("找不到已上傳的檔案 {}", file_id)),
            );
            Err(errors.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the bankbook bytes, then compile on the blocking pool.
async fn render_pdf(
    state: &AppState,
    request: PaymentRequest,
) -> Result<GeneratedDocument, RequestError> {
    let mut input = RenderInput::new(request);
    if let Some(file) = input.request.bankbook_image() {
        let data = state.storage.read(&file.file_id).await?;
        input = input.with_bankbook(data);
    }

    let renderer = state.renderer.clone();
    let document = web::block(move || renderer.generate(input))
        .await
        .map_err(|e| RenderError::Blocking(e.to_string()))??;
    Ok(document)
}

async fn discard_upload(state: &AppState, file_id: &str) {
    if let Err(e) = state.storage.delete(file_id).await {
        warn!("Failed to discard upload {}: {}", file_id, e);
    }
}

fn pdf_response(document: GeneratedDocument, request_id: Option<Uuid>) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    response
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.filename),
        ));
    if let Some(id) = request_id {
        response.insert_header(("X-Request-Id", id.to_string()));
    }
    response.body(document.pdf)
}

/// Reject malformed JSON bodies with the shared error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(|err, _req| {
            let message = err.to_string();
            RequestError::BadRequest(message).into()
        })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(
            web::resource("/request-forms")
                .route(web::get().to(list_request_forms))
                .route(web::post().to(create_request_form)),
        )
        .service(web::resource("/request-forms/upload-image").route(web::post().to(upload_image)))
        .service(web::resource("/request-forms/submit").route(web::post().to(submit_request_form)))
        .service(
            web::resource("/request-forms/enums/payment-methods")
                .route(web::get().to(payment_methods)),
        )
        .service(
            web::resource("/request-forms/enums/requesting-units")
                .route(web::get().to(requesting_units)),
        )
        .service(
            web::resource("/request-forms/enums/project-types").route(web::get().to(project_types)),
        )
        .service(
            web::resource("/request-forms/enums/expense-categories")
                .route(web::get().to(expense_categories)),
        )
        .service(web::resource("/request-forms/{id}").route(web::get().to(get_request_form)))
        .service(
            web::resource("/request-forms/{id}/pdf").route(web::get().to(get_request_form_pdf)),
        )
        .service(web::resource("/files/images/{file_id}").route(web::get().to(serve_image)));
}
