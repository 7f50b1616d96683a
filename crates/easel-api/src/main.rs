//! HTTP API server for the easel canvas assistant.
//!
//! Exposes PDF ingestion, handwriting capture, typed-note sync, canvas
//! link management, and the streaming `/api/ask` assistant endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use easel_assist::{AssistantEvent, GoogleImageSearch, StreamOrchestrator};
use easel_core::defaults::{EVENT_CHANNEL_CAPACITY, MAX_UPLOAD_BYTES, PAGE_LIMIT, SEARCH_CHUNK_LIMIT};
use easel_core::{CanvasLinkRepository, ChatMessage, DocumentRepository, ImageSearch};
use futures::StreamExt as _;
use easel_db::Database;
use easel_inference::OpenAIBackend;
use easel_ingest::{
    EmbeddingBatcher, HandwritingPipeline, PdfIngestPipeline, PdftotextExtractor, TesseractOcr,
    TextShape, TypedNoteSync,
};
use easel_retrieval::{format_context, ContextAggregator, ContextService};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APP STATE
// =============================================================================

#[derive(Clone)]
struct AppState {
    db: Database,
    pdf: Arc<PdfIngestPipeline>,
    handwriting: Arc<HandwritingPipeline>,
    typed: Arc<TypedNoteSync>,
    context: Arc<ContextService>,
    orchestrator: Arc<StreamOrchestrator>,
    batcher: Arc<EmbeddingBatcher>,
}

/// Parse CORS_ALLOWED_ORIGINS (comma-separated) into header values.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let raw = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "easel_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "easel_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("easel-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/easel".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // One OpenAI-compatible backend serves both embeddings and chat turns
    let backend = Arc::new(OpenAIBackend::from_env()?);
    info!(
        embed_model = %backend.config().embed_model,
        chat_model = %backend.config().chat_model,
        "Inference backend initialized"
    );

    let image_search: Option<Arc<dyn ImageSearch>> = match GoogleImageSearch::from_env() {
        Some(search) => {
            info!("Image search enabled");
            Some(Arc::new(search))
        }
        None => {
            info!("Image search disabled (GOOGLE_SEARCH_API_KEY / GOOGLE_SEARCH_ENGINE_ID unset)");
            None
        }
    };

    let batcher = Arc::new(EmbeddingBatcher::new(backend.clone()));
    let pdf = Arc::new(PdfIngestPipeline::new(
        db.clone(),
        Arc::new(PdftotextExtractor),
        EmbeddingBatcher::new(backend.clone()),
    ));
    let handwriting = Arc::new(HandwritingPipeline::new(
        db.clone(),
        Arc::new(TesseractOcr::new()),
        EmbeddingBatcher::new(backend.clone()),
    ));
    let typed = Arc::new(TypedNoteSync::new(
        db.clone(),
        EmbeddingBatcher::new(backend.clone()),
    ));
    let context = Arc::new(ContextService::new(
        ContextAggregator::new(db.clone()),
        EmbeddingBatcher::new(backend.clone()),
    ));
    let orchestrator = Arc::new(StreamOrchestrator::new(backend.clone(), image_search));

    let state = AppState {
        db,
        pdf,
        handwriting,
        typed,
        context,
        orchestrator,
        batcher,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/ask", post(ask))
        .route("/api/pdf/upload", post(pdf_upload))
        .route("/api/pdf/canvas-link", post(create_canvas_link))
        .route("/api/pdf/canvas-link/:shape_id", delete(delete_canvas_link))
        .route("/api/pdf/documents", get(list_documents))
        .route("/api/pdf/search", post(pdf_search))
        .route("/api/pdf/:id", get(get_document))
        .route("/api/handwriting/upload", post(handwriting_upload))
        .route("/api/typed-note/sync", post(typed_note_sync))
        // Middleware
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// HEALTH
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// ASSISTANT
// =============================================================================

const SYSTEM_PROMPT: &str = "You are an assistant embedded in a collaborative \
canvas. Answer using the provided canvas context when it is relevant, and say \
so when it is not. When the user asks for an image, call the getImageSrc tool \
with a short description and return the URL it finds.";

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    shape_ids: Vec<String>,
}

/// Streamed assistant answer. Retrieval happens first so the context
/// event always precedes any content.
async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }

    let (tx, rx) = mpsc::channel::<AssistantEvent>(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let entries = match state
            .context
            .retrieve(&request.shape_ids, &request.question)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    subsystem = "api",
                    op = "ask",
                    error = %e,
                    "Context retrieval failed"
                );
                let _ = tx.send(AssistantEvent::Error(e.to_string())).await;
                let _ = tx.send(AssistantEvent::Done).await;
                return;
            }
        };

        let system = if entries.is_empty() {
            SYSTEM_PROMPT.to_string()
        } else {
            format!(
                "{}\n\nCanvas context:\n{}",
                SYSTEM_PROMPT,
                format_context(&entries)
            )
        };

        if tx.send(AssistantEvent::Context(entries)).await.is_err() {
            return;
        }

        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(request.question),
        ];
        state.orchestrator.run(messages, tx).await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

// =============================================================================
// PDF DOCUMENTS
// =============================================================================

async fn pdf_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                    .to_vec(),
            );
            break;
        }
    }

    let file_data = file_data
        .ok_or_else(|| ApiError::BadRequest("No file uploaded. Use field name 'file'.".to_string()))?;
    let filename = filename.unwrap_or_else(|| "unnamed.pdf".to_string());

    let report = state.pdf.ingest(&file_data, &filename).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let docs = state
        .pdf
        .list_documents(query.limit, query.offset)
        .await?;
    let count = docs.len();
    Ok(Json(json!({ "documents": docs, "count": count })))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state
        .db
        .documents
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document not found: {}", id)))?;
    Ok(Json(doc))
}

fn default_search_threshold() -> f64 {
    easel_core::defaults::DOCUMENT_SEARCH_THRESHOLD
}

#[derive(Debug, Deserialize)]
struct PdfSearchRequest {
    document_id: Uuid,
    query: String,
    limit: Option<i64>,
    #[serde(default = "default_search_threshold")]
    threshold: f64,
}

/// Direct similarity search over one document's chunks.
async fn pdf_search(
    State(state): State<AppState>,
    Json(request): Json<PdfSearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }
    if !(0.0..=1.0).contains(&request.threshold) {
        return Err(ApiError::BadRequest(
            "threshold must be between 0 and 1".to_string(),
        ));
    }
    if state.db.documents.get(request.document_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Document not found: {}",
            request.document_id
        )));
    }

    let embedding = state.batcher.embed_one(&request.query).await?;
    let limit = request.limit.unwrap_or(SEARCH_CHUNK_LIMIT).clamp(1, PAGE_LIMIT);
    let matches = state
        .db
        .documents
        .match_chunks(&embedding, request.threshold, limit, request.document_id)
        .await?;

    let count = matches.len();
    Ok(Json(json!({ "matches": matches, "count": count })))
}

// =============================================================================
// CANVAS LINKS
// =============================================================================

#[derive(Debug, Deserialize)]
struct CanvasLinkRequest {
    shape_id: String,
    document_id: Uuid,
}

async fn create_canvas_link(
    State(state): State<AppState>,
    Json(request): Json<CanvasLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.shape_id.trim().is_empty() {
        return Err(ApiError::BadRequest("shape_id must not be empty".to_string()));
    }
    if state.db.documents.get(request.document_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Document not found: {}",
            request.document_id
        )));
    }

    let link_id = state
        .db
        .links
        .upsert(&request.shape_id, request.document_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "link_id": link_id,
            "shape_id": request.shape_id,
            "document_id": request.document_id,
        })),
    ))
}

async fn delete_canvas_link(
    State(state): State<AppState>,
    Path(shape_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.db.links.delete(&shape_id).await?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "No link for shape: {}",
            shape_id
        )));
    }
    Ok(Json(json!({ "deleted": true, "shape_id": shape_id })))
}

// =============================================================================
// HANDWRITING
// =============================================================================

/// Registers the note and returns immediately; OCR, chunking, and
/// embedding run in a background task.
async fn handwriting_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut image: Option<Vec<u8>> = None;
    let mut frame_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        match field.name() {
            Some("file") | Some("image") => {
                image = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            ApiError::BadRequest(format!("Failed to read image data: {}", e))
                        })?
                        .to_vec(),
                );
            }
            Some("frame_id") => {
                frame_id = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read frame_id: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let image = image
        .ok_or_else(|| ApiError::BadRequest("No image uploaded. Use field name 'file'.".to_string()))?;
    let frame_id = frame_id
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("frame_id field is required".to_string()))?;

    let note_id = state.handwriting.register(&frame_id).await?;

    let pipeline = state.handwriting.clone();
    let task_frame_id = frame_id.clone();
    tokio::spawn(async move {
        let status = pipeline.process(note_id, &task_frame_id, image).await;
        info!(
            subsystem = "api",
            op = "handwriting_upload",
            note_id = %note_id,
            status = status.as_str(),
            "Handwriting processing finished"
        );
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "note_id": note_id,
            "frame_id": frame_id,
            "status": "processing",
        })),
    ))
}

// =============================================================================
// TYPED NOTES
// =============================================================================

#[derive(Debug, Deserialize)]
struct TypedNoteSyncRequest {
    frame_id: String,
    shapes: Vec<TextShape>,
}

async fn typed_note_sync(
    State(state): State<AppState>,
    Json(request): Json<TypedNoteSyncRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.frame_id.trim().is_empty() {
        return Err(ApiError::BadRequest("frame_id must not be empty".to_string()));
    }
    let report = state.typed.sync(&request.frame_id, request.shapes).await?;
    Ok(Json(report))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(easel_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<easel_core::Error> for ApiError {
    fn from(err: easel_core::Error) -> Self {
        match &err {
            easel_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            easel_core::Error::DocumentNotFound(id) => {
                ApiError::NotFound(format!("Document not found: {}", id))
            }
            easel_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            easel_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    return ApiError::Conflict(msg);
                }
                if msg.contains("foreign key") {
                    return ApiError::BadRequest(msg);
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        let resp = ApiError::NotFound("x".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::BadRequest("x".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = ApiError::Conflict("x".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = easel_core::Error::InvalidInput("bad".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = easel_core::Error::NotFound("gone".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let id = Uuid::now_v7();
        let err: ApiError = easel_core::Error::DocumentNotFound(id).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_pdf_search_request_threshold_default_and_override() {
        let id = Uuid::now_v7();
        let req: PdfSearchRequest = serde_json::from_value(serde_json::json!({
            "document_id": id,
            "query": "hydrology",
        }))
        .unwrap();
        assert_eq!(
            req.threshold,
            easel_core::defaults::DOCUMENT_SEARCH_THRESHOLD
        );

        let req: PdfSearchRequest = serde_json::from_value(serde_json::json!({
            "document_id": id,
            "query": "hydrology",
            "threshold": 0.25,
        }))
        .unwrap();
        assert_eq!(req.threshold, 0.25);
    }

    #[test]
    fn test_ask_request_defaults_shape_ids() {
        let req: AskRequest = serde_json::from_str(r#"{"question": "hi"}"#).unwrap();
        assert!(req.shape_ids.is_empty());
        assert_eq!(req.question, "hi");
    }
}
