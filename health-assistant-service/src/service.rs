use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    analysis::{
        EcgAnalysis, InteractionReport, SkinAnalysis, UploadedFile, analyze_ecg,
        analyze_lab_report, analyze_skin, check_interactions, size_exceeded,
    },
    backend::{self, AppwriteClient},
    config::{Config, megabytes},
    error::ApiError,
    gateway::LlmGateway,
    guides::{self, EmergencyGuide, GuideSummary},
    intake::{ChatTurn, ConversationState, IntakeWorkflow},
    speech::{self, SpeechRequest},
};

const CORRELATION_HEADER: &str = "x-correlation-id";

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn LlmGateway>,
    pub intake: Arc<IntakeWorkflow>,
}

impl AppState {
    pub fn new(config: Config, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            config: Arc::new(config),
            intake: Arc::new(IntakeWorkflow::new(gateway.clone())),
            gateway,
        }
    }
}

/// Build the full application: analysis, chat, speech and guide routes, plus
/// the account and record routes when a backend is configured.
pub fn create_app(config: Config, gateway: Arc<dyn LlmGateway>) -> Router {
    let backend = config
        .backend
        .clone()
        .map(|backend| Arc::new(AppwriteClient::new(backend)));
    build_router(AppState::new(config, gateway), backend)
}

pub fn build_router(state: AppState, backend: Option<Arc<AppwriteClient>>) -> Router {
    let body_limit = body_limit(&state.config);

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/analyze-ecg", post(ecg))
        .route("/api/analyze-lab-report", post(lab_report))
        .route("/api/analyze-skin", post(skin))
        .route("/api/medicine-interactions", post(medicine_interactions))
        .route("/api/personal-ai-doc/chat", post(chat))
        .route("/api/text-to-speech", post(text_to_speech))
        .route("/api/emergency-guides", get(list_guides))
        .route("/api/emergency-guides/{id}", get(get_guide))
        .with_state(state);

    match backend {
        Some(client) => {
            info!("Backend routes enabled");
            app = app.merge(backend::router(client));
        }
        None => info!("No backend configured, account and record routes disabled"),
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Room for the largest image once base64-encoded, plus the JSON around it.
fn body_limit(config: &Config) -> usize {
    config.image_limits.largest_bytes() / 3 * 4 + megabytes(1)
}

/// A body cut off by the body limit, reported against the route's image ceiling.
fn oversized(limit_mb: usize) -> ApiError {
    warn!(limit_mb, "Request body exceeds the body limit");
    ApiError::from_analysis(size_exceeded(limit_mb), "Request body too large")
}

fn image_json<T>(payload: Result<Json<T>, JsonRejection>, limit_mb: usize) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(oversized(limit_mb))
        }
        Err(rejection) => Err(rejection.into()),
    }
}

fn image_form_error(err: MultipartError, limit_mb: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        oversized(limit_mb)
    } else {
        err.into()
    }
}

async fn correlation_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header_value {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Health Assistant Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted health information: image analysis, symptom intake, medicine interactions and emergency guides",
        "endpoints": {
            "POST /api/analyze-ecg": "Interpret an ECG image (JSON imageBase64)",
            "POST /api/analyze-lab-report": "Interpret a lab report photo (multipart image)",
            "POST /api/analyze-skin": "Assess a skin photo (JSON image)",
            "POST /api/medicine-interactions": "Check interactions between medicines",
            "POST /api/personal-ai-doc/chat": "Advance the symptom intake conversation",
            "POST /api/text-to-speech": "Synthesize speech as WAV",
            "GET /api/emergency-guides": "List emergency guides",
            "GET /api/emergency-guides/{id}": "Get one emergency guide",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EcgRequest {
    #[serde(default)]
    pub image_base64: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkinRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    #[serde(default)]
    pub medicine_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_state: ConversationState,
}

async fn ecg(
    State(state): State<AppState>,
    payload: Result<Json<EcgRequest>, JsonRejection>,
) -> ApiResult<EcgAnalysis> {
    let limit_mb = state.config.image_limits.ecg_mb;
    let request = image_json(payload, limit_mb)?;
    let analysis = analyze_ecg(state.gateway.as_ref(), request.image_base64.as_deref(), limit_mb)
        .await
        .map_err(|e| ApiError::from_analysis(e, "Failed to analyze ECG image"))?;
    Ok(Json(analysis))
}

async fn lab_report(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Value> {
    let limit_mb = state.config.image_limits.lab_report_mb;
    let mut fields = file_fields(multipart)
        .await
        .map_err(|e| image_form_error(e, limit_mb))?;
    let analysis = analyze_lab_report(
        state.gateway.as_ref(),
        fields.files.remove("image"),
        limit_mb,
        state.config.lab_report_timeout,
    )
    .await
    .map_err(|e| ApiError::from_analysis(e, "Failed to analyze lab report"))?;
    Ok(Json(json!({ "result": analysis })))
}

async fn skin(
    State(state): State<AppState>,
    payload: Result<Json<SkinRequest>, JsonRejection>,
) -> ApiResult<SkinAnalysis> {
    let limit_mb = state.config.image_limits.skin_mb;
    let request = image_json(payload, limit_mb)?;
    let analysis = analyze_skin(state.gateway.as_ref(), request.image.as_deref(), limit_mb)
        .await
        .map_err(|e| ApiError::from_analysis(e, "Failed to analyze skin image"))?;
    Ok(Json(analysis))
}

async fn medicine_interactions(
    State(state): State<AppState>,
    payload: Result<Json<InteractionRequest>, JsonRejection>,
) -> ApiResult<InteractionReport> {
    let Json(request) = payload?;
    let report = check_interactions(state.gateway.as_ref(), &request.medicine_names)
        .await
        .map_err(|e| ApiError::from_analysis(e, "Failed to check medicine interactions"))?;
    Ok(Json(report))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatTurn> {
    let Json(request) = payload?;
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?;

    info!(step = request.current_state.step, "Processing chat turn");
    let turn = state
        .intake
        .transition(request.current_state, &message)
        .await
        .map_err(|e| {
            error!(error = %e, "Intake turn failed");
            ApiError::upstream("Failed to process message", e)
        })?;
    Ok(Json(turn))
}

async fn text_to_speech(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let audio = speech::synthesize(state.gateway.as_ref(), request).await?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], audio).into_response())
}

async fn list_guides() -> Json<Vec<GuideSummary>> {
    Json(guides::summaries())
}

async fn get_guide(Path(id): Path<String>) -> ApiResult<EmergencyGuide> {
    guides::find_guide(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No emergency guide named '{id}'")))
}

/// Multipart fields split into files and plain text values.
#[derive(Debug, Default)]
pub(crate) struct FormFields {
    pub files: HashMap<String, UploadedFile>,
    /// Text values by field name; repeated fields keep every value
    pub texts: HashMap<String, Vec<String>>,
}

/// Read a whole multipart body. A field counts as a file when it carries a
/// file name or a content type.
pub(crate) async fn file_fields(mut multipart: Multipart) -> Result<FormFields, MultipartError> {
    let mut fields = FormFields::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if file_name.is_some() || content_type.is_some() {
            let bytes = field.bytes().await?.to_vec();
            fields.files.insert(
                name,
                UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                },
            );
        } else {
            let value = field.text().await?;
            fields.texts.entry(name).or_default().push(value);
        }
    }
    Ok(fields)
}
