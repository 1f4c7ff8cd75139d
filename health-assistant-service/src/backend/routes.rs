use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::client::{
    AppwriteClient, BackendError, Credentials, DEFAULT_FILE_PERMISSION, NewAccount, StoredFile,
};
use crate::error::ApiError;
use crate::service::file_fields;

pub const DEFAULT_RECOVERY_URL: &str = "https://dragent.app/reset-password";

/// Envelope for the account routes.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResponse {
    fn ok(data: Value) -> Response {
        Json(AuthResponse {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response()
    }

    fn failed(status: StatusCode, error: impl Into<String>) -> Response {
        let body = AuthResponse {
            success: false,
            data: None,
            error: Some(error.into()),
        };
        (status, Json(body)).into_response()
    }

    fn from_backend(err: BackendError) -> Response {
        warn!(error = %err, "Account request failed");
        Self::failed(backend_status(&err), err.to_string())
    }
}

/// Backend client errors keep their status; everything else is a 500.
fn backend_status(err: &BackendError) -> StatusCode {
    err.status()
        .filter(|code| (400..500).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError::Upstream {
            status: backend_status(&err),
            message: "Backend request failed".to_string(),
            details: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub fn router(client: Arc<AppwriteClient>) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/recovery", post(recovery))
        .route("/api/profile/{user_id}", get(get_profile))
        .route("/api/profile/document/{document_id}", patch(update_profile))
        .route(
            "/api/medical-records/{user_id}",
            get(list_medical_records).post(create_medical_record),
        )
        .route("/api/files", post(upload_file))
        .with_state(client)
}

async fn signup(
    State(client): State<Arc<AppwriteClient>>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> Response {
    let Json(account) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AuthResponse::failed(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match client.create_account(&account).await {
        Ok(created) => AuthResponse::ok(created),
        Err(e) => AuthResponse::from_backend(e),
    }
}

async fn login(
    State(client): State<Arc<AppwriteClient>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Json(credentials) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AuthResponse::failed(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    match client.login(&credentials).await {
        Ok(session) => AuthResponse::ok(session),
        Err(e) => AuthResponse::from_backend(e),
    }
}

async fn recovery(
    State(client): State<Arc<AppwriteClient>>,
    payload: Result<Json<RecoveryRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return AuthResponse::failed(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let url = request.url.as_deref().unwrap_or(DEFAULT_RECOVERY_URL);
    match client.request_recovery(&request.email, url).await {
        Ok(token) => AuthResponse::ok(token),
        Err(e) => AuthResponse::from_backend(e),
    }
}

async fn get_profile(
    State(client): State<Arc<AppwriteClient>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match client.get_profile(&user_id).await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(ApiError::NotFound(format!("No profile for user {user_id}"))),
    }
}

fn object_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let Json(body) = payload?;
    if !body.is_object() {
        return Err(ApiError::BadRequest("Request body must be a JSON object".to_string()));
    }
    Ok(body)
}

async fn update_profile(
    State(client): State<Arc<AppwriteClient>>,
    Path(document_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let fields = object_body(payload)?;
    info!(document_id = %document_id, "Updating profile");
    Ok(Json(client.update_profile(&document_id, fields).await?))
}

async fn list_medical_records(
    State(client): State<Arc<AppwriteClient>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let records = client.medical_records(&user_id).await?;
    Ok(Json(json!({ "records": records })))
}

async fn create_medical_record(
    State(client): State<Arc<AppwriteClient>>,
    Path(user_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let fields = object_body(payload)?;
    let record = client.create_medical_record(&user_id, fields).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn upload_file(
    State(client): State<Arc<AppwriteClient>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), ApiError> {
    let mut fields = file_fields(multipart).await?;
    let file = fields
        .files
        .remove("file")
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let mut permissions = fields.texts.remove("permissions").unwrap_or_default();
    if permissions.is_empty() {
        permissions.push(DEFAULT_FILE_PERMISSION.to_string());
    }

    let file_name = file
        .file_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    info!(file_name = %file_name, bytes = file.bytes.len(), "Uploading file");
    let stored = client
        .upload_file(&file_name, file.content_type.as_deref(), file.bytes, &permissions)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
