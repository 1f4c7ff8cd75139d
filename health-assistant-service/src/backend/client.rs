use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::BackendConfig;

/// Appwrite accepts at most 36 characters in id-like attribute values.
const MAX_USER_ID_LEN: usize = 36;

pub const DEFAULT_FILE_PERMISSION: &str = r#"read("any")"#;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to the backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An uploaded file as stored in the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "sizeOriginal")]
    pub size: u64,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
}

/// Attribute value for a user id: at most 36 characters, a fresh id when empty.
pub fn sanitize_user_id(user_id: &str) -> String {
    if user_id.is_empty() {
        return Uuid::new_v4().simple().to_string();
    }
    user_id.chars().take(MAX_USER_ID_LEN).collect()
}

/// Appwrite query for `attribute == value`.
pub fn equal_query(attribute: &str, value: &str) -> String {
    json!({ "method": "equal", "attribute": attribute, "values": [value] }).to_string()
}

pub fn order_desc_query(attribute: &str) -> String {
    json!({ "method": "orderDesc", "attribute": attribute }).to_string()
}

/// Document body owned by `user_id`: the caller's fields plus `userId` and `createdAt`.
pub fn owned_document(user_id: &str, fields: Value) -> Value {
    let mut data = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.insert("userId".to_string(), json!(sanitize_user_id(user_id)));
    data.insert("createdAt".to_string(), json!(Utc::now().to_rfc3339()));
    Value::Object(data)
}

/// REST client for the Appwrite project holding accounts, profiles, records and files.
pub struct AppwriteClient {
    http: Client,
    config: BackendConfig,
}

impl AppwriteClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.endpoint, path))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await.unwrap_or(Value::Null));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["message"]
            .as_str()
            .unwrap_or("backend request failed")
            .to_string();
        error!(status = status.as_u16(), error = %message, "Backend request failed");
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn documents_path(&self, collection_id: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            self.config.database_id, collection_id
        )
    }

    async fn create_document(&self, collection_id: &str, data: Value) -> Result<Value, BackendError> {
        let request = self
            .request(Method::POST, &self.documents_path(collection_id))
            .json(&json!({ "documentId": "unique()", "data": data }));
        self.send(request).await
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        queries: &[String],
    ) -> Result<Vec<Value>, BackendError> {
        let params: Vec<(&str, &str)> = queries.iter().map(|q| ("queries[]", q.as_str())).collect();
        let request = self
            .request(Method::GET, &self.documents_path(collection_id))
            .query(&params);
        let mut list = self.send(request).await?;
        Ok(match list["documents"].take() {
            Value::Array(documents) => documents,
            _ => Vec::new(),
        })
    }

    /// Create an account, then its profile document.
    ///
    /// A failed profile write is logged and ignored since the account already exists.
    pub async fn create_account(&self, account: &NewAccount) -> Result<Value, BackendError> {
        let request = self.request(Method::POST, "/account").json(&json!({
            "userId": "unique()",
            "email": account.email,
            "password": account.password,
            "name": account.name,
        }));
        let created = self.send(request).await?;

        let user_id = created["$id"].as_str().unwrap_or_default();
        info!(user_id, "Account created");
        if let Err(e) = self
            .create_profile(user_id, json!({ "name": account.name, "email": account.email }))
            .await
        {
            warn!(user_id, error = %e, "Profile creation failed");
        }
        Ok(created)
    }

    /// Start an email/password session and load the matching profile.
    pub async fn login(&self, credentials: &Credentials) -> Result<Value, BackendError> {
        let request = self
            .request(Method::POST, "/account/sessions/email")
            .json(&json!({ "email": credentials.email, "password": credentials.password }));
        let session = self.send(request).await?;

        let user_id = session["userId"].as_str().unwrap_or_default();
        let profile = self.get_profile(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Profile lookup failed");
            None
        });
        Ok(json!({ "session": session, "profile": profile }))
    }

    pub async fn request_recovery(&self, email: &str, redirect_url: &str) -> Result<Value, BackendError> {
        let request = self
            .request(Method::POST, "/account/recovery")
            .json(&json!({ "email": email, "url": redirect_url }));
        self.send(request).await
    }

    pub async fn create_profile(&self, user_id: &str, fields: Value) -> Result<Value, BackendError> {
        self.create_document(&self.config.user_collection_id, owned_document(user_id, fields))
            .await
    }

    /// First profile document whose `userId` matches.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Value>, BackendError> {
        let queries = [equal_query("userId", &sanitize_user_id(user_id))];
        let documents = self
            .list_documents(&self.config.user_collection_id, &queries)
            .await?;
        Ok(documents.into_iter().next())
    }

    pub async fn update_profile(&self, document_id: &str, fields: Value) -> Result<Value, BackendError> {
        let path = format!(
            "{}/{}",
            self.documents_path(&self.config.user_collection_id),
            document_id
        );
        let request = self
            .request(Method::PATCH, &path)
            .json(&json!({ "data": fields }));
        self.send(request).await
    }

    pub async fn create_medical_record(&self, user_id: &str, fields: Value) -> Result<Value, BackendError> {
        self.create_document(
            &self.config.medical_records_collection_id,
            owned_document(user_id, fields),
        )
        .await
    }

    /// Records of `user_id`, newest first.
    pub async fn medical_records(&self, user_id: &str) -> Result<Vec<Value>, BackendError> {
        let queries = [
            equal_query("userId", &sanitize_user_id(user_id)),
            order_desc_query("createdAt"),
        ];
        self.list_documents(&self.config.medical_records_collection_id, &queries)
            .await
    }

    pub async fn upload_file(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
        permissions: &[String],
    ) -> Result<StoredFile, BackendError> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(mime) = content_type {
            part = part.mime_str(mime)?;
        }

        let mut form = Form::new().text("fileId", "unique()").part("file", part);
        for permission in permissions {
            form = form.text("permissions[]", permission.clone());
        }

        let path = format!("/storage/buckets/{}/files", self.config.storage_bucket_id);
        let stored = self
            .send(self.request(Method::POST, &path).multipart(form))
            .await?;
        serde_json::from_value(stored).map_err(|e| BackendError::Api {
            status: 502,
            message: format!("unexpected upload response: {e}"),
        })
    }
}
