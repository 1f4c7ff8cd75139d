//! Appwrite accounts, profile and medical-record documents, and file storage.

mod client;
mod routes;

pub use client::{AppwriteClient, BackendError, Credentials, NewAccount, StoredFile, sanitize_user_id};
pub use routes::{AuthResponse, router};
