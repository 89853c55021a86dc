//! REST backend for user profiles.
//!
//! Serves the profile cache as a resource collection under `/users` and
//! exposes find-or-create for external identity profiles. Each record is the
//! cached field hash plus its `email` key.

pub mod cache;
pub mod config;
pub mod error;
pub mod profile;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use cache::{Fields, MemoryCache, ProfileCache};
pub use config::ServerConfig;
pub use error::ProfileError;
pub use profile::{find_or_create_by_external_id, ExternalProfile};

pub type Cache = Arc<dyn ProfileCache>;

pub fn app() -> Router {
    router(Arc::new(MemoryCache::new()))
}

pub fn router(cache: Cache) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{email}", get(get_user).post(save_user).delete(delete_user))
        .route("/auth/profiles", post(find_or_create))
        .layer(TraceLayer::new_for_http())
        .with_state(cache)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn record(email: &str, fields: Fields) -> Value {
    let mut map: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    map.insert("email".to_string(), Value::String(email.to_string()));
    Value::Object(map)
}

/// Hash fields are strings; other JSON scalars are stored in their text form.
fn to_fields(body: Map<String, Value>) -> Fields {
    body.into_iter()
        .filter(|(key, value)| key != "email" && !value.is_null())
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}

async fn list_users(State(cache): State<Cache>) -> Result<Json<Vec<Value>>, ProfileError> {
    let mut users = Vec::new();
    for email in cache.keys().await? {
        if let Some(fields) = cache.read_fields(&email).await? {
            users.push(record(&email, fields));
        }
    }
    Ok(Json(users))
}

async fn get_user(
    State(cache): State<Cache>,
    Path(email): Path<String>,
) -> Result<Json<Value>, ProfileError> {
    let fields = cache
        .read_fields(&email)
        .await?
        .ok_or_else(|| ProfileError::NotFound(email.clone()))?;
    Ok(Json(record(&email, fields)))
}

async fn save_user(
    State(cache): State<Cache>,
    Path(email): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ProfileError> {
    cache.write_fields(&email, to_fields(body)).await?;
    let fields = cache.read_fields(&email).await?.unwrap_or_default();
    Ok(Json(record(&email, fields)))
}

async fn delete_user(
    State(cache): State<Cache>,
    Path(email): Path<String>,
) -> Result<StatusCode, ProfileError> {
    if cache.remove(&email).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ProfileError::NotFound(email))
    }
}

async fn find_or_create(
    State(cache): State<Cache>,
    Json(profile): Json<ExternalProfile>,
) -> Result<Json<Value>, ProfileError> {
    let fields = find_or_create_by_external_id(cache.as_ref(), &profile).await?;
    let email = profile.primary_email().unwrap_or_default();
    Ok(Json(record(email, fields)))
}
