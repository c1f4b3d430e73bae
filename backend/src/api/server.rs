//! HTTP server for the CSV upsert API.
//!
//! # API Endpoints
//!
//! | Method | Path                            | Description                     |
//! |--------|---------------------------------|---------------------------------|
//! | GET    | `/health`                       | Health check                    |
//! | POST   | `/api/contacts/upload`          | Upsert contacts from a CSV file |
//! | GET    | `/api/contacts/records`         | All contacts, newest first      |
//! | GET    | `/api/contacts/records/{id}`    | One contact                     |
//! | POST   | `/api/products/upload`          | Upsert products from a CSV file |
//! | GET    | `/api/products/records`         | All products, newest first      |
//! | GET    | `/api/products/records/{id}`    | One product                     |
//! | GET    | `/api/logs`                     | SSE stream for real-time logs   |

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, sse::KeepAlive, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::logs::LOG_BROADCASTER;
use super::types::HealthResponse;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::import::{ImportResult, ImportService, Importable, SystemClock};
use crate::models::{Contact, Product};
use crate::store::Database;

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub contacts: Arc<ImportService<Contact>>,
    pub products: Arc<ImportService<Product>>,
}

impl AppState {
    /// Wire both entity services to one database with the system clock.
    pub fn new(db: &Database) -> Self {
        let clock = Arc::new(SystemClock);
        Self {
            contacts: Arc::new(ImportService::new(Arc::new(db.contacts()), clock.clone())),
            products: Arc::new(ImportService::new(Arc::new(db.products()), clock)),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/logs", get(sse_logs))
        .nest("/api/contacts", entity_routes(state.contacts))
        .nest("/api/products", entity_routes(state.products))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn entity_routes<E>(service: Arc<ImportService<E>>) -> Router
where
    E: Importable + Serialize,
{
    Router::new()
        .route("/upload", post(upload::<E>))
        .route("/records", get(list::<E>))
        .route("/records/{id}", get(get_record::<E>))
        .with_state(service)
}

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.database)?;
    let app = router(AppState::new(&db), config.max_upload_bytes);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, database = %config.database.display(), "server listening");
    println!("🚀 CSV upsert server running on http://{}", addr);
    for endpoint in endpoints() {
        println!("   {}", endpoint);
    }

    axum::serve(listener, app).await?;

    Ok(())
}

fn endpoints() -> Vec<String> {
    let mut list = vec!["GET  /health".to_string(), "GET  /api/logs (SSE)".to_string()];
    for collection in ["contacts", "products"] {
        list.push(format!("POST /api/{}/upload", collection));
        list.push(format!("GET  /api/{}/records", collection));
        list.push(format!("GET  /api/{}/records/{{id}}", collection));
    }
    list
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(endpoints()))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

async fn upload<E>(
    State(service): State<Arc<ImportService<E>>>,
    mut multipart: Multipart,
) -> ServerResult<Json<ImportResult>>
where
    E: Importable + Serialize,
{
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(upload_error)?;
        file = Some((name, bytes.to_vec()));
    }

    let (name, bytes) = file
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    if !is_csv_file_name(&name) {
        return Err(ServerError::BadRequest("Only CSV files are allowed".to_string()));
    }

    Ok(Json(service.import_bytes(&bytes, &name).await))
}

async fn list<E>(State(service): State<Arc<ImportService<E>>>) -> ServerResult<Json<Vec<E>>>
where
    E: Importable + Serialize,
{
    service.list().await.map(Json).map_err(ServerError::retrieval)
}

async fn get_record<E>(
    State(service): State<Arc<ImportService<E>>>,
    Path(id): Path<i64>,
) -> ServerResult<Json<E>>
where
    E: Importable + Serialize,
{
    service
        .get(id)
        .await
        .map_err(ServerError::retrieval)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(E::KIND.not_found_message().to_string()))
}

/// 413 when the body limit was hit, 400 otherwise.
fn upload_error(err: MultipartError) -> ServerError {
    let message = format!("Error uploading file: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(message)
    } else {
        ServerError::BadRequest(message)
    }
}

fn is_csv_file_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".csv")
}
