//! HTTP server for the analyst web UI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Interactive form listing the preset comparison targets |
//! | `POST` | `/analyze` | Answer a question against an uploaded PDF or a preset |
//! | `POST` | `/rebuild-sura` | Force-rebuild the Grupo Sura reference base |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response is a JSON envelope:
//!
//! ```json
//! { "ok": false, "error": "La pregunta no puede estar vacía" }
//! ```
//!
//! Client input problems map to 400, configuration and provider failures to
//! 500, and a missing reference document on rebuild to 404. Handler errors
//! are classified by downcasting to [`AnalysisError`]; nothing beyond the
//! message string reaches the client.
//!
//! # Uploads
//!
//! Uploaded PDFs are staged under a per-request directory, turned into an
//! ephemeral knowledge base, queried, and torn down (snapshot and staging
//! directory both removed) before the response leaves, success or failure.
//! The body limit caps uploads at 20 MB before any handler runs.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compare;
use crate::config::{self, Config};
use crate::error::AnalysisError;
use crate::kb::KnowledgeBase;
use crate::registry::Registry;

/// Upload size cap, enforced by the body limit layer.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    registry: Arc<Registry>,
}

/// Builds the application router. Exposed separately from [`run_server`] so
/// tests can drive the routes against an ephemeral listener.
pub fn app(config: Arc<Config>, registry: Arc<Registry>) -> Router {
    let state = AppState { config, registry };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/analyze", post(handle_analyze))
        .route("/rebuild-sura", post(handle_rebuild))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the process terminates.
pub async fn run_server(config: Arc<Config>, registry: Arc<Registry>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let router = app(config, registry);

    info!(addr = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

// ============ Error response ============

/// Error that renders as the `{ok: false, error}` envelope.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "ok": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn server_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// Maps a handler failure to the HTTP status its class prescribes. Client
/// errors pass through quietly; server-side classes are logged here, at the
/// boundary, with full context.
fn classify_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::InvalidInput(msg)) => bad_request(msg.clone()),
        Some(AnalysisError::Extraction(msg)) => {
            debug!(error = %msg, "extraction failed");
            bad_request(msg.clone())
        }
        Some(AnalysisError::Configuration(msg)) => {
            error!(error = %msg, "configuration error");
            server_error(msg.clone())
        }
        Some(AnalysisError::Provider(msg)) => {
            error!(error = %msg, "provider call failed");
            server_error(msg.clone())
        }
        Some(AnalysisError::NotBuilt(msg)) => {
            error!(error = %msg, "invariant violation: search before build");
            server_error(msg.clone())
        }
        None => {
            error!(error = ?err, "unhandled error in request handler");
            server_error(format!("Error interno: {}", err))
        }
    }
}

// ============ GET / ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.config))
}

fn render_index(config: &Config) -> String {
    let mut options = String::new();
    for preset in &config.presets {
        let filename = preset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        options.push_str(&format!(
            r#"<option value="{}">{} — {}</option>"#,
            preset.key, preset.label, filename
        ));
    }

    format!(
        r#"<!doctype html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>Analista EEFF</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
textarea, select, input {{ width: 100%; margin: 0.25rem 0 1rem; }}
#answer {{ white-space: pre-wrap; border: 1px solid #ccc; padding: 1rem; }}
</style>
</head>
<body>
<h1>Comparador de estados financieros</h1>
<p>Compara un documento contra los estados financieros de Grupo Sura ({reference_label}).</p>
<form id="form">
  <label>Pregunta</label>
  <textarea name="question" rows="3" required></textarea>
  <label>PDF a comparar (opcional si eliges un preset)</label>
  <input type="file" name="pdf" accept=".pdf">
  <label>Preset</label>
  <select name="preset_key">
    <option value="">— ninguno —</option>
    {options}
  </select>
  <button type="submit">Analizar</button>
</form>
<h2>Respuesta</h2>
<div id="answer"></div>
<script>
document.getElementById('form').addEventListener('submit', async (e) => {{
  e.preventDefault();
  const answer = document.getElementById('answer');
  answer.textContent = 'Analizando…';
  const resp = await fetch('/analyze', {{ method: 'POST', body: new FormData(e.target) }});
  const data = await resp.json();
  answer.textContent = data.ok ? data.answer : 'Error: ' + data.error;
}});
</script>
</body>
</html>"#,
        reference_label = config.reference.label,
        options = options
    )
}

// ============ POST /analyze ============

#[derive(Default)]
struct AnalyzeForm {
    question: String,
    preset_key: Option<String>,
    pdf: Option<(String, Vec<u8>)>,
}

async fn read_analyze_form(multipart: &mut Multipart) -> Result<AnalyzeForm, AppError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Formulario inválido: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question" => {
                form.question = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Campo 'question' ilegible: {}", e)))?;
            }
            "preset_key" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Campo 'preset_key' ilegible: {}", e)))?;
                let value = value.trim().to_string();
                if !value.is_empty() {
                    form.preset_key = Some(value);
                }
            }
            "pdf" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Archivo PDF ilegible: {}", e)))?;
                // Browsers submit an empty part when no file was chosen.
                if !filename.is_empty() || !bytes.is_empty() {
                    form.pdf = Some((filename, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn allowed_file(filename: &str) -> bool {
    filename.contains('.') && filename.to_lowercase().ends_with(".pdf")
}

/// Keeps letters, digits, `.`, `-`, and `_`; everything else becomes `_`.
/// Leading dots are stripped so a name can never look like a hidden file or
/// a path traversal.
fn sanitize_filename(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    safe.trim_start_matches(['.', '_']).to_string()
}

async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let form = read_analyze_form(&mut multipart).await?;

    let question = form.question.trim().to_string();
    if question.is_empty() {
        return Err(bad_request("La pregunta no puede estar vacía"));
    }

    if state.config.embedding.is_enabled() && config::api_key().is_none() {
        return Err(server_error("OPENAI_API_KEY no está configurada en .env"));
    }

    let answer = match (form.pdf, form.preset_key) {
        (Some((filename, bytes)), _) => {
            analyze_upload(&state, &question, &filename, bytes).await?
        }
        (None, Some(key)) => analyze_preset(&state, &question, &key).await?,
        (None, None) => {
            return Err(bad_request(
                "No se envió archivo PDF ni se eligió un preset",
            ));
        }
    };

    Ok(Json(serde_json::json!({ "ok": true, "answer": answer })))
}

async fn analyze_preset(
    state: &AppState,
    question: &str,
    key: &str,
) -> Result<String, AppError> {
    if !state.config.presets.iter().any(|p| p.key == key) {
        return Err(bad_request(format!("Preset desconocido: {}", key)));
    }
    let base = state.registry.get(key).ok_or_else(|| {
        bad_request(format!("El preset '{}' no está disponible", key))
    })?;

    let base = base.read().await;
    compare::answer_with_comparison(&state.config, &state.registry, question, &base)
        .await
        .map_err(classify_error)
}

async fn analyze_upload(
    state: &AppState,
    question: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String, AppError> {
    if filename.is_empty() || bytes.is_empty() {
        return Err(bad_request("Archivo PDF inválido"));
    }
    if !allowed_file(filename) {
        return Err(bad_request("Formato no permitido (solo .pdf)"));
    }

    let safe_name = sanitize_filename(filename);
    if safe_name.is_empty() {
        return Err(bad_request("Archivo PDF inválido"));
    }

    let request_id = Uuid::new_v4();
    let staging_dir = state.config.storage.upload_dir.join(request_id.to_string());
    let staged_path = staging_dir.join(&safe_name);

    std::fs::create_dir_all(&staging_dir)
        .map_err(|e| server_error(format!("No se pudo preparar el directorio de carga: {}", e)))?;
    std::fs::write(&staged_path, &bytes)
        .map_err(|e| server_error(format!("No se pudo guardar el archivo: {}", e)))?;

    let mut kb = KnowledgeBase::new(
        &format!("upload-{}", request_id),
        &state.config.storage.data_dir,
    );

    let result = build_and_compare(state, question, &mut kb, &staged_path).await;

    // Ephemeral state never outlives the request, whatever the outcome.
    kb.delete_snapshot();
    if let Err(e) = std::fs::remove_dir_all(&staging_dir) {
        warn!(dir = %staging_dir.display(), error = %e, "failed to remove staging directory");
    }

    result.map_err(classify_error)
}

async fn build_and_compare(
    state: &AppState,
    question: &str,
    kb: &mut KnowledgeBase,
    source: &std::path::Path,
) -> anyhow::Result<String> {
    kb.build(&state.config, source, false).await?;
    compare::answer_with_comparison(&state.config, &state.registry, question, kb).await
}

// ============ POST /rebuild-sura ============

async fn handle_rebuild(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = state.config.reference.path.clone();
    if !path.exists() {
        return Err(not_found(format!(
            "No existe el documento de referencia: {}",
            path.display()
        )));
    }

    let base = state
        .registry
        .reference()
        .ok_or_else(|| server_error("La base de referencia no está registrada"))?;

    let mut kb = base.write().await;
    kb.build(&state.config, &path, true)
        .await
        .map_err(classify_error)?;

    info!(chunks = kb.chunk_count(), "reference base rebuilt");
    Ok(Json(
        serde_json::json!({ "ok": true, "chunks": kb.chunk_count() }),
    ))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
