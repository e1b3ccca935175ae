//! Web-form front-end for Mermaid Architect.
//!
//! A single page with a prompt box, a model picker, the editable diagram
//! source and the last rendered image. All requests share one [`Session`]
//! behind a mutex, so runs are serialised.

use std::fmt::Write as _;
use std::sync::Arc;

use architect_core::{
    Architect, ArchitectError, ChatBackend, ErrorKind, GenerationRequest, ImageFormat, Session,
};
use axum::extract::{Form, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Shared state for all handlers.
pub struct AppState<B> {
    architect: Architect<B>,
    session: Mutex<Session>,
}

impl<B: ChatBackend> AppState<B> {
    pub fn new(architect: Architect<B>) -> Self {
        Self {
            architect,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn architect(&self) -> &Architect<B> {
        &self.architect
    }
}

pub fn router<B: ChatBackend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/", get(index::<B>))
        .route("/generate", post(generate::<B>))
        .route("/render", post(render::<B>))
        .route("/artifact", get(artifact::<B>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub prompt: String,
    /// Picked from the catalog list.
    #[serde(default)]
    pub model: String,
    /// Typed by hand; wins over `model` when non-blank.
    #[serde(default)]
    pub custom_model: String,
}

impl GenerateForm {
    fn resolve_model(&self, default: &str) -> String {
        [self.custom_model.trim(), self.model.trim()]
            .into_iter()
            .find(|m| !m.is_empty())
            .unwrap_or(default)
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderForm {
    #[serde(default)]
    pub source: String,
}

/// What the page shows below the form.
enum Notice {
    None,
    Info(String),
    Failure(ArchitectError),
}

async fn index<B: ChatBackend>(State(state): State<Arc<AppState<B>>>) -> Response {
    let session = state.session.lock().await;
    page(&state, &session, "", Notice::None).await
}

async fn generate<B: ChatBackend>(
    State(state): State<Arc<AppState<B>>>,
    Form(form): Form<GenerateForm>,
) -> Response {
    let mut session = state.session.lock().await;
    let prompt = form.prompt.trim();
    if prompt.is_empty() {
        let notice = Notice::Info("Enter a description first.".to_string());
        return with_status(
            StatusCode::BAD_REQUEST,
            page(&state, &session, "", notice).await,
        );
    }

    let model = form.resolve_model(&state.architect.config().ollama.default_model);
    info!(model = %model, "web generate");
    let request = GenerationRequest::new(prompt, model);
    let notice = match state.architect.describe(&mut session, &request).await {
        Ok(artifact) => Notice::Info(format!("Diagram saved to {}", artifact.path.display())),
        Err(err) => {
            warn!(error = %err, "web generate failed");
            Notice::Failure(err)
        }
    };
    let status = notice_status(&notice);
    with_status(status, page(&state, &session, prompt, notice).await)
}

async fn render<B: ChatBackend>(
    State(state): State<Arc<AppState<B>>>,
    Form(form): Form<RenderForm>,
) -> Response {
    let mut session = state.session.lock().await;
    let notice = match state.architect.rerender(&mut session, Some(&form.source)).await {
        Ok(artifact) => Notice::Info(format!("Diagram saved to {}", artifact.path.display())),
        Err(err) => {
            warn!(error = %err, "web re-render failed");
            Notice::Failure(err)
        }
    };
    let status = notice_status(&notice);
    with_status(status, page(&state, &session, "", notice).await)
}

async fn artifact<B: ChatBackend>(State(state): State<Arc<AppState<B>>>) -> Response {
    let session = state.session.lock().await;
    let Some(artifact) = session.artifact() else {
        return (StatusCode::NOT_FOUND, "no diagram rendered yet").into_response();
    };
    match tokio::fs::read(&artifact.path).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, artifact.format.content_type())],
            bytes,
        )
            .into_response(),
        Err(err) => {
            warn!(path = %artifact.path.display(), error = %err, "artifact unreadable");
            (StatusCode::NOT_FOUND, "rendered diagram is gone").into_response()
        }
    }
}

fn notice_status(notice: &Notice) -> StatusCode {
    match notice {
        Notice::Failure(err) => match err.kind() {
            ErrorKind::EnvironmentUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::CatalogUnavailable | ErrorKind::GenerationFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::RenderFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Local => match err {
                ArchitectError::EmptySource => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        },
        _ => StatusCode::OK,
    }
}

fn with_status(status: StatusCode, mut response: Response) -> Response {
    *response.status_mut() = status;
    response
}

async fn page<B: ChatBackend>(
    state: &AppState<B>,
    session: &Session,
    prompt: &str,
    notice: Notice,
) -> Response {
    let models = state.architect.list_models().await;
    let default_model = session
        .model()
        .unwrap_or(&state.architect.config().ollama.default_model)
        .to_string();
    Html(render_page(&PageView {
        prompt,
        models: &models,
        default_model: &default_model,
        source: session.source().map(|s| s.as_str()).unwrap_or(""),
        artifact: session.artifact().map(|a| a.format),
        notice: &notice,
    }))
    .into_response()
}

struct PageView<'a> {
    prompt: &'a str,
    models: &'a [String],
    default_model: &'a str,
    source: &'a str,
    artifact: Option<ImageFormat>,
    notice: &'a Notice,
}

fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::from(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Mermaid Architect</title>\
         <style>body{font-family:sans-serif;max-width:60rem;margin:2rem auto}\
         textarea{width:100%;font-family:monospace}pre.diag{background:#fee;padding:1rem;white-space:pre-wrap}\
         img{max-width:100%;border:1px solid #ddd}</style></head><body>\n<h1>Mermaid Architect</h1>\n",
    );

    html.push_str("<form method=\"post\" action=\"/generate\">\n");
    let _ = writeln!(
        html,
        "<label>Describe the diagram<br><textarea name=\"prompt\" rows=\"4\">{}</textarea></label><br>",
        escape_html(view.prompt)
    );
    if view.models.is_empty() {
        let _ = writeln!(
            html,
            "<label>Model (no catalog available) <input name=\"custom_model\" value=\"{}\"></label>",
            escape_html(view.default_model)
        );
    } else {
        html.push_str("<label>Model <select name=\"model\">");
        for model in view.models {
            let selected = if model == view.default_model {
                " selected"
            } else {
                ""
            };
            let _ = write!(
                html,
                "<option value=\"{0}\"{selected}>{0}</option>",
                escape_html(model)
            );
        }
        html.push_str("</select></label>\n");
        html.push_str("<label>or custom <input name=\"custom_model\" value=\"\"></label>\n");
    }
    html.push_str("<button type=\"submit\">Generate</button>\n</form>\n");

    match view.notice {
        Notice::None => {}
        Notice::Info(message) => {
            let _ = writeln!(html, "<p class=\"info\">{}</p>", escape_html(message));
        }
        Notice::Failure(err) => render_failure(&mut html, err),
    }

    if !view.source.is_empty() {
        html.push_str("<h2>Diagram source</h2>\n<form method=\"post\" action=\"/render\">\n");
        let _ = writeln!(
            html,
            "<textarea name=\"source\" rows=\"16\">{}</textarea><br>",
            escape_html(view.source)
        );
        html.push_str("<button type=\"submit\">Re-render</button>\n</form>\n");
    }

    match view.artifact {
        Some(ImageFormat::Pdf) => {
            html.push_str("<p><a href=\"/artifact\">Download PDF</a></p>\n");
        }
        Some(_) => {
            html.push_str(
                "<h2>Diagram</h2>\n<p><img src=\"/artifact\" alt=\"rendered diagram\"></p>\n\
                 <p><a href=\"/artifact\" download>Download</a></p>\n",
            );
        }
        None => {}
    }

    html.push_str("</body></html>\n");
    html
}

fn render_failure(html: &mut String, err: &ArchitectError) {
    match err {
        ArchitectError::RenderFailure {
            exit_code,
            diagnostics,
            ..
        } => {
            let _ = writeln!(
                html,
                "<h2>Mermaid CLI failed (exit {exit_code})</h2>\n<pre class=\"diag\">{}</pre>",
                escape_html(diagnostics)
            );
        }
        other => {
            let _ = writeln!(
                html,
                "<h2>Error</h2>\n<pre class=\"diag\">{}</pre>",
                escape_html(&other.to_string())
            );
        }
    }
    if let Some(path) = err.retained_source() {
        let _ = writeln!(
            html,
            "<p>Diagram source kept at <code>{}</code></p>",
            escape_html(&path.display().to_string())
        );
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
