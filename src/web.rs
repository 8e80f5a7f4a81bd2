use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use saksham_flows::{AdvisoryFlows, FlowDescriptor, FlowError};
use saksham_forms::{
    AdvisoryForm, ConservationPlanner, CropDoctor, Emphasis, EntrepreneurshipSupport, FieldDef,
    FieldErrors, FieldKind, FinancialAdvisory, FormId, FormSession, MarketPrices, Notification,
    Notifier, RawForm, RawValue, ResultCard, Submission, TracingNotifier, Upload, MAX_IMAGE_BYTES,
};

/// Uploaded bytes held in memory per form submission. Files past this budget
/// are still counted so size rules see their real size.
const UPLOAD_KEEP_BUDGET: u64 = 4 * MAX_IMAGE_BYTES;

const TEXT_FIELD_LIMIT: usize = 1_048_576;

/// A maximum-size image as a base64 data URI plus the rest of the request.
const API_BODY_LIMIT: usize = (MAX_IMAGE_BYTES as usize + 2) / 3 * 4 + 1_048_576;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        let status = match &err {
            FlowError::UnknownFlow(_) => StatusCode::NOT_FOUND,
            FlowError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    flows: AdvisoryFlows,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(flows: AdvisoryFlows) -> Self {
        Self {
            flows,
            notifier: Arc::new(TracingNotifier),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/features/:form",
            get(form_page)
                .post(submit_form)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/api/flows", get(list_flows))
        .route(
            "/api/flows/:flow",
            post(invoke_flow).layer(DefaultBodyLimit::max(API_BODY_LIMIT)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(flows: AdvisoryFlows, bind: &str, port: u16) -> Result<()> {
    let app = build_router(AppState::new(flows));
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("🌐 saksham serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("saksham serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<String> {
    let mut items = String::new();
    for id in FormId::ALL {
        let _ = write!(
            items,
            "<li><a href=\"/features/{slug}\">{title}</a><p>{description}</p></li>",
            slug = id.slug(),
            title = escape(id.title()),
            description = escape(id.description()),
        );
    }
    Html(page(
        "AgriSaksham",
        &format!("<h1>AgriSaksham</h1><p>AI advisory for farmers.</p><ul class=\"features\">{items}</ul>"),
    ))
}

async fn form_page(Path(slug): Path<String>) -> Result<Html<String>, AppError> {
    let id = lookup(&slug)?;
    let view = FormView::of(id);
    Ok(Html(view.render(&RawForm::new(), &FieldErrors::default(), "")))
}

async fn submit_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id = lookup(&slug)?;
    let raw = read_multipart(multipart).await?;
    let flows = &state.flows;
    let notifier = state.notifier.clone();

    let submission = match id {
        FormId::CropDoctor => submit(CropDoctor, flows.diagnosis.clone(), notifier, &raw).await,
        FormId::MarketPrices => submit(MarketPrices, flows.market_price.clone(), notifier, &raw).await,
        FormId::ConservationPlanner => {
            submit(ConservationPlanner, flows.conservation.clone(), notifier, &raw).await
        }
        FormId::FinancialAdvisory => {
            submit(FinancialAdvisory, flows.financial.clone(), notifier, &raw).await
        }
        FormId::EntrepreneurshipSupport => {
            submit(EntrepreneurshipSupport, flows.financial.clone(), notifier, &raw).await
        }
    };

    let view = FormView::of(id);
    let (status, html) = match submission {
        Submission::Completed(card) => (StatusCode::OK, view.render(&raw, &FieldErrors::default(), &render_card(&card))),
        Submission::Invalid(errors) => (StatusCode::UNPROCESSABLE_ENTITY, view.render(&raw, &errors, "")),
        Submission::Failed(notification) => (
            StatusCode::BAD_GATEWAY,
            view.render(&raw, &FieldErrors::default(), &render_notification(&notification)),
        ),
        Submission::Busy => (StatusCode::CONFLICT, view.render(&raw, &FieldErrors::default(), "")),
    };
    Ok((status, Html(html)).into_response())
}

async fn list_flows() -> Json<Vec<FlowDescriptor>> {
    Json(AdvisoryFlows::descriptors())
}

async fn invoke_flow(
    State(state): State<AppState>,
    Path(flow): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let output = state.flows.invoke_json(&flow, input).await?;
    Ok(Json(output))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lookup(slug: &str) -> Result<FormId, AppError> {
    FormId::from_slug(slug).ok_or_else(|| AppError::not_found(format!("no feature named '{slug}'")))
}

/// Each HTTP submission gets its own session.
async fn submit<F: AdvisoryForm>(
    form: F,
    flow: Arc<F::Flow>,
    notifier: Arc<dyn Notifier>,
    raw: &RawForm,
) -> Submission {
    FormSession::new(form, flow, notifier).submit(raw.clone()).await
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::bad_request(err.to_string())
}

/// Read every part as it streams in. Files are measured in full but only kept
/// while they fit the request's upload budget.
async fn read_multipart(mut multipart: Multipart) -> Result<RawForm, AppError> {
    let mut raw = RawForm::new();
    let mut budget = UPLOAD_KEEP_BUDGET;

    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let mut size: u64 = 0;
                let mut kept = Some(Vec::new());
                while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
                    size += chunk.len() as u64;
                    if size > budget {
                        kept = None;
                    }
                    if let Some(buf) = kept.as_mut() {
                        buf.extend_from_slice(&chunk);
                    }
                }
                // A file input left empty still sends a nameless, empty part.
                if file_name.is_empty() && size == 0 {
                    continue;
                }
                let upload = match kept {
                    Some(bytes) => {
                        budget -= size;
                        Upload::from_bytes(file_name, content_type, bytes)
                    }
                    None => {
                        debug!("Not keeping '{}' ({} bytes) in memory", file_name, size);
                        Upload::dropped(file_name, content_type, size)
                    }
                };
                raw.add_file(&name, upload);
            }
            None => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
                    if bytes.len() + chunk.len() > TEXT_FIELD_LIMIT {
                        return Err(AppError::bad_request(format!("field '{name}' is too long")));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                let text = String::from_utf8(bytes)
                    .map_err(|_| AppError::bad_request(format!("field '{name}' is not UTF-8")))?;
                raw.insert(&name, RawValue::Text(text));
            }
        }
    }
    Ok(raw)
}

/// The parts of a form a page needs.
struct FormView {
    id: FormId,
    fields: Vec<FieldDef>,
    submit_label: &'static str,
    pending_message: &'static str,
}

impl FormView {
    fn of(id: FormId) -> Self {
        match id {
            FormId::CropDoctor => Self::from_form(&CropDoctor),
            FormId::MarketPrices => Self::from_form(&MarketPrices),
            FormId::ConservationPlanner => Self::from_form(&ConservationPlanner),
            FormId::FinancialAdvisory => Self::from_form(&FinancialAdvisory),
            FormId::EntrepreneurshipSupport => Self::from_form(&EntrepreneurshipSupport),
        }
    }

    fn from_form<F: AdvisoryForm>(form: &F) -> Self {
        Self {
            id: form.id(),
            fields: form.fields(),
            submit_label: form.submit_label(),
            pending_message: form.pending_message(),
        }
    }

    fn render(&self, values: &RawForm, errors: &FieldErrors, result: &str) -> String {
        let mut inputs = String::new();
        for field in &self.fields {
            let previous = match values.get(field.name) {
                Some(RawValue::Text(text)) => escape(text),
                _ => String::new(),
            };
            let name = field.name;
            let placeholder = escape(field.placeholder);
            let control = match field.kind {
                FieldKind::Text | FieldKind::OptionalText => format!(
                    "<input type=\"text\" id=\"{name}\" name=\"{name}\" placeholder=\"{placeholder}\" value=\"{previous}\">"
                ),
                FieldKind::LongText => format!(
                    "<textarea id=\"{name}\" name=\"{name}\" placeholder=\"{placeholder}\">{previous}</textarea>"
                ),
                FieldKind::File => format!(
                    "<input type=\"file\" id=\"{name}\" name=\"{name}\"{accept}>",
                    accept = field
                        .accept
                        .map(|a| format!(" accept=\"{}\"", escape(a)))
                        .unwrap_or_default()
                ),
            };
            let error = errors
                .get(field.name)
                .map(|message| format!("<p class=\"field-error\">{}</p>", escape(message)))
                .unwrap_or_default();
            let _ = write!(
                inputs,
                "<div class=\"field\"><label for=\"{name}\">{label}</label>{control}{error}</div>",
                label = escape(field.label),
            );
        }

        let body = format!(
            "<p><a href=\"/\">All features</a></p>\
             <h1>{title}</h1><p>{description}</p>\
             <form method=\"post\" action=\"/features/{slug}\" enctype=\"multipart/form-data\">\
             {inputs}<button type=\"submit\" data-pending=\"{pending}\">{label}</button></form>\
             {result}",
            title = escape(self.id.title()),
            description = escape(self.id.description()),
            slug = self.id.slug(),
            pending = escape(self.pending_message),
            label = escape(self.submit_label),
        );
        page(self.id.title(), &body)
    }
}

fn render_card(card: &ResultCard) -> String {
    let mut html = format!("<section class=\"result\"><h2>{}</h2>", escape(&card.title));
    if let Some(description) = &card.description {
        let _ = write!(html, "<p>{}</p>", escape(description));
    }
    for section in &card.sections {
        let body = escape(&section.body).replace('\n', "<br>");
        let body = match section.emphasis {
            Emphasis::Normal => format!("<p>{body}</p>"),
            Emphasis::Highlight => format!("<p class=\"highlight\"><strong>{body}</strong></p>"),
            Emphasis::Quote => format!("<blockquote>\"{body}\"</blockquote>"),
        };
        let _ = write!(html, "<h3>{}</h3>{}", escape(&section.heading), body);
    }
    html.push_str("</section>");
    html
}

fn render_notification(notification: &Notification) -> String {
    format!(
        "<div class=\"notification destructive\" role=\"alert\"><strong>{}</strong><p>{}</p></div>",
        escape(&notification.title),
        escape(&notification.description)
    )
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape(title),
        body
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
