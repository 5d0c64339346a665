//! services/client/src/adapters/http_api.rs
//!
//! This module contains the typed API client, the concrete implementation of the
//! `StudyApi` port from the `core` crate. Every operation attaches the session's
//! bearer token, sends one request within the configured timeout, maps the HTTP
//! outcome onto `PortError` and hands 2xx bodies to the response validator.
//!
//! Generation, deletion and exports go to the StudyBuddy backend. Stored document
//! rows (summaries, flashcards, the library listing) are read straight from the
//! auth project's REST data API, under the same user token, where row-level
//! security limits every query to the caller's own rows.
//!
//! There are no retries, no backoff, no caching and no request deduplication.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderValue;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use study_buddy_core::domain::{
    Assignment, CalendarImportReport, ClassCollection, ConceptMap, Deleted,
    Document, DownloadLink, DownloadMode, ExamPrepPlan, FlashcardSet, Quiz, QuizRequest, Summary,
    SummaryPdf, SyllabusOutcome, TodayPlan, UploadFile, UploadReceipt, UploadRequest,
};
use study_buddy_core::ports::{PortError, PortResult, SessionProvider, StudyApi};
use study_buddy_core::validate::{
    check_summary_pdf, validate_in, Context, Validate, ValidationError,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::error::ClientError;

/// Longest server message carried into an error.
const MAX_MESSAGE_CHARS: usize = 300;

/// Columns of a `documents` row shown in the library listing.
const LIBRARY_COLUMNS: &str = "id,user_id,class_id,title,pdf_path,created_at";

//=========================================================================================
// Endpoints
//=========================================================================================

/// Where each kind of request goes.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// The StudyBuddy backend.
    pub api: Url,
    /// The auth project's REST data API (`{project}/rest/v1/`).
    pub data: Url,
    /// Public project key, sent as `apikey` on data API requests.
    pub anon_key: String,
}

impl Endpoints {
    pub fn new(api_url: &str, project_url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let api = Url::parse(api_url)
            .map_err(|e| ConfigError::InvalidValue("STUDY_API_URL".to_string(), e.to_string()))?;
        let data = Url::parse(&format!("{}/rest/v1/", project_url.trim_end_matches('/')))
            .map_err(|e| ConfigError::InvalidValue("SUPABASE_URL".to_string(), e.to_string()))?;
        Ok(Self {
            api,
            data,
            anon_key: anon_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.api_url,
            &config.supabase_url,
            &config.supabase_anon_key,
        )
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StudyApi` against the StudyBuddy HTTP backend.
pub struct HttpStudyApi<S: ?Sized> {
    http: reqwest::Client,
    endpoints: Endpoints,
    session: Arc<S>,
    max_upload_bytes: usize,
}

/// What goes in the request body.
enum Payload {
    Empty,
    Json(Value),
    Form(Form),
}

impl<S: SessionProvider + ?Sized> HttpStudyApi<S> {
    /// Creates a new `HttpStudyApi` from the loaded configuration.
    pub fn new(config: &Config, session: Arc<S>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self::with_client(
            http,
            Endpoints::from_config(config)?,
            session,
            config.max_upload_bytes,
        ))
    }

    /// Creates an adapter around an existing HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        endpoints: Endpoints,
        session: Arc<S>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            http,
            endpoints,
            session,
            max_upload_bytes,
        }
    }

    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    //=====================================================================================
    // Request Plumbing
    //=====================================================================================

    /// Joins path segments onto the backend URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> PortResult<Url> {
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(PortError::bad_input("Identifier must not be empty"));
        }
        let mut url = self.endpoints.api.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::bad_input("Backend URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one request and returns the raw body of a 2xx response.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        payload: Payload,
    ) -> PortResult<Bytes> {
        // No token, no request: the header is only ever built from a live session.
        let token = self.session.token().await?;

        let request_id = Uuid::new_v4().to_string();
        let path = url.path().to_string();
        let is_data = url.as_str().starts_with(self.endpoints.data.as_str());
        let mut builder = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token.as_str());
        if is_data {
            builder = builder.header("apikey", &self.endpoints.anon_key);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            builder = builder.header("x-request-id", value);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(&body),
            Payload::Form(form) => builder.multipart(form),
        };

        debug!(%request_id, %method, %path, "Sending API request");
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!(%request_id, status = status.as_u16(), "Received API response");

        if status.is_success() {
            return Ok(body);
        }

        let error = classify(status, &String::from_utf8_lossy(&body));
        if error.is_unauthenticated() {
            // Let the session provider (and through it the auth gate) know which
            // token was refused.
            self.session.invalidate(&token).await;
        }
        Err(error)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        payload: Payload,
    ) -> PortResult<Value> {
        let body = self.execute(method, url, query, payload).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Backend returned a non-JSON body: {}", e);
            PortError::Validation(ValidationError::new(
                "response",
                format!("body is not JSON: {}", e),
            ))
        })
    }

    async fn get(&self, url: Url, query: &[(&str, &str)]) -> PortResult<Value> {
        self.send(Method::GET, url, query, Payload::Empty).await
    }

    async fn delete<T: Validate>(&self, url: Url, id: &str) -> PortResult<T> {
        let raw = self.send(Method::DELETE, url, &[], Payload::Empty).await?;
        decode(raw, Context::for_resource(id))
    }

    //=====================================================================================
    // Data API Reads
    //=====================================================================================

    /// Runs a `select` against one table of the data API.
    async fn select(&self, table: &str, query: &[(&str, &str)]) -> PortResult<Vec<Value>> {
        let url = self
            .endpoints
            .data
            .join(table)
            .map_err(|e| PortError::bad_input(format!("Invalid table '{}': {}", table, e)))?;
        match self.get(url, query).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(PortError::Validation(ValidationError::new(
                "response",
                format!("expected rows, got {}", json_kind(&other)),
            ))),
        }
    }

    /// One of the caller's documents; rows of other users are invisible, so
    /// they read as "not found" too.
    async fn document_row(&self, document_id: &str, columns: &str) -> PortResult<Value> {
        if document_id.trim().is_empty() {
            return Err(PortError::bad_input("Identifier must not be empty"));
        }
        let id_filter = format!("eq.{}", document_id);
        let rows = self
            .select(
                "documents",
                &[("select", columns), ("id", id_filter.as_str()), ("limit", "1")],
            )
            .await?;
        rows.into_iter().next().ok_or_else(|| PortError::InvalidRequest {
            status: 404,
            message: "Document not found".to_string(),
        })
    }

    //=====================================================================================
    // Pre-flight Checks
    //=====================================================================================

    fn check_file(&self, file: &UploadFile, extension: &str, label: &str) -> PortResult<()> {
        if file.is_empty() {
            return Err(PortError::bad_input("Empty file."));
        }
        if !file.has_extension(extension) {
            return Err(PortError::bad_input(format!("Only {} files are supported.", label)));
        }
        if file.len() > self.max_upload_bytes {
            return Err(PortError::InvalidRequest {
                status: 413,
                message: format!(
                    "File too large. Max {} MB.",
                    self.max_upload_bytes / (1024 * 1024)
                ),
            });
        }
        Ok(())
    }
}

//=========================================================================================
// Response Mapping
//=========================================================================================

fn decode<T: Validate>(raw: Value, ctx: Context<'_>) -> PortResult<T> {
    validate_in(raw, ctx).map_err(|e| {
        warn!("Response failed validation: {}", e);
        PortError::Validation(e)
    })
}

fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::ServiceUnavailable("request timed out".to_string())
    } else {
        PortError::ServiceUnavailable(format!("could not reach the backend: {}", e))
    }
}

/// Maps a non-2xx status onto the error taxonomy.
pub fn classify(status: StatusCode, body: &str) -> PortError {
    let message = server_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthenticated,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
            PortError::QuotaExceeded(message)
        }
        s if s.is_client_error() => PortError::InvalidRequest {
            status: s.as_u16(),
            message,
        },
        s => PortError::ServiceUnavailable(format!("{}: {}", s.as_u16(), message)),
    }
}

/// Pulls the human-readable message out of an error body.
fn server_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let message = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["detail", "message", "error", "msg"]
            .iter()
            .find_map(|k| map.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| body.to_string()),
        _ => body.to_string(),
    };
    Some(message.chars().take(MAX_MESSAGE_CHARS).collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn file_part(file: UploadFile, mime: &str) -> PortResult<Part> {
    let len = file.len() as u64;
    Part::stream_with_length(file.bytes, len)
        .file_name(file.file_name)
        .mime_str(mime)
        .map_err(|e| PortError::bad_input(format!("Invalid upload type: {}", e)))
}

//=========================================================================================
// `StudyApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl<S: SessionProvider + ?Sized> StudyApi for HttpStudyApi<S> {
    async fn upload_document(&self, req: UploadRequest) -> PortResult<UploadReceipt> {
        self.check_file(&req.file, "pdf", "PDF")?;
        if req.class_id.trim().is_empty() {
            return Err(PortError::bad_input("class_id required."));
        }
        if !(req.make_summary || req.make_cards || req.make_guide) {
            return Err(PortError::bad_input("Select at least one option."));
        }

        let form = Form::new()
            .part("file", file_part(req.file, "application/pdf")?)
            .text("title", req.title)
            .text("class_id", req.class_id)
            .text("make_summary", flag(req.make_summary))
            .text("make_cards", flag(req.make_cards))
            .text("make_guide", flag(req.make_guide));

        let url = self.endpoint(&["upload"])?;
        let raw = self.send(Method::POST, url, &[], Payload::Form(form)).await?;
        decode(raw, Context::default())
    }

    async fn request_summary(&self, document_id: &str) -> PortResult<Summary> {
        let row = self.document_row(document_id, "id,title,summary").await?;
        decode(row, Context::for_resource(document_id))
    }

    async fn request_quiz(&self, req: QuizRequest) -> PortResult<Quiz> {
        self.check_file(&req.file, "pdf", "PDF")?;
        let num_questions = req
            .num_questions
            .clamp(QuizRequest::MIN_QUESTIONS, QuizRequest::MAX_QUESTIONS);

        let form = Form::new()
            .part("file", file_part(req.file, "application/pdf")?)
            .text("title", req.title)
            .text("num_questions", num_questions.to_string());

        let url = self.endpoint(&["quiz"])?;
        let raw = self.send(Method::POST, url, &[], Payload::Form(form)).await?;
        decode(raw, Context::default())
    }

    async fn request_flashcards(&self, document_id: &str) -> PortResult<FlashcardSet> {
        let row = self.document_row(document_id, "id,title,cards_json").await?;
        decode(row, Context::for_resource(document_id))
    }

    async fn request_concept_map(&self, class_id: &str) -> PortResult<ConceptMap> {
        let url = self.endpoint(&["classes", class_id, "concept-map"])?;
        decode(self.get(url, &[]).await?, Context::for_resource(class_id))
    }

    async fn list_documents(&self, class_id: Option<&str>) -> PortResult<Vec<Document>> {
        let class_filter = class_id.map(|c| format!("eq.{}", c));
        let mut query = vec![("select", LIBRARY_COLUMNS), ("order", "created_at.desc")];
        if let Some(filter) = class_filter.as_deref() {
            query.push(("class_id", filter));
        }
        let rows = self.select("documents", &query).await?;
        decode(Value::Array(rows), Context::default())
    }

    async fn document_download(
        &self,
        document_id: &str,
        mode: DownloadMode,
    ) -> PortResult<DownloadLink> {
        let url = self.endpoint(&["library", "document", document_id, "download"])?;
        let raw = self.get(url, &[("mode", mode.as_str())]).await?;
        decode(raw, Context::for_resource(document_id))
    }

    async fn export_summary_pdf(&self, document_id: &str) -> PortResult<SummaryPdf> {
        let url = self.endpoint(&["library", "document", document_id, "summary-pdf"])?;
        let body = self.execute(Method::GET, url, &[], Payload::Empty).await?;
        check_summary_pdf(document_id, body).map_err(|e| {
            warn!("Response failed validation: {}", e);
            PortError::Validation(e)
        })
    }

    async fn list_classes(&self) -> PortResult<Vec<ClassCollection>> {
        let url = self.endpoint(&["classes"])?;
        decode(self.get(url, &[]).await?, Context::default())
    }

    async fn create_class(&self, name: &str) -> PortResult<ClassCollection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PortError::bad_input("Class name required"));
        }
        let url = self.endpoint(&["classes"])?;
        let raw = self
            .send(Method::POST, url, &[], Payload::Json(json!({ "name": name })))
            .await?;
        decode(raw, Context::default())
    }

    async fn parse_syllabus(
        &self,
        class_id: &str,
        file: UploadFile,
    ) -> PortResult<SyllabusOutcome> {
        if class_id.trim().is_empty() {
            return Err(PortError::bad_input("class_id required."));
        }
        self.check_file(&file, "pdf", "PDF")?;
        let form = Form::new().part("file", file_part(file, "application/pdf")?);
        let url = self.endpoint(&["syllabus", "upload"])?;
        let raw = self
            .send(Method::POST, url, &[("class_id", class_id)], Payload::Form(form))
            .await?;
        decode(raw, Context::for_resource(class_id))
    }

    async fn syllabus_preview(&self, class_id: &str) -> PortResult<ClassCollection> {
        let url = self.endpoint(&["syllabus", "preview", class_id])?;
        decode(self.get(url, &[]).await?, Context::for_resource(class_id))
    }

    async fn import_calendar(&self, file: UploadFile) -> PortResult<CalendarImportReport> {
        self.check_file(&file, "ics", ".ics")?;
        let form = Form::new().part("file", file_part(file, "text/calendar")?);
        let url = self.endpoint(&["calendar", "import"])?;
        let raw = self.send(Method::POST, url, &[], Payload::Form(form)).await?;
        decode(raw, Context::default())
    }

    async fn list_assignments(&self, class_id: Option<&str>) -> PortResult<Vec<Assignment>> {
        let url = self.endpoint(&["calendar", "assignments"])?;
        let query: Vec<(&str, &str)> = class_id.map(|c| ("class_id", c)).into_iter().collect();
        decode(self.get(url, &query).await?, Context::default())
    }

    async fn today_plan(&self, class_id: &str) -> PortResult<TodayPlan> {
        let url = self.endpoint(&["intelligent", "dashboard", class_id, "today"])?;
        decode(self.get(url, &[]).await?, Context::for_resource(class_id))
    }

    async fn exam_prep(
        &self,
        class_id: &str,
        exam_name: &str,
        weeks_until: u32,
    ) -> PortResult<ExamPrepPlan> {
        let exam_name = exam_name.trim();
        if exam_name.is_empty() {
            return Err(PortError::bad_input("exam_name required."));
        }
        if weeks_until == 0 {
            return Err(PortError::bad_input("weeks_until must be at least 1."));
        }
        let url = self.endpoint(&["intelligent", "exam-prep", class_id])?;
        let weeks = weeks_until.to_string();
        let query = [("exam_name", exam_name), ("weeks_until", weeks.as_str())];
        let raw = self.send(Method::POST, url, &query, Payload::Empty).await?;
        decode(raw, Context::for_resource(class_id))
    }

    async fn delete_document(&self, document_id: &str) -> PortResult<Deleted> {
        let url = self.endpoint(&["library", "document", document_id])?;
        self.delete(url, document_id).await
    }

    async fn delete_quiz(&self, quiz_id: &str) -> PortResult<Deleted> {
        let url = self.endpoint(&["library", "quiz", quiz_id])?;
        self.delete(url, quiz_id).await
    }

    async fn delete_class(&self, class_id: &str) -> PortResult<Deleted> {
        let url = self.endpoint(&["classes", class_id])?;
        self.delete(url, class_id).await
    }
}
