#![allow(dead_code)]

//! In-process stand-ins for the StudyBuddy backend and the auth provider.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use study_buddy_core::domain::{AccessToken, Session, User};
use study_client::adapters::{Endpoints, HttpStudyApi, StaticSession, SupabaseSession};

pub const GOOD_TOKEN: &str = "good-token";
pub const REFRESHED_TOKEN: &str = "refreshed-token";
pub const ANON_KEY: &str = "anon";

//=========================================================================================
// Backend
//=========================================================================================

pub struct BackendState {
    /// Requests that reached a protected route.
    pub hits: AtomicUsize,
    pub reject_tokens: AtomicBool,
    pub quota_exhausted: AtomicBool,
    /// Delay, in milliseconds, applied to every protected request before the
    /// token is checked.
    pub delay_ms: AtomicU64,
    pub next_doc: AtomicUsize,
    pub next_quiz: AtomicUsize,
    pub last_upload_len: AtomicUsize,
    /// Rows of the `documents` table behind the data API.
    pub documents: Mutex<HashMap<String, Value>>,
    pub quizzes: Mutex<HashSet<String>>,
    pub classes: Mutex<Vec<Value>>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            hits: AtomicUsize::new(0),
            reject_tokens: AtomicBool::new(false),
            quota_exhausted: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            next_doc: AtomicUsize::new(1),
            next_quiz: AtomicUsize::new(1),
            last_upload_len: AtomicUsize::new(0),
            documents: Mutex::new(HashMap::new()),
            quizzes: Mutex::new(HashSet::new()),
            classes: Mutex::new(Vec::new()),
        }
    }
}

impl BackendState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// The mock serves both the backend routes and the data API.
    pub fn endpoints(&self) -> Endpoints {
        let base = format!("http://{}", self.addr);
        Endpoints::new(&base, &base, ANON_KEY).unwrap()
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn require_auth(
    State(state): State<Arc<BackendState>>,
    req: Request,
    next: Next,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let known = matches!(bearer, Some(GOOD_TOKEN) | Some(REFRESHED_TOKEN));
    if !known || state.reject_tokens.load(Ordering::SeqCst) {
        return detail(StatusCode::UNAUTHORIZED, "Invalid or expired token");
    }
    next.run(req).await
}

/// Text fields of a multipart body plus the length of its `file` part.
async fn read_form(mut multipart: Multipart) -> (HashMap<String, String>, usize) {
    let mut fields = HashMap::new();
    let mut file_len = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap_or_default();
        if name == "file" {
            file_len = data.len();
        } else {
            fields.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }
    (fields, file_len)
}

async fn upload(State(state): State<Arc<BackendState>>, multipart: Multipart) -> Response {
    if state.quota_exhausted.load(Ordering::SeqCst) {
        return detail(
            StatusCode::TOO_MANY_REQUESTS,
            "Free plan limit reached for this month",
        );
    }
    let (fields, file_len) = read_form(multipart).await;
    if file_len == 0 {
        return detail(StatusCode::BAD_REQUEST, "Empty file.");
    }
    state.last_upload_len.store(file_len, Ordering::SeqCst);

    let seq = state.next_doc.fetch_add(1, Ordering::SeqCst);
    let id = format!("doc_{}", seq);
    let summary = "# Cell Biology\n\nMitosis splits one cell into two.";
    let cards = json!({ "cards": [
        { "type": "definition", "front": "Mitosis", "back": "Division of one cell into two" }
    ]})
    .to_string();
    let row = json!({
        "id": id,
        "user_id": "user-1",
        "title": fields.get("title").cloned().unwrap_or_default(),
        "class_id": fields.get("class_id").cloned(),
        "summary": summary,
        "cards_json": cards,
        "guide_json": Value::Null,
        "pdf_path": format!("user-1/{}.pdf", id),
        "created_at": format!("2025-01-15T10:{:02}:00Z", seq % 60),
    });
    state.documents.lock().unwrap().insert(id.clone(), row.clone());
    Json(row).into_response()
}

/// `GET /rest/v1/documents`, filtered the way the data API filters: `col=eq.value`,
/// `select=` projection, `order=created_at.desc` and `limit=`.
async fn select_documents(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "No API key found in request" })),
        )
            .into_response();
    }
    let filters: Vec<(&str, &str)> = ["id", "class_id"]
        .iter()
        .filter_map(|col| {
            let value = params.get(*col)?.strip_prefix("eq.")?;
            Some((*col, value))
        })
        .collect();

    let mut rows: Vec<Value> = state
        .documents
        .lock()
        .unwrap()
        .values()
        .filter(|row| filters.iter().all(|(col, value)| row[*col] == *value))
        .cloned()
        .collect();
    if params.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
    }
    if let Some(limit) = params.get("limit").and_then(|l| l.parse().ok()) {
        rows.truncate(limit);
    }
    if let Some(select) = params.get("select") {
        rows = rows
            .into_iter()
            .map(|row| {
                let projected: serde_json::Map<String, Value> = select
                    .split(',')
                    .map(|col| (col.to_string(), row.get(col).cloned().unwrap_or(Value::Null)))
                    .collect();
                Value::Object(projected)
            })
            .collect();
    }
    Json(rows).into_response()
}

async fn delete_document(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Response {
    match state.documents.lock().unwrap().remove(&id) {
        Some(_) => Json(json!({ "ok": true })).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Not found"),
    }
}

#[derive(Deserialize)]
struct ModeParam {
    mode: Option<String>,
}

async fn download_document(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
    Query(param): Query<ModeParam>,
) -> Response {
    if !state.documents.lock().unwrap().contains_key(&id) {
        return detail(StatusCode::NOT_FOUND, "Not found");
    }
    let mode = param.mode.unwrap_or_else(|| "download".to_string());
    Json(json!({
        "url": format!("https://storage.example.com/object/sign/pdfs/user-1/{}.pdf?token=abc", id),
        "mode": mode,
    }))
    .into_response()
}

async fn summary_pdf(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    let documents = state.documents.lock().unwrap();
    let Some(row) = documents.get(&id) else {
        return detail(StatusCode::NOT_FOUND, "Not found");
    };
    if row["summary"].is_null() {
        return detail(StatusCode::BAD_REQUEST, "No summary to export");
    }
    (
        [(CONTENT_TYPE, "application/pdf")],
        b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n".to_vec(),
    )
        .into_response()
}

async fn create_quiz(State(state): State<Arc<BackendState>>, multipart: Multipart) -> Response {
    let (fields, file_len) = read_form(multipart).await;
    if file_len == 0 {
        return detail(StatusCode::BAD_REQUEST, "Empty file.");
    }
    let count: usize = fields
        .get("num_questions")
        .and_then(|n| n.parse().ok())
        .unwrap_or(10);
    let questions: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "question": format!("Question {}: which phase follows prophase?", i),
                "choices": ["Metaphase", "Anaphase", "Telophase", "Interphase"],
                "answer_index": 0,
                "explanation": "Chromosomes line up after prophase.",
                "source": "Page 3",
            })
        })
        .collect();
    let id = format!("quiz_{}", state.next_quiz.fetch_add(1, Ordering::SeqCst));
    state.quizzes.lock().unwrap().insert(id.clone());
    Json(json!({
        "id": id,
        "title": fields.get("title").cloned().unwrap_or_default(),
        "num_questions": count,
        "quiz_json": json!({ "questions": questions }).to_string(),
    }))
    .into_response()
}

async fn delete_quiz(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    if state.quizzes.lock().unwrap().remove(&id) {
        Json(json!({ "ok": true })).into_response()
    } else {
        detail(StatusCode::NOT_FOUND, "Not found")
    }
}

async fn list_classes(State(state): State<Arc<BackendState>>) -> Response {
    Json(state.classes.lock().unwrap().clone()).into_response()
}

async fn create_class(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Response {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut classes = state.classes.lock().unwrap();
    if classes.iter().any(|c| c["name"] == name.as_str()) {
        return detail(StatusCode::BAD_REQUEST, "Class already exists");
    }
    let class = json!({
        "id": format!("class_{}", classes.len() + 1),
        "name": name,
        "created_at": "2025-01-15T10:00:00Z",
    });
    classes.push(class.clone());
    Json(class).into_response()
}

async fn delete_class(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    let mut classes = state.classes.lock().unwrap();
    let before = classes.len();
    classes.retain(|c| c["id"] != id.as_str());
    if classes.len() == before {
        return detail(StatusCode::NOT_FOUND, "Class not found");
    }
    Json(json!({ "success": true })).into_response()
}

fn find_class(state: &BackendState, id: &str) -> Option<Value> {
    state
        .classes
        .lock()
        .unwrap()
        .iter()
        .find(|c| c["id"] == id)
        .cloned()
}

async fn concept_map(Path(class_id): Path<String>) -> Response {
    match class_id.as_str() {
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        "dangling" => Json(json!({
            "nodes": [{ "id": "a", "label": "Mitosis", "importance": "core", "difficulty": "easy" }],
            "edges": [{ "from": "a", "to": "ghost" }],
        }))
        .into_response(),
        _ => Json(json!({
            "nodes": [
                { "id": "a", "label": "Mitosis", "importance": "core", "difficulty": "easy" },
                { "id": "b", "label": "Meiosis", "importance": "important", "difficulty": "hard" },
            ],
            "edges": [{ "from": "a", "to": "b", "type": "contrasts_with", "weight": 0.8 }],
        }))
        .into_response(),
    }
}

#[derive(Deserialize)]
struct ClassFilter {
    class_id: Option<String>,
}

async fn upload_syllabus(
    State(state): State<Arc<BackendState>>,
    Query(filter): Query<ClassFilter>,
    multipart: Multipart,
) -> Response {
    let (_, file_len) = read_form(multipart).await;
    if file_len == 0 {
        return detail(StatusCode::BAD_REQUEST, "Empty file.");
    }
    let class_id = filter.class_id.unwrap_or_default();
    let parsed = json!({
        "subject_area": "Computer Science",
        "instructor": "Dr. Rivera",
        "description": "Design and analysis of algorithms.",
        "grading_policy": { "homework": 40, "exams": 60 },
    });
    let mut classes = state.classes.lock().unwrap();
    let Some(class) = classes.iter_mut().find(|c| c["id"] == class_id.as_str()) else {
        return detail(StatusCode::NOT_FOUND, "Class not found");
    };
    class["has_syllabus"] = json!(true);
    for key in ["subject_area", "instructor", "description", "grading_policy"] {
        class[key] = parsed[key].clone();
    }
    Json(json!({
        "success": true,
        "parsed_data": parsed,
        "assignments_created": 3,
    }))
    .into_response()
}

async fn syllabus_preview(
    State(state): State<Arc<BackendState>>,
    Path(class_id): Path<String>,
) -> Response {
    match find_class(&state, &class_id) {
        Some(class) => Json(class).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Class not found"),
    }
}

async fn today_plan(
    State(state): State<Arc<BackendState>>,
    Path(class_id): Path<String>,
) -> Response {
    let Some(class) = find_class(&state, &class_id) else {
        return detail(StatusCode::NOT_FOUND, "Class not found");
    };
    if class["has_syllabus"] != true {
        return Json(json!({
            "message": "Upload a syllabus to get personalized daily plans",
            "tasks": [],
            "recommendation": "Start by uploading your course syllabus",
        }))
        .into_response();
    }
    Json(json!({
        "class_name": class["name"],
        "current_week": 3,
        "week_title": "Divide and conquer",
        "today_focus": ["Review merge sort", "Practice recurrences"],
        "estimated_time": "1.5",
        "why_important": "Homework 2 is due Friday",
        "upcoming_assessments": [{ "title": "Midterm Exam", "due": "2025-03-01" }],
        "your_progress": { "concepts_mastered": 4, "this_week_topics": ["Master theorem"] },
        "study_methods": ["Active recall", "Worked examples"],
        "materials_available": 2,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ExamParams {
    exam_name: String,
    weeks_until: u32,
}

async fn exam_prep(
    State(state): State<Arc<BackendState>>,
    Path(class_id): Path<String>,
    Query(params): Query<ExamParams>,
) -> Response {
    match find_class(&state, &class_id) {
        Some(class) if class["has_syllabus"] == true => {}
        _ => return detail(StatusCode::NOT_FOUND, "Syllabus not found. Upload syllabus first."),
    }
    let prep_plan: Vec<Value> = (1..=params.weeks_until)
        .map(|week| json!({ "week": week, "focus": format!("Week {} review", week) }))
        .collect();
    Json(json!({
        "exam_name": params.exam_name,
        "weeks_until": params.weeks_until,
        "prep_plan": prep_plan,
        "strategies": ["Spaced repetition"],
        "common_pitfalls": ["Cramming the night before"],
        "day_before_tips": ["Sleep eight hours"],
    }))
    .into_response()
}

async fn import_calendar(mut multipart: Multipart) -> Response {
    let mut text = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            text = field.text().await.unwrap_or_default();
        }
    }
    let created = text.matches("BEGIN:VEVENT").count();
    Json(json!({
        "assignments_created": created,
        "assignments_skipped": 0,
        "matched_classes": ["CMP_SC-4540"],
    }))
    .into_response()
}

async fn list_assignments(Query(filter): Query<ClassFilter>) -> Response {
    let class_id = filter.class_id.unwrap_or_else(|| "class_1".to_string());
    Json(json!([
        { "id": "as_1", "class_id": class_id, "title": "Homework 3",
          "due_date": "2025-02-01T23:59:00Z", "points": 10.0 },
        { "id": "as_2", "class_id": class_id, "title": "Midterm Exam",
          "due_date": "2025-03-01T15:00:00Z", "source": "calendar" },
    ]))
    .into_response()
}

pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(BackendState::default());
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/quiz", post(create_quiz))
        .route("/rest/v1/documents", get(select_documents))
        .route("/library/document/{id}", delete(delete_document))
        .route("/library/document/{id}/download", get(download_document))
        .route("/library/document/{id}/summary-pdf", get(summary_pdf))
        .route("/library/quiz/{id}", delete(delete_quiz))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{id}", delete(delete_class))
        .route("/classes/{id}/concept-map", get(concept_map))
        .route("/syllabus/upload", post(upload_syllabus))
        .route("/syllabus/preview/{id}", get(syllabus_preview))
        .route("/intelligent/dashboard/{id}/today", get(today_plan))
        .route("/intelligent/exam-prep/{id}", post(exam_prep))
        .route("/calendar/import", post(import_calendar))
        .route("/calendar/assignments", get(list_assignments))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockBackend { addr, state }
}

//=========================================================================================
// Auth Provider
//=========================================================================================

pub struct AuthState {
    pub expires_in: AtomicI64,
    pub refresh_allowed: AtomicBool,
    pub logouts: AtomicUsize,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            expires_in: AtomicI64::new(3600),
            refresh_allowed: AtomicBool::new(true),
            logouts: AtomicUsize::new(0),
        }
    }
}

pub struct MockAuth {
    pub addr: SocketAddr,
    pub state: Arc<AuthState>,
}

impl MockAuth {
    pub fn session(&self, leeway: Duration) -> SupabaseSession {
        SupabaseSession::with_client(
            reqwest::Client::new(),
            &format!("http://{}", self.addr),
            ANON_KEY,
            leeway,
        )
    }
}

#[derive(Deserialize)]
struct Grant {
    grant_type: String,
}

fn token_body(access_token: &str, refresh_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": refresh_token,
        "user": { "id": "user-1", "email": "ada@example.com" },
    })
}

async fn token(
    State(state): State<Arc<AuthState>>,
    Query(grant): Query<Grant>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "No API key found" })))
            .into_response();
    }
    let invalid = |description: &str| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": description })),
        )
            .into_response()
    };
    match grant.grant_type.as_str() {
        "password" => {
            if body["email"] == "ada@example.com" && body["password"] == "secret" {
                let expires_in = state.expires_in.load(Ordering::SeqCst);
                Json(token_body(GOOD_TOKEN, "refresh-1", expires_in)).into_response()
            } else {
                invalid("Invalid login credentials")
            }
        }
        "refresh_token" => {
            if body["refresh_token"] == "refresh-1" && state.refresh_allowed.load(Ordering::SeqCst)
            {
                Json(token_body(REFRESHED_TOKEN, "refresh-2", 3600)).into_response()
            } else {
                invalid("Invalid Refresh Token: Already Used")
            }
        }
        _ => invalid("unsupported grant"),
    }
}

async fn logout(State(state): State<Arc<AuthState>>) -> StatusCode {
    state.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

pub async fn spawn_auth() -> MockAuth {
    let state = Arc::new(AuthState::default());
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockAuth { addr, state }
}

//=========================================================================================
// Client Helpers
//=========================================================================================

pub fn session_valid_for(token: &str, valid_for: Duration) -> Session {
    Session {
        access_token: AccessToken::new(token),
        refresh_token: None,
        expires_at: Utc::now() + valid_for,
        user: User {
            id: "user-1".into(),
            email: Some("ada@example.com".into()),
        },
    }
}

pub fn signed_in() -> Arc<StaticSession> {
    Arc::new(StaticSession::new(
        session_valid_for(GOOD_TOKEN, Duration::hours(1)),
        Duration::seconds(30),
    ))
}

pub fn expired() -> Arc<StaticSession> {
    Arc::new(StaticSession::new(
        session_valid_for(GOOD_TOKEN, Duration::minutes(-5)),
        Duration::seconds(30),
    ))
}

pub fn api(
    backend: &MockBackend,
    session: Arc<StaticSession>,
    timeout: std::time::Duration,
    max_upload_bytes: usize,
) -> HttpStudyApi<StaticSession> {
    let http = reqwest::Client::builder().timeout(timeout).build().unwrap();
    HttpStudyApi::with_client(http, backend.endpoints(), session, max_upload_bytes)
}

pub fn default_api(backend: &MockBackend, session: Arc<StaticSession>) -> HttpStudyApi<StaticSession> {
    api(
        backend,
        session,
        std::time::Duration::from_secs(5),
        25 * 1024 * 1024,
    )
}
