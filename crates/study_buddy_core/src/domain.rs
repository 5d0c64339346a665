//! crates/study_buddy_core/src/domain.rs
//!
//! Defines the closed, checked data structures the rest of the client works with.
//! Nothing here is persisted locally: every entity is owned by the backend or the
//! auth provider, and these are request-scoped copies of what they returned.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

//=========================================================================================
// Identity
//=========================================================================================

/// An opaque bearer token issued by the auth provider.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The signed-in user, as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

/// A cached reference to the provider's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    /// True when the token is expired, or will be within `leeway`.
    pub fn is_expired(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        self.expires_at <= now + leeway
    }
}

/// Session-change events published by a session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// No event observed yet.
    Initial,
    SignedIn(User),
    TokenRefreshed(User),
    SignedOut,
    /// The session lapsed or the backend rejected its token.
    Expired,
}

//=========================================================================================
// Classes & Documents
//=========================================================================================

/// A named grouping of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCollection {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub syllabus: Option<SyllabusInfo>,
}

/// Syllabus metadata the backend attaches to a class once a syllabus was parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyllabusInfo {
    pub subject_area: Option<String>,
    pub instructor: Option<String>,
    pub description: Option<String>,
    pub grading_policy: Option<String>,
}

/// An uploaded source document. Belongs to at most one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub user_id: Option<String>,
    pub class_id: Option<String>,
    pub title: String,
    pub pdf_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Generated Artifacts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Summary,
    Quiz,
    Flashcards,
    ConceptMap,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Summary => "summary",
            ArtifactKind::Quiz => "quiz",
            ArtifactKind::Flashcards => "flashcards",
            ArtifactKind::ConceptMap => "concept map",
        };
        f.write_str(name)
    }
}

/// A generated study resource tied to one source document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArtifact {
    pub id: String,
    pub document_id: String,
    pub payload: ArtifactPayload,
    pub created_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    pub fn new(id: String, document_id: String, payload: ArtifactPayload) -> Self {
        Self {
            id,
            document_id,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Summary(Summary),
    Quiz(Quiz),
    Flashcards(FlashcardSet),
    ConceptMap(ConceptMap),
}

impl ArtifactPayload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactPayload::Summary(_) => ArtifactKind::Summary,
            ArtifactPayload::Quiz(_) => ArtifactKind::Quiz,
            ArtifactPayload::Flashcards(_) => ArtifactKind::Flashcards,
            ArtifactPayload::ConceptMap(_) => ArtifactKind::ConceptMap,
        }
    }
}

/// Markdown study notes for a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub document_id: String,
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

/// A multiple-choice question. `answer_index` always points into `choices`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestion {
    pub question: String,
    pub choices: Vec<String>,
    pub answer_index: usize,
    pub explanation: Option<String>,
    pub source: Option<String>,
}

impl QuizQuestion {
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.answer_index]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashcardSet {
    pub document_id: String,
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashcardKind {
    Definition,
    Qa,
    Concept,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flashcard {
    pub kind: FlashcardKind,
    pub front: String,
    pub back: String,
}

/// The concept graph of a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptMap {
    pub nodes: Vec<ConceptNode>,
    pub edges: Vec<ConceptEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Core,
    Important,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    pub importance: Importance,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptEdge {
    pub from: String,
    pub to: String,
    pub kind: String,
    pub label: String,
    pub weight: f64,
    pub confidence: Option<f64>,
    pub evidence: Vec<String>,
}

//=========================================================================================
// Operation Results
//=========================================================================================

/// What the backend returns after a document upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub summary: Option<Summary>,
    pub flashcards: Option<FlashcardSet>,
    pub concept_guide: Option<ConceptMap>,
}

impl UploadReceipt {
    /// Every artifact the backend generated inline with the upload.
    pub fn artifacts(&self) -> Vec<GeneratedArtifact> {
        let mut out = Vec::new();
        if let Some(summary) = &self.summary {
            out.push(GeneratedArtifact::new(
                format!("{}:summary", self.document_id),
                self.document_id.clone(),
                ArtifactPayload::Summary(summary.clone()),
            ));
        }
        if let Some(cards) = &self.flashcards {
            out.push(GeneratedArtifact::new(
                format!("{}:flashcards", self.document_id),
                self.document_id.clone(),
                ArtifactPayload::Flashcards(cards.clone()),
            ));
        }
        if let Some(map) = &self.concept_guide {
            out.push(GeneratedArtifact::new(
                format!("{}:concept_map", self.document_id),
                self.document_id.clone(),
                ArtifactPayload::ConceptMap(map.clone()),
            ));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyllabusOutcome {
    pub syllabus: SyllabusInfo,
    pub assignments_created: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Assignment,
    Exam,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<f64>,
    pub completed: bool,
    pub source: Option<String>,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarImportReport {
    pub created: u32,
    pub skipped: u32,
    pub matched_classes: Vec<String>,
}

/// How a stored PDF should be opened from its signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    Download,
    Inline,
}

impl DownloadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadMode::Download => "download",
            DownloadMode::Inline => "inline",
        }
    }
}

/// A short-lived signed URL for a document's original PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub document_id: String,
    pub url: String,
    pub mode: DownloadMode,
}

/// A document summary rendered to PDF by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct SummaryPdf {
    pub document_id: String,
    pub bytes: Bytes,
}

impl fmt::Debug for SummaryPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryPdf")
            .field("document_id", &self.document_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Today's study plan for a class. Without a parsed syllabus the plan is empty
/// and `message` says what to do first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayPlan {
    pub class_name: Option<String>,
    pub message: Option<String>,
    pub current_week: u32,
    pub week_title: Option<String>,
    pub focus: Vec<String>,
    pub estimated_hours: Option<f64>,
    pub why_important: Option<String>,
    pub upcoming_assessments: Vec<String>,
    pub concepts_mastered: u32,
    pub study_methods: Vec<String>,
}

/// A generated week-by-week plan leading up to an exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamPrepPlan {
    pub exam_name: String,
    pub weeks_until: u32,
    pub steps: Vec<String>,
    pub strategies: Vec<String>,
    pub common_pitfalls: Vec<String>,
    pub day_before_tips: Vec<String>,
}

/// Acknowledgement of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: String,
}

//=========================================================================================
// Upload Inputs
//=========================================================================================

/// A file picked by the user, held in memory until it is sent.
#[derive(Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Case-insensitive extension check, e.g. `has_extension("pdf")`.
    pub fn has_extension(&self, ext: &str) -> bool {
        self.file_name
            .rsplit_once('.')
            .map(|(_, e)| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false)
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Which artifacts the backend should generate for an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: UploadFile,
    pub title: String,
    pub class_id: String,
    pub make_summary: bool,
    pub make_cards: bool,
    pub make_guide: bool,
}

impl UploadRequest {
    pub fn new(file: UploadFile, class_id: impl Into<String>) -> Self {
        Self {
            file,
            title: "Comprehensive Study Notes".to_string(),
            class_id: class_id.into(),
            make_summary: true,
            make_cards: true,
            make_guide: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub file: UploadFile,
    pub title: String,
    pub num_questions: u32,
}

impl QuizRequest {
    pub const MIN_QUESTIONS: u32 = 10;
    pub const MAX_QUESTIONS: u32 = 40;

    pub fn new(file: UploadFile, title: impl Into<String>, num_questions: u32) -> Self {
        Self {
            file,
            title: title.into(),
            num_questions: num_questions.clamp(Self::MIN_QUESTIONS, Self::MAX_QUESTIONS),
        }
    }
}
