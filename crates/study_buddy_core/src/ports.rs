//! crates/study_buddy_core/src/ports.rs
//!
//! Defines the service contracts (traits) at the boundary of the client core.
//! The core never talks to the network itself: the identity service and the
//! backend API are reached through these ports, which keeps request logic
//! testable against in-memory fakes.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{
    AccessToken, Assignment, CalendarImportReport, ClassCollection, ConceptMap, Deleted,
    Document, DownloadLink, DownloadMode, ExamPrepPlan, FlashcardSet, Quiz, QuizRequest,
    Session, SessionEvent, Summary, SummaryPdf, SyllabusOutcome, TodayPlan, UploadFile,
    UploadReceipt, UploadRequest,
};
use crate::validate::ValidationError;

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// Every failure an operation can surface to the UI. Nothing here is fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// No valid session; the caller must redirect to sign-in.
    #[error("Unauthenticated")]
    Unauthenticated,
    /// The backend refused the request (4xx other than auth and quota).
    #[error("Invalid request ({status}): {message}")]
    InvalidRequest { status: u16, message: String },
    /// The server-side usage limit was hit.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    /// 5xx, network failure or client-side timeout.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The backend answered but the payload did not have the expected shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PortError {
    /// Builds a local pre-flight rejection, raised before any network I/O.
    pub fn bad_input(message: impl Into<String>) -> Self {
        PortError::InvalidRequest {
            status: 400,
            message: message.into(),
        }
    }

    /// The resource does not exist (or no longer exists).
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::InvalidRequest { status: 404, .. })
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, PortError::Unauthenticated)
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Wraps the third-party identity service.
///
/// Implementations hold a read-only cached session for request issuance and are
/// the only writer of that cache.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The current, non-expired session. Refreshes through the provider when
    /// needed; returns `Unauthenticated` when that is impossible.
    async fn current_session(&self) -> PortResult<Session>;

    /// The bearer token for the next request.
    async fn token(&self) -> PortResult<AccessToken> {
        self.current_session().await.map(|s| s.access_token)
    }

    /// Drops the cached session after the backend rejected `rejected`. A session
    /// that has since moved on to another token is left alone.
    async fn invalidate(&self, rejected: &AccessToken);

    /// Session-change events.
    fn subscribe(&self) -> watch::Receiver<SessionEvent>;
}

/// One method per backend capability.
#[async_trait]
pub trait StudyApi: Send + Sync {
    // --- Documents & Artifacts ---
    async fn upload_document(&self, req: UploadRequest) -> PortResult<UploadReceipt>;

    async fn request_summary(&self, document_id: &str) -> PortResult<Summary>;

    async fn request_quiz(&self, req: QuizRequest) -> PortResult<Quiz>;

    async fn request_flashcards(&self, document_id: &str) -> PortResult<FlashcardSet>;

    async fn request_concept_map(&self, class_id: &str) -> PortResult<ConceptMap>;

    async fn list_documents(&self, class_id: Option<&str>) -> PortResult<Vec<Document>>;

    /// A signed URL for the document's original PDF.
    async fn document_download(
        &self,
        document_id: &str,
        mode: DownloadMode,
    ) -> PortResult<DownloadLink>;

    async fn export_summary_pdf(&self, document_id: &str) -> PortResult<SummaryPdf>;

    // --- Classes, Syllabus & Calendar ---
    async fn list_classes(&self) -> PortResult<Vec<ClassCollection>>;

    async fn create_class(&self, name: &str) -> PortResult<ClassCollection>;

    async fn parse_syllabus(&self, class_id: &str, file: UploadFile)
        -> PortResult<SyllabusOutcome>;

    /// The class together with whatever its parsed syllabus filled in.
    async fn syllabus_preview(&self, class_id: &str) -> PortResult<ClassCollection>;

    async fn import_calendar(&self, file: UploadFile) -> PortResult<CalendarImportReport>;

    async fn list_assignments(&self, class_id: Option<&str>) -> PortResult<Vec<Assignment>>;

    // --- Study Plans ---
    async fn today_plan(&self, class_id: &str) -> PortResult<TodayPlan>;

    async fn exam_prep(
        &self,
        class_id: &str,
        exam_name: &str,
        weeks_until: u32,
    ) -> PortResult<ExamPrepPlan>;

    // --- Deletion ---
    async fn delete_document(&self, document_id: &str) -> PortResult<Deleted>;

    async fn delete_quiz(&self, quiz_id: &str) -> PortResult<Deleted>;

    async fn delete_class(&self, class_id: &str) -> PortResult<Deleted>;
}
