pub mod domain;
pub mod gate;
pub mod ports;
pub mod validate;
pub mod view;

pub use domain::{
    AccessToken, ArtifactKind, ArtifactPayload, Assignment, AssignmentKind, CalendarImportReport,
    ClassCollection, ConceptEdge, ConceptMap, ConceptNode, Deleted, Difficulty, Document,
    DownloadLink, DownloadMode, ExamPrepPlan, Flashcard, FlashcardKind, FlashcardSet,
    GeneratedArtifact, Importance, Quiz, QuizQuestion, QuizRequest, Session, SessionEvent,
    Summary, SummaryPdf, SyllabusInfo, SyllabusOutcome, TodayPlan, UploadFile, UploadReceipt,
    UploadRequest, User,
};
pub use gate::{AuthGate, GateDecision, GateState, SignedOutReason};
pub use ports::{PortError, PortResult, SessionProvider, StudyApi};
pub use validate::{degrade, validate, validate_in, Context, Degraded, Validate, ValidationError};
pub use view::{Ticket, ViewScope};
