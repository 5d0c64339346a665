//! crates/study_buddy_core/src/validate.rs
//!
//! The response validator. Backend payloads (many of them AI-generated) are not
//! statically guaranteed to have any particular shape, so every response is
//! decoded into a closed wire type and then checked before rendering code sees it.
//!
//! Validation never panics: anything unexpected becomes a `ValidationError`,
//! which the UI shows as a degraded "content unavailable" state.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::domain::{
    Assignment, AssignmentKind, CalendarImportReport, ClassCollection, ConceptEdge, ConceptMap,
    ConceptNode, Deleted, Difficulty, Document, DownloadLink, DownloadMode, ExamPrepPlan,
    Flashcard, FlashcardKind, FlashcardSet, Importance, Quiz, QuizQuestion, Summary, SummaryPdf,
    SyllabusInfo, SyllabusOutcome, TodayPlan, UploadReceipt,
};

//=========================================================================================
// Errors & Entry Points
//=========================================================================================

/// A backend payload did not match the expected shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {target} payload: {reason}")]
pub struct ValidationError {
    pub target: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
        }
    }
}

/// Request-side facts a payload may legitimately omit, such as the id of the
/// resource that was asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'a> {
    pub resource_id: Option<&'a str>,
}

impl<'a> Context<'a> {
    pub fn for_resource(id: &'a str) -> Self {
        Self {
            resource_id: Some(id),
        }
    }
}

/// A type that can be built from an untrusted backend payload.
pub trait Validate: Sized {
    /// Names the payload in error messages.
    const TARGET: &'static str;

    /// The raw shape, decoded with serde; missing required fields fail here.
    type Wire: DeserializeOwned;

    /// Semantic checks and conversion into the closed domain type.
    fn check(wire: Self::Wire, ctx: Context<'_>) -> Result<Self, String>;
}

pub fn validate<T: Validate>(raw: Value) -> Result<T, ValidationError> {
    validate_in(raw, Context::default())
}

pub fn validate_in<T: Validate>(raw: Value, ctx: Context<'_>) -> Result<T, ValidationError> {
    let wire: T::Wire =
        serde_json::from_value(raw).map_err(|e| ValidationError::new(T::TARGET, e.to_string()))?;
    T::check(wire, ctx).map_err(|reason| ValidationError::new(T::TARGET, reason))
}

impl<T: Validate> Validate for Vec<T> {
    const TARGET: &'static str = T::TARGET;
    type Wire = Vec<T::Wire>;

    fn check(wire: Self::Wire, ctx: Context<'_>) -> Result<Self, String> {
        wire.into_iter()
            .enumerate()
            .map(|(i, item)| T::check(item, ctx).map_err(|e| format!("item {}: {}", i, e)))
            .collect()
    }
}

//=========================================================================================
// Degraded View State
//=========================================================================================

/// What a view renders: the content, or a non-fatal placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Degraded<T> {
    Ready(T),
    Unavailable(String),
}

impl<T> Degraded<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Degraded::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Degraded::Ready(v) => Some(v),
            Degraded::Unavailable(_) => None,
        }
    }
}

/// Turns validation failures into `Degraded::Unavailable`; every other error is
/// left for the caller (auth redirects, quota messages, ...).
pub fn degrade<T>(
    result: Result<T, crate::ports::PortError>,
) -> Result<Degraded<T>, crate::ports::PortError> {
    match result {
        Ok(v) => Ok(Degraded::Ready(v)),
        Err(crate::ports::PortError::Validation(e)) => {
            tracing::warn!("Rendering degraded view: {}", e);
            Ok(Degraded::Unavailable(format!("{} content unavailable", e.target)))
        }
        Err(e) => Err(e),
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Strips markdown code fences the model sometimes wraps around JSON.
pub fn strip_code_fences(s: &str) -> &str {
    let t = s.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decodes a field that the backend sends either as a JSON string or inline.
fn embedded<T: DeserializeOwned>(field: &str, value: Value) -> Result<T, String> {
    let value = match value {
        Value::String(s) => {
            serde_json::from_str(strip_code_fences(&s)).map_err(|e| format!("{}: {}", field, e))?
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|e| format!("{}: {}", field, e))
}

fn non_empty(field: &str, value: String) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{} is empty", field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Free-text fields the model may emit as strings, objects or lists.
fn loose_text(value: Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => Some(other.to_string()),
    }
}

/// Lists the model may emit as arrays of strings or objects, or as one string.
fn loose_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| loose_text(Some(v)))
            .collect(),
        other => loose_text(other).into_iter().collect(),
    }
}

fn loose_number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn resolve_id(field: &str, wire: Option<String>, ctx: Context<'_>) -> Result<String, String> {
    match wire.or_else(|| ctx.resource_id.map(str::to_string)) {
        Some(id) => non_empty(field, id),
        None => Err(format!("missing field `{}`", field)),
    }
}

//=========================================================================================
// Summary
//=========================================================================================

#[derive(Deserialize)]
pub struct SummaryWire {
    #[serde(default, alias = "documentId", alias = "document_id")]
    id: Option<String>,
    summary: String,
}

impl Validate for Summary {
    const TARGET: &'static str = "summary";
    type Wire = SummaryWire;

    fn check(wire: SummaryWire, ctx: Context<'_>) -> Result<Self, String> {
        Ok(Summary {
            document_id: resolve_id("id", wire.id, ctx)?,
            markdown: non_empty("summary", wire.summary)?,
        })
    }
}

//=========================================================================================
// Flashcards
//=========================================================================================

#[derive(Deserialize)]
struct CardsBody {
    cards: Vec<CardWire>,
}

#[derive(Deserialize)]
struct CardWire {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    front: String,
    back: String,
}

fn check_cards(document_id: String, body: CardsBody) -> Result<FlashcardSet, String> {
    let cards = body
        .cards
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let kind = match c.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
                None | Some("concept") => FlashcardKind::Concept,
                Some("definition") => FlashcardKind::Definition,
                Some("qa") => FlashcardKind::Qa,
                Some(other) => return Err(format!("card {}: unknown type `{}`", i, other)),
            };
            Ok(Flashcard {
                kind,
                front: non_empty(&format!("card {} front", i), c.front)?,
                back: non_empty(&format!("card {} back", i), c.back)?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok(FlashcardSet { document_id, cards })
}

#[derive(Deserialize)]
pub struct FlashcardsWire {
    #[serde(default, alias = "documentId", alias = "document_id")]
    id: Option<String>,
    cards_json: Value,
}

impl Validate for FlashcardSet {
    const TARGET: &'static str = "flashcards";
    type Wire = FlashcardsWire;

    fn check(wire: FlashcardsWire, ctx: Context<'_>) -> Result<Self, String> {
        let document_id = resolve_id("id", wire.id, ctx)?;
        check_cards(document_id, embedded("cards_json", wire.cards_json)?)
    }
}

//=========================================================================================
// Quiz
//=========================================================================================

#[derive(Deserialize)]
struct QuizBody {
    questions: Vec<QuestionWire>,
}

#[derive(Deserialize)]
struct QuestionWire {
    question: String,
    choices: Vec<String>,
    answer_index: usize,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
pub struct QuizWire {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    num_questions: Option<usize>,
    quiz_json: Value,
}

impl Validate for Quiz {
    const TARGET: &'static str = "quiz";
    type Wire = QuizWire;

    fn check(wire: QuizWire, _ctx: Context<'_>) -> Result<Self, String> {
        let body: QuizBody = embedded("quiz_json", wire.quiz_json)?;
        if body.questions.is_empty() {
            return Err("quiz has no questions".to_string());
        }
        if let Some(n) = wire.num_questions {
            if n != body.questions.len() {
                return Err(format!(
                    "num_questions is {} but {} questions were sent",
                    n,
                    body.questions.len()
                ));
            }
        }
        let questions = body
            .questions
            .into_iter()
            .enumerate()
            .map(|(i, q)| {
                if q.choices.len() < 2 {
                    return Err(format!("question {} has fewer than two choices", i));
                }
                if q.answer_index >= q.choices.len() {
                    return Err(format!(
                        "question {} answer_index {} out of range",
                        i, q.answer_index
                    ));
                }
                Ok(QuizQuestion {
                    question: non_empty(&format!("question {}", i), q.question)?,
                    choices: q.choices,
                    answer_index: q.answer_index,
                    explanation: q.explanation,
                    source: q.source,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Quiz {
            id: non_empty("id", wire.id)?,
            title: wire.title.unwrap_or_else(|| "Untitled".to_string()),
            questions,
        })
    }
}

//=========================================================================================
// Concept Maps
//=========================================================================================

fn parse_importance(s: &str) -> Result<Importance, String> {
    match s.to_ascii_lowercase().as_str() {
        "core" => Ok(Importance::Core),
        "important" => Ok(Importance::Important),
        "advanced" => Ok(Importance::Advanced),
        other => Err(format!("unknown importance `{}`", other)),
    }
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    match s.to_ascii_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(format!("unknown difficulty `{}`", other)),
    }
}

#[derive(Deserialize)]
struct NodeWire {
    id: String,
    label: String,
    importance: String,
    difficulty: String,
}

#[derive(Deserialize)]
struct EdgeWire {
    from: String,
    to: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, alias = "strength")]
    weight: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    evidence: Option<Vec<String>>,
}

fn check_edges(edges: Vec<EdgeWire>, ids: &HashSet<String>) -> Result<Vec<ConceptEdge>, String> {
    edges
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            for end in [&e.from, &e.to] {
                if !ids.contains(end) {
                    return Err(format!("edge {} references unknown concept `{}`", i, end));
                }
            }
            let kind = e
                .kind
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "related".to_string());
            Ok(ConceptEdge {
                from: e.from,
                to: e.to,
                label: e.label.map(|l| l.trim().to_string()).unwrap_or_default(),
                kind,
                weight: e.weight.unwrap_or(1.0),
                confidence: e.confidence,
                evidence: e.evidence.unwrap_or_default(),
            })
        })
        .collect()
}

#[derive(Deserialize)]
pub struct ConceptMapWire {
    nodes: Vec<NodeWire>,
    #[serde(default)]
    edges: Vec<EdgeWire>,
}

impl Validate for ConceptMap {
    const TARGET: &'static str = "concept map";
    type Wire = ConceptMapWire;

    fn check(wire: ConceptMapWire, _ctx: Context<'_>) -> Result<Self, String> {
        let nodes = wire
            .nodes
            .into_iter()
            .map(|n| {
                Ok(ConceptNode {
                    id: non_empty("node id", n.id)?,
                    label: n.label,
                    importance: parse_importance(&n.importance)?,
                    difficulty: parse_difficulty(&n.difficulty)?,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        let ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let edges = check_edges(wire.edges, &ids)?;
        Ok(ConceptMap { nodes, edges })
    }
}

/// The per-document concept guide shipped with an upload; concepts are keyed by name.
#[derive(Deserialize)]
struct GuideBody {
    #[serde(default)]
    concepts: Vec<GuideConcept>,
    #[serde(default)]
    edges: Vec<EdgeWire>,
}

#[derive(Deserialize)]
struct GuideConcept {
    name: String,
    #[serde(default)]
    importance: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

fn check_guide(body: GuideBody) -> Result<Option<ConceptMap>, String> {
    if body.concepts.is_empty() {
        return Ok(None);
    }
    let nodes = body
        .concepts
        .into_iter()
        .map(|c| {
            let name = non_empty("concept name", c.name)?;
            Ok(ConceptNode {
                id: name.clone(),
                label: name,
                importance: parse_importance(c.importance.as_deref().unwrap_or("important"))?,
                difficulty: parse_difficulty(c.difficulty.as_deref().unwrap_or("medium"))?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;
    let ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    let edges = check_edges(body.edges, &ids)?;
    Ok(Some(ConceptMap { nodes, edges }))
}

//=========================================================================================
// Upload Receipt
//=========================================================================================

#[derive(Deserialize)]
pub struct UploadWire {
    #[serde(alias = "documentId", alias = "document_id")]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    cards_json: Option<Value>,
    #[serde(default)]
    guide_json: Option<Value>,
}

impl Validate for UploadReceipt {
    const TARGET: &'static str = "upload";
    type Wire = UploadWire;

    fn check(wire: UploadWire, _ctx: Context<'_>) -> Result<Self, String> {
        let document_id = non_empty("id", wire.id)?;

        let summary = wire
            .summary
            .filter(|s| !s.trim().is_empty())
            .map(|markdown| Summary {
                document_id: document_id.clone(),
                markdown,
            });

        let flashcards = match wire.cards_json {
            None | Some(Value::Null) => None,
            Some(v) => Some(check_cards(document_id.clone(), embedded("cards_json", v)?)?),
        }
        .filter(|set| !set.cards.is_empty());

        let concept_guide = match wire.guide_json {
            None | Some(Value::Null) => None,
            Some(v) => check_guide(embedded("guide_json", v)?)?,
        };

        Ok(UploadReceipt {
            document_id,
            summary,
            flashcards,
            concept_guide,
        })
    }
}

//=========================================================================================
// Classes, Documents & Assignments
//=========================================================================================

#[derive(Deserialize)]
pub struct ClassWire {
    id: String,
    name: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    has_syllabus: Option<bool>,
    #[serde(default)]
    subject_area: Option<Value>,
    #[serde(default)]
    instructor: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    grading_policy: Option<Value>,
}

impl Validate for ClassCollection {
    const TARGET: &'static str = "class";
    type Wire = ClassWire;

    fn check(wire: ClassWire, _ctx: Context<'_>) -> Result<Self, String> {
        let syllabus = wire.has_syllabus.unwrap_or(false).then(|| SyllabusInfo {
            subject_area: loose_text(wire.subject_area),
            instructor: loose_text(wire.instructor),
            description: loose_text(wire.description),
            grading_policy: loose_text(wire.grading_policy),
        });
        Ok(ClassCollection {
            id: non_empty("id", wire.id)?,
            name: non_empty("name", wire.name)?,
            created_at: wire.created_at,
            syllabus,
        })
    }
}

#[derive(Deserialize)]
pub struct DocumentWire {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    class_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    pdf_path: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl Validate for Document {
    const TARGET: &'static str = "document";
    type Wire = DocumentWire;

    fn check(wire: DocumentWire, _ctx: Context<'_>) -> Result<Self, String> {
        Ok(Document {
            id: non_empty("id", wire.id)?,
            user_id: wire.user_id,
            class_id: wire.class_id,
            title: wire
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            pdf_path: wire.pdf_path,
            created_at: wire.created_at,
        })
    }
}

/// Words in a title that mark an assignment as an exam.
pub const EXAM_CUES: &[&str] = &["exam", "midterm", "final", "test"];

pub fn classify_assignment(title: &str) -> AssignmentKind {
    let lower = title.to_lowercase();
    let is_exam = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| EXAM_CUES.contains(&word));
    if is_exam {
        AssignmentKind::Exam
    } else {
        AssignmentKind::Assignment
    }
}

#[derive(Deserialize)]
pub struct AssignmentWire {
    id: String,
    class_id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    source: Option<String>,
}

impl Validate for Assignment {
    const TARGET: &'static str = "assignment";
    type Wire = AssignmentWire;

    fn check(wire: AssignmentWire, _ctx: Context<'_>) -> Result<Self, String> {
        let title = non_empty("title", wire.title)?;
        Ok(Assignment {
            id: non_empty("id", wire.id)?,
            class_id: non_empty("class_id", wire.class_id)?,
            kind: classify_assignment(&title),
            title,
            description: wire.description,
            due_date: wire.due_date,
            points: wire.points,
            completed: wire.completed.unwrap_or(false),
            source: wire.source,
        })
    }
}

//=========================================================================================
// Syllabus, Calendar & Acknowledgements
//=========================================================================================

#[derive(Deserialize)]
struct ParsedSyllabusWire {
    #[serde(default)]
    subject_area: Option<Value>,
    #[serde(default)]
    instructor: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    grading_policy: Option<Value>,
}

#[derive(Deserialize)]
pub struct SyllabusWire {
    #[serde(default)]
    success: Option<bool>,
    parsed_data: ParsedSyllabusWire,
    #[serde(default)]
    assignments_created: u32,
}

impl Validate for SyllabusOutcome {
    const TARGET: &'static str = "syllabus";
    type Wire = SyllabusWire;

    fn check(wire: SyllabusWire, _ctx: Context<'_>) -> Result<Self, String> {
        if wire.success == Some(false) {
            return Err("backend reported success=false".to_string());
        }
        let p = wire.parsed_data;
        Ok(SyllabusOutcome {
            syllabus: SyllabusInfo {
                subject_area: loose_text(p.subject_area),
                instructor: loose_text(p.instructor),
                description: loose_text(p.description),
                grading_policy: loose_text(p.grading_policy),
            },
            assignments_created: wire.assignments_created,
        })
    }
}

#[derive(Deserialize)]
pub struct CalendarImportWire {
    assignments_created: u32,
    #[serde(default)]
    assignments_skipped: u32,
    #[serde(default)]
    matched_classes: Vec<String>,
}

impl Validate for CalendarImportReport {
    const TARGET: &'static str = "calendar import";
    type Wire = CalendarImportWire;

    fn check(wire: CalendarImportWire, _ctx: Context<'_>) -> Result<Self, String> {
        Ok(CalendarImportReport {
            created: wire.assignments_created,
            skipped: wire.assignments_skipped,
            matched_classes: wire.matched_classes,
        })
    }
}

/// Delete endpoints answer `{"ok": true}` or `{"success": true}`.
#[derive(Deserialize)]
pub struct AckWire {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    success: Option<bool>,
}

impl Validate for Deleted {
    const TARGET: &'static str = "delete";
    type Wire = AckWire;

    fn check(wire: AckWire, ctx: Context<'_>) -> Result<Self, String> {
        if !(wire.ok.unwrap_or(false) || wire.success.unwrap_or(false)) {
            return Err("delete was not acknowledged".to_string());
        }
        Ok(Deleted {
            id: resolve_id("id", None, ctx)?,
        })
    }
}

//=========================================================================================
// Library Exports
//=========================================================================================

#[derive(Deserialize)]
pub struct DownloadWire {
    url: String,
    #[serde(default)]
    mode: Option<String>,
}

impl Validate for DownloadLink {
    const TARGET: &'static str = "download";
    type Wire = DownloadWire;

    fn check(wire: DownloadWire, ctx: Context<'_>) -> Result<Self, String> {
        let url = non_empty("url", wire.url)?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(format!("url `{}` is not an http(s) link", url));
        }
        let mode = match wire.mode.as_deref() {
            None | Some("download") => DownloadMode::Download,
            Some("inline") => DownloadMode::Inline,
            Some(other) => return Err(format!("unknown mode `{}`", other)),
        };
        Ok(DownloadLink {
            document_id: resolve_id("id", None, ctx)?,
            url,
            mode,
        })
    }
}

/// Checks that an exported summary really is a PDF before it is saved.
pub fn check_summary_pdf(document_id: &str, bytes: Bytes) -> Result<SummaryPdf, ValidationError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(ValidationError::new(
            "summary pdf",
            "body does not start with a PDF header",
        ));
    }
    Ok(SummaryPdf {
        document_id: document_id.to_string(),
        bytes,
    })
}

//=========================================================================================
// Study Plans
//=========================================================================================

#[derive(Deserialize, Default)]
struct ProgressWire {
    #[serde(default)]
    concepts_mastered: Option<u32>,
}

#[derive(Deserialize)]
pub struct TodayPlanWire {
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_week: Option<u32>,
    #[serde(default)]
    week_title: Option<Value>,
    #[serde(default)]
    today_focus: Option<Value>,
    #[serde(default)]
    estimated_time: Option<Value>,
    #[serde(default)]
    why_important: Option<Value>,
    #[serde(default)]
    upcoming_assessments: Option<Value>,
    #[serde(default)]
    your_progress: Option<ProgressWire>,
    #[serde(default)]
    study_methods: Option<Value>,
}

impl Validate for TodayPlan {
    const TARGET: &'static str = "study plan";
    type Wire = TodayPlanWire;

    fn check(wire: TodayPlanWire, _ctx: Context<'_>) -> Result<Self, String> {
        let message = wire.message.filter(|m| !m.trim().is_empty());
        let class_name = wire.class_name.filter(|n| !n.trim().is_empty());
        if message.is_none() && class_name.is_none() {
            return Err("plan has neither a class nor a message".to_string());
        }
        Ok(TodayPlan {
            class_name,
            message,
            current_week: wire.current_week.unwrap_or(0),
            week_title: loose_text(wire.week_title),
            focus: loose_list(wire.today_focus),
            estimated_hours: loose_number(wire.estimated_time),
            why_important: loose_text(wire.why_important),
            upcoming_assessments: loose_list(wire.upcoming_assessments),
            concepts_mastered: wire
                .your_progress
                .unwrap_or_default()
                .concepts_mastered
                .unwrap_or(0),
            study_methods: loose_list(wire.study_methods),
        })
    }
}

#[derive(Deserialize)]
pub struct ExamPrepWire {
    exam_name: String,
    weeks_until: u32,
    #[serde(default)]
    prep_plan: Option<Value>,
    #[serde(default)]
    strategies: Option<Value>,
    #[serde(default)]
    common_pitfalls: Option<Value>,
    #[serde(default)]
    day_before_tips: Option<Value>,
}

impl Validate for ExamPrepPlan {
    const TARGET: &'static str = "exam prep";
    type Wire = ExamPrepWire;

    fn check(wire: ExamPrepWire, _ctx: Context<'_>) -> Result<Self, String> {
        let steps = loose_list(wire.prep_plan);
        if steps.is_empty() {
            return Err("prep plan is empty".to_string());
        }
        Ok(ExamPrepPlan {
            exam_name: non_empty("exam_name", wire.exam_name)?,
            weeks_until: wire.weeks_until,
            steps,
            strategies: loose_list(wire.strategies),
            common_pitfalls: loose_list(wire.common_pitfalls),
            day_before_tips: loose_list(wire.day_before_tips),
        })
    }
}
