//! services/client/src/bin/study.rs

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use study_buddy_core::{
    degrade, AuthGate, Degraded, DownloadMode, GateDecision, PortError, QuizRequest,
    SessionProvider, StudyApi, UploadFile, UploadRequest, ViewScope,
};
use study_client::{
    adapters::{HttpStudyApi, StaticSession, SupabaseSession},
    config::Config,
    error::ClientError,
    ics,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "study", version, about = "StudyBuddy command-line client")]
struct Cli {
    /// Account email for password sign-in.
    #[arg(long, env = "STUDY_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "STUDY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Refresh token printed by `study login`.
    #[arg(long, env = "STUDY_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Pre-issued access token (JWT); never refreshed.
    #[arg(long, env = "STUDY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and print the session's user and refresh token
    Login,
    /// List your classes
    Classes,
    /// Create a class
    CreateClass { name: String },
    /// List uploaded documents
    Documents {
        #[arg(long)]
        class: Option<String>,
    },
    /// Upload a PDF and generate study materials
    Upload {
        file: PathBuf,
        #[arg(long)]
        class: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        no_summary: bool,
        #[arg(long)]
        no_cards: bool,
        #[arg(long)]
        no_guide: bool,
    },
    /// Show a document's summary
    Summary { document_id: String },
    /// Print a signed link to a document's original PDF
    Download {
        document_id: String,
        /// Open in the browser instead of downloading
        #[arg(long)]
        inline: bool,
    },
    /// Save a document's summary as a PDF
    SummaryPdf {
        document_id: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Generate a quiz from a PDF
    Quiz {
        file: PathBuf,
        #[arg(long, default_value = "Practice Quiz")]
        title: String,
        #[arg(long, default_value_t = QuizRequest::MIN_QUESTIONS)]
        questions: u32,
    },
    /// Show a document's flashcards
    Flashcards { document_id: String },
    /// Show the concept map of a class
    ConceptMap { class_id: String },
    /// Parse a syllabus PDF into a class
    Syllabus { class_id: String, file: PathBuf },
    /// Show the syllabus details stored on a class
    SyllabusPreview { class_id: String },
    /// Show today's study plan for a class
    Today { class_id: String },
    /// Generate a study plan leading up to an exam
    ExamPrep {
        class_id: String,
        #[arg(long)]
        exam: String,
        #[arg(long, default_value_t = 4)]
        weeks: u32,
    },
    /// Preview an .ics calendar locally, or import it with --import
    Calendar {
        file: PathBuf,
        #[arg(long)]
        import: bool,
    },
    /// List assignments and exams
    Assignments {
        #[arg(long)]
        class: Option<String>,
    },
    DeleteDocument { id: String },
    DeleteQuiz { id: String },
    DeleteClass { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", ClientError::from(e).user_message());
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- 2. Run the Command ---
    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), ClientError> {
    let session = open_session(&cli, &config).await?;

    // Nothing protected runs until the gate has settled.
    let mut gate = AuthGate::mount(config.sign_in_path.clone());
    if let GateDecision::Redirect(path) = gate.resolve(session.as_ref()).await {
        eprintln!("Not signed in. Sign in first ({}).", path);
        return Err(PortError::Unauthenticated.into());
    }

    let api = HttpStudyApi::new(&config, session.clone())?;
    let view = ViewScope::new();

    let Some(result) = view
        .run(execute(&api, session.as_ref(), &config, cli.command))
        .await
    else {
        return Ok(());
    };
    if let Err(ClientError::Port(e)) = &result {
        if let GateDecision::Redirect(path) = gate.on_api_error(e) {
            eprintln!("Redirecting to {}", path);
        }
    }
    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

/// Picks the session provider from the command-line credentials.
async fn open_session(
    cli: &Cli,
    config: &Config,
) -> Result<Arc<dyn SessionProvider>, ClientError> {
    if let Some(token) = &cli.access_token {
        return Ok(Arc::new(StaticSession::from_jwt(
            token,
            config.session_leeway,
        )?));
    }

    let session = SupabaseSession::new(config)?;
    let signed_in = match (&cli.refresh_token, &cli.email, &cli.password) {
        (Some(refresh), _, _) => Some(session.sign_in_with_refresh_token(refresh).await),
        (None, Some(email), Some(password)) => {
            Some(session.sign_in_with_password(email, password).await)
        }
        _ => None,
    };
    match signed_in {
        Some(Ok(user)) => info!(user_id = %user.id, "Session established"),
        Some(Err(e)) => return Err(e.into()),
        // No credentials: the gate redirects to sign-in.
        None => {}
    }
    Ok(Arc::new(session))
}

async fn execute(
    api: &impl StudyApi,
    session: &dyn SessionProvider,
    config: &Config,
    command: Command,
) -> Result<Value, ClientError> {
    let value = match command {
        Command::Login => {
            let current = session.current_session().await?;
            json!({
                "user": current.user,
                "expires_at": current.expires_at,
                "refresh_token": current.refresh_token,
            })
        }
        Command::Classes => serde_json::to_value(api.list_classes().await?)?,
        Command::CreateClass { name } => serde_json::to_value(api.create_class(&name).await?)?,
        Command::Documents { class } => {
            serde_json::to_value(api.list_documents(class.as_deref()).await?)?
        }
        Command::Upload {
            file,
            class,
            title,
            no_summary,
            no_cards,
            no_guide,
        } => {
            let mut req = UploadRequest::new(read_upload(&file).await?, class);
            if let Some(title) = title {
                req = req.with_title(title);
            }
            req.make_summary = !no_summary;
            req.make_cards = !no_cards;
            req.make_guide = !no_guide;
            let receipt = api.upload_document(req).await?;
            info!(document_id = %receipt.document_id, "Upload complete");
            serde_json::to_value(receipt)?
        }
        Command::Summary { document_id } => {
            render(degrade(api.request_summary(&document_id).await)?)?
        }
        Command::Download {
            document_id,
            inline,
        } => {
            let mode = if inline {
                DownloadMode::Inline
            } else {
                DownloadMode::Download
            };
            serde_json::to_value(api.document_download(&document_id, mode).await?)?
        }
        Command::SummaryPdf { document_id, out } => {
            let pdf = api.export_summary_pdf(&document_id).await?;
            tokio::fs::write(&out, &pdf.bytes).await?;
            info!(document_id = %pdf.document_id, path = %out.display(), "Summary PDF saved");
            json!({
                "document_id": pdf.document_id,
                "path": out.display().to_string(),
                "bytes": pdf.bytes.len(),
            })
        }
        Command::Quiz {
            file,
            title,
            questions,
        } => {
            let req = QuizRequest::new(read_upload(&file).await?, title, questions);
            render(degrade(api.request_quiz(req).await)?)?
        }
        Command::Flashcards { document_id } => {
            render(degrade(api.request_flashcards(&document_id).await)?)?
        }
        Command::ConceptMap { class_id } => {
            render(degrade(api.request_concept_map(&class_id).await)?)?
        }
        Command::Syllabus { class_id, file } => {
            let file = read_upload(&file).await?;
            serde_json::to_value(api.parse_syllabus(&class_id, file).await?)?
        }
        Command::SyllabusPreview { class_id } => {
            serde_json::to_value(api.syllabus_preview(&class_id).await?)?
        }
        Command::Today { class_id } => render(degrade(api.today_plan(&class_id).await)?)?,
        Command::ExamPrep {
            class_id,
            exam,
            weeks,
        } => render(degrade(api.exam_prep(&class_id, &exam, weeks).await)?)?,
        Command::Calendar { file, import: true } => {
            serde_json::to_value(api.import_calendar(read_upload(&file).await?).await?)?
        }
        Command::Calendar { file, import: false } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let classes = api.list_classes().await?;
            serde_json::to_value(ics::preview_import(
                &text,
                &classes,
                config.calendar_zone,
            )?)?
        }
        Command::Assignments { class } => {
            serde_json::to_value(api.list_assignments(class.as_deref()).await?)?
        }
        Command::DeleteDocument { id } => serde_json::to_value(api.delete_document(&id).await?)?,
        Command::DeleteQuiz { id } => serde_json::to_value(api.delete_quiz(&id).await?)?,
        Command::DeleteClass { id } => serde_json::to_value(api.delete_class(&id).await?)?,
    };
    Ok(value)
}

/// Generated content that failed validation renders as "unavailable".
fn render<T: Serialize>(content: Degraded<T>) -> Result<Value, ClientError> {
    match content {
        Degraded::Ready(value) => Ok(serde_json::to_value(value)?),
        Degraded::Unavailable(reason) => {
            warn!("Content unavailable: {}", reason);
            Ok(json!({ "unavailable": reason }))
        }
    }
}

async fn read_upload(path: &Path) -> Result<UploadFile, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadFile::new(name, bytes))
}
