use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wizard_client::action::Notice;
use wizard_client::backend::{GenerateResponse, HttpBackend, UploadFile};
use wizard_client::config::Config;
use wizard_client::guard::GuardDecision;
use wizard_client::messages::Language;
use wizard_client::models::{DocTag, DraftEdit, Step};
use wizard_client::storage::FileStore;
use wizard_client::view::{FileSelection, WizardView};
use wizard_client::{ClientError, ClientOptions, WizardClient};

/// Drives an application wizard session from the command line.
///
/// Every invocation is one page load: the local record is restored, the
/// session validated, the command run, and the resulting view printed as
/// JSON on stdout.
#[derive(Parser)]
#[command(name = "wizard", version)]
struct Cli {
    /// Backend base URL; overrides WIZARD_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory of the local state record; overrides WIZARD_STATE_DIR.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Wizard page being loaded.
    #[arg(long, global = true, default_value = "start")]
    page: Step,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current view.
    Status,
    /// Start a session from the saved draft.
    Start,
    /// Edit intake and theme fields, then sync.
    Intake {
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        job_ad: Option<String>,
        /// Read the job ad from a file.
        #[arg(long, conflicts_with = "job_ad")]
        job_ad_file: Option<PathBuf>,
        #[arg(long)]
        consent: Option<bool>,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        primary: Option<String>,
        #[arg(long)]
        accent: Option<String>,
    },
    /// Switch the UI language (en or de).
    Language { language: String },
    /// Upload documents. Tags apply to files in order.
    Upload {
        files: Vec<PathBuf>,
        #[arg(long = "tag")]
        tags: Vec<DocTag>,
    },
    /// Upload an application photo.
    Photo { file: PathBuf },
    /// Run extraction, optionally overriding document tags (doc_id=tag).
    Extract {
        #[arg(long = "tag", value_parser = parse_tag_override)]
        overrides: Vec<(String, DocTag)>,
    },
    /// Save answers (question_id=value).
    Answer {
        #[arg(value_parser = parse_answer)]
        answers: Vec<(String, String)>,
    },
    /// Generate the application documents.
    Generate,
    /// Delete the session and wipe local state.
    Clear,
    /// Re-fetch the session state.
    Refresh,
}

#[derive(Serialize)]
struct Output {
    view: WizardView,
    notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated: Option<GenerateResponse>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(cli.api_url.clone(), cli.state_dir.clone())?;

    // stdout carries the JSON view
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("wizard_client={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let backend = Arc::new(HttpBackend::new(config.api_url.clone()).context("Failed to build HTTP client")?);
    let store = Arc::new(FileStore::new(&config.state_dir).with_context(|| {
        format!("Failed to open state directory {}", config.state_dir.display())
    })?);

    let client = WizardClient::new(
        backend,
        store,
        ClientOptions {
            page: cli.page,
            debounce: config.debounce,
        },
    );

    if let GuardDecision::Redirect(target) = client.init().await {
        info!("Page {} is not available yet; continue on {}", cli.page.as_str(), target.as_str());
    }

    let outcome = run(&client, cli.command).await;
    client.flush().await;

    let output = Output {
        view: client.view(),
        notice: client.notice(),
        generated: outcome.as_ref().ok().cloned().flatten(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    outcome.map(|_| ()).map_err(Into::into)
}

async fn run(client: &WizardClient, command: Command) -> Result<Option<GenerateResponse>, ClientError> {
    match command {
        Command::Status => {}
        Command::Start => {
            client.start_session().await?;
        }
        Command::Intake {
            company,
            position,
            job_ad,
            job_ad_file,
            consent,
            template,
            primary,
            accent,
        } => {
            let job_ad = match job_ad_file {
                Some(path) => Some(std::fs::read_to_string(path)?),
                None => job_ad,
            };
            let edits = [
                company.map(DraftEdit::Company),
                position.map(DraftEdit::Position),
                job_ad.map(DraftEdit::JobAd),
                consent.map(DraftEdit::Consent),
                template.map(DraftEdit::Template),
                primary.map(DraftEdit::PrimaryColor),
                accent.map(DraftEdit::AccentColor),
            ];
            for edit in edits.into_iter().flatten() {
                client.edit(edit);
            }
        }
        Command::Language { language } => {
            client.change_language(Language::parse(&language)).await?;
        }
        Command::Upload { files, tags } => {
            let uploads = files
                .iter()
                .enumerate()
                .map(|(i, path)| read_upload(path, tags.get(i).copied()))
                .collect::<Result<Vec<_>, _>>()?;
            client.set_file_selection(FileSelection {
                documents: uploads.len(),
                photo: false,
            });
            client.upload_documents(uploads).await?;
        }
        Command::Photo { file } => {
            let upload = read_upload(&file, None)?;
            client.set_file_selection(FileSelection {
                documents: 0,
                photo: true,
            });
            client.upload_photo(Some(upload)).await?;
        }
        Command::Extract { overrides } => {
            client.extract(overrides.into_iter().collect()).await?;
        }
        Command::Answer { answers } => {
            client.save_answers(answers.into_iter().collect::<BTreeMap<_, _>>()).await?;
        }
        Command::Generate => return client.generate().await.map(Some),
        Command::Clear => client.clear_session().await?,
        Command::Refresh => client.refresh_session().await?,
    }
    Ok(None)
}

fn read_upload(path: &Path, tag: Option<DocTag>) -> Result<UploadFile, ClientError> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(UploadFile {
        mime: guess_mime(&filename).map(str::to_string),
        filename,
        bytes,
        tag,
    })
}

fn guess_mime(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn parse_tag_override(raw: &str) -> Result<(String, DocTag), String> {
    let (doc_id, tag) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected doc_id=tag, got '{raw}'"))?;
    Ok((doc_id.trim().to_string(), tag.parse()?))
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected question_id=value, got '{raw}'"))?;
    Ok((id.trim().to_string(), value.to_string()))
}
