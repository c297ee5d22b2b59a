use axum::{
    Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use handlebars::Handlebars;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::draw::draw_winner;
use crate::loader::{self, ReadError, ReaderOptions};
use crate::saving::{FileSnapshot, SnapshotStorage};
use crate::session::{MemorySessionStore, Session, SessionStore};
use crate::store::{self, StoreError};

const INDEX_TEMPLATE: &str = "index";

/// Shared state handed to every handler
///
/// The session store and the snapshot storage are injected so tests (or a
/// multi-tenant deployment) can swap them out.
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub snapshot: Arc<dyn SnapshotStorage>,
    templates: Handlebars<'static>,
}

#[derive(Serialize)]
struct IndexPage {
    winner: Option<String>,
    messages: Vec<String>,
}

/// Reasons an upload is turned away before anything is stored
#[derive(Debug, Error)]
enum UploadError {
    #[error("no file submitted")]
    NoFileSubmitted,

    #[error("{0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

struct Upload {
    filename: String,
    bytes: Bytes,
}

impl AppState {
    pub fn new(
        config: Config,
        sessions: Arc<dyn SessionStore>,
        snapshot: Arc<dyn SnapshotStorage>,
    ) -> Result<Self, handlebars::TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_template_string(INDEX_TEMPLATE, include_str!("./static/index.html"))?;

        Ok(AppState {
            config,
            sessions,
            snapshot,
            templates,
        })
    }

    /// State with in-memory sessions and the snapshot file under `upload_dir`
    pub fn from_config(config: Config) -> Result<Self, handlebars::TemplateError> {
        let sessions = Arc::new(MemorySessionStore::new(config.session_lifetime));
        let snapshot = Arc::new(FileSnapshot::in_dir(&config.upload_dir));
        Self::new(config, sessions, snapshot)
    }

    fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            header_row: self.config.header_row,
        }
    }

    fn render_index(&self, winner: Option<String>, messages: Vec<String>) -> Response {
        let page = IndexPage { winner, messages };

        match self.templates.render(INDEX_TEMPLATE, &page) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Failed to render page: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
            }
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(show_form))
        .route("/upload", post(upload_and_draw))
        .route("/redraw", post(redraw))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Start the web server and serve until it fails
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr;
    info!(
        "Storing entries under {} with {}-day sessions",
        config.upload_dir.display(),
        config.session_lifetime.as_secs() / (24 * 60 * 60)
    );

    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Show the upload form and forget the session's entries
///
/// The snapshot is left alone, so a later re-draw can still use it.
async fn show_form(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut session = Session::resume(&jar, state.sessions.as_ref());
    session.data.entries = None;

    let messages = session.data.take_flashes();
    let page = state.render_index(None, messages);

    let jar = session.commit(state.sessions.as_ref(), jar, &state.config);
    (jar, page).into_response()
}

/// Read the uploaded sheet, remember its entries and draw a winner
///
/// Rejected uploads are flashed and redirected back to the form.
async fn upload_and_draw(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut session = Session::resume(&jar, state.sessions.as_ref());

    let entries = match receive_upload(multipart).await {
        Ok(upload) => {
            let entries = loader::read_entries(&upload.filename, &upload.bytes, &state.reader_options());
            if let Ok(entries) = &entries {
                info!("Read {} entries from {}", entries.len(), upload.filename);
            }
            entries.map_err(UploadError::from)
        }
        Err(e) => Err(e),
    };

    let response = match entries {
        Ok(entries) => {
            if let Err(e) = store::save(&mut session.data, state.snapshot.as_ref(), entries) {
                warn!("Failed to save entries snapshot: {}", e);
                session.data.flash(save_warning(&e));
            }

            let winner = session
                .data
                .entries
                .as_deref()
                .and_then(draw_winner)
                .map(ToString::to_string);
            if let Some(winner) = &winner {
                info!("Drew {} from upload", winner);
            }

            let messages = session.data.take_flashes();
            state.render_index(winner, messages)
        }
        Err(e) => {
            warn!("Rejected upload: {}", e);
            session.data.flash(upload_message(&e));
            Redirect::to("/").into_response()
        }
    };

    let jar = session.commit(state.sessions.as_ref(), jar, &state.config);
    (jar, response).into_response()
}

/// Draw again from the session's entries, falling back to the snapshot
async fn redraw(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut session = Session::resume(&jar, state.sessions.as_ref());

    let outcome = store::load(&mut session.data, state.snapshot.as_ref())
        .map(|entries| (entries.len(), draw_winner(entries).map(ToString::to_string)));

    let winner = match outcome {
        Ok((count, winner)) => {
            if let Some(winner) = &winner {
                info!("Re-drew {} from {} entries", winner, count);
            }
            winner
        }
        Err(e) => {
            warn!("Re-draw failed: {}", e);
            session.data.flash(redraw_message(&e));
            None
        }
    };

    let messages = session.data.take_flashes();
    let page = state.render_index(winner, messages);

    let jar = session.commit(state.sessions.as_ref(), jar, &state.config);
    (jar, page).into_response()
}

/// Pull the `file` field out of the multipart body
async fn receive_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, UploadError> {
    // Not a multipart body at all
    let Ok(mut multipart) = multipart else {
        return Err(UploadError::NoFileSubmitted);
    };

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(UploadError::NoFileSubmitted);
        }

        let bytes = field.bytes().await?;
        return Ok(Upload { filename, bytes });
    }

    Err(UploadError::NoFileSubmitted)
}

fn upload_message(error: &UploadError) -> String {
    match error {
        UploadError::NoFileSubmitted => "No selected file".to_string(),
        UploadError::Multipart(e) => format!("An error occurred: {}", e),
        UploadError::Read(ReadError::InvalidFileType(_)) => {
            "Invalid file type. Please upload an .xlsx or .xls file.".to_string()
        }
        UploadError::Read(ReadError::EmptyFile) => "The Excel file is empty.".to_string(),
        UploadError::Read(ReadError::NoValidEntries) => {
            "No valid entries found in the first column.".to_string()
        }
        UploadError::Read(ReadError::Parse(e)) => format!("An error occurred: {}", e),
    }
}

fn redraw_message(error: &StoreError) -> String {
    match error {
        StoreError::NoEntries => {
            "No entries found for re-draw. Please upload an Excel file first.".to_string()
        }
        StoreError::EmptySnapshot => {
            "No valid entries found for re-draw. Please upload an Excel file first.".to_string()
        }
        StoreError::SaveFailed(_) => save_warning(error),
        StoreError::CorruptSnapshot(_) => {
            "Error reading saved entries file. Please upload an Excel file again.".to_string()
        }
        StoreError::LoadFailed(e) => format!(
            "An error occurred while loading entries: {}. Please upload an Excel file again.",
            e
        ),
    }
}

fn save_warning(error: &StoreError) -> String {
    format!("Entries could not be saved for later re-draws: {}", error)
}
