use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::models::{Movie, Payload};
use crate::plex::{PlexApi, PlexClient};
use crate::session::{session_id, SessionStore};
use crate::storage::{is_valid_machine_identifier, SnapshotStore};
use crate::validate::{validate_library_selection, validate_search, MovieListForm, PlexSearchForm};
use crate::views;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, Form, FormRejection};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 64 * 1024; // forms are tiny

#[derive(Clone)]
pub struct AppState {
    pub plex: Arc<dyn PlexApi>,
    pub store: SnapshotStore,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(plex: Arc<dyn PlexApi>, store: SnapshotStore) -> Self {
        Self {
            plex,
            store,
            sessions: SessionStore::new(),
        }
    }
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let plex: Arc<dyn PlexApi> = Arc::new(PlexClient::new(settings.plex_timeout)?);
    let store = SnapshotStore::new(&settings.storage_folder);

    let properties = store.read_properties().await;
    info!(
        "Using storage folder {} ({} known Plex servers)",
        store.root().display(),
        properties.plex_servers.len()
    );

    let app = build_router(AppState::new(plex, store));

    info!("Listening on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/plexLibraries",
            get(get_plex_libraries).post(post_plex_libraries),
        )
        .route(
            "/plexMovieList",
            get(get_plex_movie_list).post(post_plex_movie_list),
        )
        .route("/rss/:machine_identifier/:library_key", get(get_rss))
        .route(
            "/recommended/:machine_identifier/:library_key",
            get(get_recommended),
        )
        .route("/owned/:machine_identifier/:library_key", get(get_owned))
        .route("/nuke", put(nuke))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn get_plex_libraries(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Html<String>) {
    info!("get_plex_libraries()");
    let (jar, id) = session_id(jar);
    let search = state.sessions.snapshot(id).await;
    (jar, Html(views::plex_libraries(&search)))
}

async fn post_plex_libraries(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<PlexSearchForm>, FormRejection>,
) -> (CookieJar, AppResult<Html<String>>) {
    let (jar, id) = session_id(jar);
    (jar, submit_plex_libraries(&state, id, form).await)
}

async fn submit_plex_libraries(
    state: &AppState,
    id: Uuid,
    form: Result<Form<PlexSearchForm>, FormRejection>,
) -> AppResult<Html<String>> {
    let Form(mut form) = form.map_err(form_error)?;
    keep_stored_token(state, id, &mut form.plex_token).await;
    info!(
        "post_plex_libraries(address={}, port={})",
        form.address, form.port
    );
    let connection = validate_search(&form).map_err(AppError::Validation)?;

    let search = state
        .sessions
        .update(id, |search| {
            connection.apply(search);
            search.clone()
        })
        .await;

    let server = state.plex.query_server(&search).await?;
    let discovered = server.libraries.clone();
    let search = state
        .sessions
        .update(id, |search| {
            search.append_libraries(discovered);
            search.clone()
        })
        .await;
    info!(
        "Session {} now has {} libraries",
        id,
        search.libraries.len()
    );

    let movie_db_api_key = search.movie_db_api_key.clone();
    state
        .store
        .update_properties(|properties| {
            if !movie_db_api_key.is_empty() {
                properties.movie_db_api_key = movie_db_api_key;
            }
            properties.upsert_server(server);
        })
        .await;

    Ok(Html(views::plex_libraries(&search)))
}

fn form_error(rejection: FormRejection) -> AppError {
    let message = rejection.to_string();
    if rejection.into_response().status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(
            "Rejecting form: body larger than {} bytes",
            MAX_BODY_BYTES
        );
        AppError::TooLarge(message)
    } else {
        AppError::Binding(message)
    }
}

/// Pages never render the token, so a blank field means "keep the stored one".
async fn keep_stored_token(state: &AppState, id: Uuid, plex_token: &mut String) {
    if plex_token.trim().is_empty() {
        *plex_token = state.sessions.snapshot(id).await.plex_token;
    }
}

async fn get_plex_movie_list(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Html<String>) {
    info!("get_plex_movie_list()");
    let (jar, id) = session_id(jar);
    let search = state.sessions.snapshot(id).await;
    (jar, Html(views::plex_movie_list(&search)))
}

async fn post_plex_movie_list(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<MovieListForm>, FormRejection>,
) -> (CookieJar, AppResult<Html<String>>) {
    let (jar, id) = session_id(jar);
    (jar, submit_plex_movie_list(&state, id, form).await)
}

async fn submit_plex_movie_list(
    state: &AppState,
    id: Uuid,
    form: Result<Form<MovieListForm>, FormRejection>,
) -> AppResult<Html<String>> {
    let Form(mut form) = form.map_err(form_error)?;
    keep_stored_token(state, id, &mut form.plex_token).await;
    info!(
        "post_plex_movie_list(address={}, libraries={:?})",
        form.address, form.selected_libraries
    );
    let (connection, keys) = validate_library_selection(&form).map_err(AppError::Validation)?;

    let search = state
        .sessions
        .update(id, |search| {
            search.update_library_selections(&keys);
            connection.apply(search);
            search.clone()
        })
        .await;

    let unknown: Vec<u32> = keys
        .iter()
        .copied()
        .filter(|key| !search.libraries.iter().any(|l| l.key == *key))
        .collect();
    if !unknown.is_empty() {
        warn!("Selected libraries {:?} are not known to this session", unknown);
    }

    Ok(Html(views::plex_movie_list(&search)))
}

async fn get_rss(
    State(state): State<AppState>,
    Path((machine_identifier, library_key)): Path<(String, u32)>,
) -> Response {
    if !is_valid_machine_identifier(&machine_identifier) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let mut body = String::new();
    if state
        .store
        .rss_file_exists(&machine_identifier, library_key)
        .await
    {
        body = state
            .store
            .read_rss_file(&machine_identifier, library_key)
            .await;
    } else {
        warn!(
            "No RSS feed for {}/{}, run a search first",
            machine_identifier, library_key
        );
    }
    if body.trim().is_empty() {
        body = "[]".to_string();
    }
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn get_recommended(
    State(state): State<AppState>,
    Path((machine_identifier, library_key)): Path<(String, u32)>,
) -> Result<Json<Vec<Movie>>, StatusCode> {
    if !is_valid_machine_identifier(&machine_identifier) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(
        state
            .store
            .read_recommended_movies(&machine_identifier, library_key)
            .await,
    ))
}

async fn get_owned(
    State(state): State<AppState>,
    Path((machine_identifier, library_key)): Path<(String, u32)>,
) -> Result<Json<Vec<Movie>>, StatusCode> {
    if !is_valid_machine_identifier(&machine_identifier) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(
        state
            .store
            .read_owned_movies(&machine_identifier, library_key)
            .await,
    ))
}

async fn nuke(State(state): State<AppState>) -> (StatusCode, Json<Payload>) {
    let payload = state.store.nuke().await;
    let status = if payload == Payload::NUKE_SUCCESSFUL {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(payload))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
