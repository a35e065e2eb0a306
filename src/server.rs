use crate::config::AppConfig;
use crate::members::{MemberError, MemberStore, SignupForm, DUPLICATE_EMAIL};
use crate::pages::{self, Page, PageModel};
use crate::render::{self, LinkStyle, DOWNLOAD_FILE_NAME};
use crate::{data, fallback};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub struct AppState {
    pub config: AppConfig,
    pub members: MemberStore,
}

/// Handler failure: logged, then reported to the browser as a bare status.
pub struct AppError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let data_dir = ServeDir::new(state.config.data.root.join("data"));
    let assets_dir = ServeDir::new(state.config.data.assets_path());

    Router::new()
        .route("/", get(index_handler))
        .route("/join", get(join_form).post(join_submit))
        .route("/join/success", get(join_success))
        .route("/members", get(members_page))
        .route("/api/members", get(api_members))
        .route("/api/pages/{slug}", get(api_page))
        .route(&format!("/download/{DOWNLOAD_FILE_NAME}"), get(download_dataset))
        .route("/{name}", get(page_handler))
        .nest_service("/data", data_dir)
        .nest_service("/assets", assets_dir)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let members = MemberStore::connect(&config.database.url).await?;
    let addr = SocketAddr::from((config.server.host, config.server.port));

    let state = Arc::new(AppState { config, members });
    let app = router(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn render_page(page: &Page, config: &AppConfig) -> Result<Html<String>, AppError> {
    let model = pages::bootstrap(page, config).await;
    Ok(Html(render::page_html(page, &model, LinkStyle::Served)?.into_string()))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let index = Page::find("index").ok_or_else(|| anyhow::anyhow!("index page missing"))?;
    Ok(render_page(index, &state.config).await?.into_response())
}

/// Clean page paths plus the legacy `<name>.html` spellings.
async fn page_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    match name.as_str() {
        "join.html" => return Ok(join_form().await.into_response()),
        "join-success.html" => return Ok(join_success().await.into_response()),
        "members.html" => return members_page(State(state)).await.map(IntoResponse::into_response),
        _ => {}
    }

    match Page::find(&name).or_else(|| Page::from_legacy(&name)) {
        Some(page) => Ok(render_page(page, &state.config).await?.into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn api_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PageModel>, StatusCode> {
    let page = Page::find(&slug).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(pages::bootstrap(page, &state.config).await))
}

async fn join_form() -> Html<String> {
    Html(render::join_html(&SignupForm::default(), &[]).into_string())
}

async fn join_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    match state.members.register(&form).await {
        Ok(_) => Ok(Redirect::to("/join/success").into_response()),
        Err(MemberError::Invalid(messages)) => {
            Ok(Html(render::join_html(&form, &messages).into_string()).into_response())
        }
        Err(MemberError::DuplicateEmail) => {
            Ok(Html(render::join_html(&form, &[DUPLICATE_EMAIL.to_string()]).into_string()).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn join_success() -> Html<String> {
    Html(render::join_success_html().into_string())
}

async fn members_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let members = state.members.list().await?;
    Ok(Html(render::members_html(&members).into_string()))
}

async fn api_members(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let members = state.members.list().await?;
    Ok(Json(json!({ "data": members })))
}

async fn download_dataset(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let dataset = data::load_or(&state.config.data.sample_data_path(), fallback::sample_data()).await;
    let body = render::dataset_download(&dataset)?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}
