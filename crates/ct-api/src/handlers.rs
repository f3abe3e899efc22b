//! # ct-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the reconciler.
//! Every edit goes through `Reconciler::mutate`, which persists it and
//! requests a debounced upload.

use std::sync::{Arc, Mutex, PoisonError};

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use askama::Template;
use ct_core::drag::{DragSession, DragSource};
use ct_core::error::AppError;
use ct_core::models::{gid, Block, Layout, Link, LinkStyle, MenuItem, ThemeSolution};
use ct_core::mutation::Mutation;
use ct_core::reconcile::{PullOutcome, Reconciler, SkipReason};
use ct_core::sync::NoticeBoard;
use ct_core::traits::{RemoteDocumentClient, SettingsStore};
use ct_core::transfer::EXPORT_FILE_NAME;
use ct_ui::DashboardTemplate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiResult;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
    pub store: Arc<dyn SettingsStore>,
    pub remote: Arc<dyn RemoteDocumentClient>,
    pub notices: Arc<NoticeBoard>,
    pub drag: Mutex<DragSession>,
}

impl AppState {
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<dyn SettingsStore>,
        remote: Arc<dyn RemoteDocumentClient>,
        notices: Arc<NoticeBoard>,
    ) -> Self {
        Self {
            reconciler,
            store,
            remote,
            notices,
            drag: Mutex::new(DragSession::new()),
        }
    }

    /// Applies `mutation` and answers with the resulting document. Ignored
    /// or no-op edits answer with the unchanged current document.
    async fn apply(&self, mutation: Mutation) -> ApiResult<HttpResponse> {
        let next = match self.reconciler.mutate(mutation).await? {
            Some(next) => Some(next),
            None => self.reconciler.current().await,
        };
        Ok(HttpResponse::Ok().json(next))
    }
}

// ── Page ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub edit: Option<String>,
}

/// Renders the dashboard. `?edit=1` switches on the editing controls.
///
/// Each render reopens the startup grace window, so the grid's first layout
/// report after mounting is not taken as a user edit.
pub async fn dashboard(
    data: web::Data<AppState>,
    query: web::Query<DashboardQuery>,
) -> ApiResult<HttpResponse> {
    let edit = matches!(query.edit.as_deref(), Some("1" | "true"));
    data.reconciler.restart_startup_grace();
    let setting = data.reconciler.current().await;
    let html = DashboardTemplate::new(setting.as_ref(), edit).render()?;
    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

// ── Settings document ────────────────────────────────────────

pub async fn get_settings(data: web::Data<AppState>) -> HttpResponse {
    match data.reconciler.current().await {
        Some(setting) => HttpResponse::Ok().json(setting),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Downloads the document as `candi-tab-settings.json`.
pub async fn export_settings(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let exported = data
        .reconciler
        .export_json()
        .await?
        .ok_or_else(|| AppError::NotFound("settings".into(), "local".into()))?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(EXPORT_FILE_NAME.to_string())],
        })
        .body(exported))
}

/// Replaces the document with the uploaded one. A body that is not a
/// settings document changes nothing and answers 204.
pub async fn import_settings(data: web::Data<AppState>, body: String) -> ApiResult<HttpResponse> {
    match data.reconciler.import_json(&body).await? {
        Some(setting) => Ok(HttpResponse::Ok().json(setting)),
        None => {
            debug!(bytes = body.len(), "ignored malformed import");
            Ok(HttpResponse::NoContent().finish())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ThemeRequest {
    pub solution: ThemeSolution,
}

pub async fn set_theme(
    data: web::Data<AppState>,
    body: web::Json<ThemeRequest>,
) -> ApiResult<HttpResponse> {
    data.apply(Mutation::SetTheme(body.solution)).await
}

// ── Blocks ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub title: String,
}

async fn add_block_at(
    data: &AppState,
    anchor: Option<String>,
    title: String,
) -> ApiResult<HttpResponse> {
    // placement is computed against the locked document
    let block = Block::new(gid(), title, Layout::default());
    info!(block_id = %block.id, anchor = ?anchor, "adding block");
    data.apply(Mutation::AddBlock { block, anchor }).await
}

/// Adds the first block, or appends one in the left column.
pub async fn add_block(
    data: web::Data<AppState>,
    body: Option<web::Json<BlockRequest>>,
) -> ApiResult<HttpResponse> {
    let title = body.map(|b| b.into_inner().title).unwrap_or_default();
    add_block_at(&data, None, title).await
}

/// Adds a block in the anchor block's column, below it.
pub async fn add_block_after(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<BlockRequest>>,
) -> ApiResult<HttpResponse> {
    let anchor = path.into_inner();
    let title = body.map(|b| b.into_inner().title).unwrap_or_default();
    add_block_at(&data, Some(anchor), title).await
}

pub async fn update_block(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<BlockRequest>,
) -> ApiResult<HttpResponse> {
    data.apply(Mutation::UpdateBlock {
        block_id: path.into_inner(),
        title: body.into_inner().title,
    })
    .await
}

pub async fn delete_block(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    data.apply(Mutation::DeleteBlock {
        block_id: path.into_inner(),
    })
    .await
}

// ── Links ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MenuItemRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    /// Insert after this link; append when absent.
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub style: Option<LinkStyle>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub menu: Option<Vec<MenuItemRequest>>,
}

impl LinkRequest {
    fn into_link(self, id: String) -> Link {
        Link {
            id,
            title: self.title,
            url: self.url,
            style: self.style.unwrap_or_default(),
            description: self.description.filter(|d| !d.is_empty()),
            menu: self.menu.map(|items| {
                items
                    .into_iter()
                    .map(|item| MenuItem {
                        id: item.id.unwrap_or_else(gid),
                        title: item.title,
                        url: item.url,
                    })
                    .collect()
            }),
        }
    }
}

pub async fn insert_link(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<LinkRequest>,
) -> ApiResult<HttpResponse> {
    let mut request = body.into_inner();
    let after = request.after.take();
    data.apply(Mutation::InsertLink {
        block_id: path.into_inner(),
        after,
        link: request.into_link(gid()),
    })
    .await
}

pub async fn update_link(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<LinkRequest>,
) -> ApiResult<HttpResponse> {
    let (block_id, link_id) = path.into_inner();
    data.apply(Mutation::UpdateLink {
        block_id,
        link: body.into_inner().into_link(link_id),
    })
    .await
}

pub async fn delete_link(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (block_id, link_id) = path.into_inner();
    data.apply(Mutation::DeleteLink { block_id, link_id }).await
}

// ── Grid layout and drag ─────────────────────────────────────

/// Layout reported by the grid engine after a resize, move or initial fit.
pub async fn apply_layout(
    data: web::Data<AppState>,
    body: web::Json<Vec<Layout>>,
) -> ApiResult<HttpResponse> {
    data.apply(Mutation::ApplyLayout(body.into_inner())).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragStartRequest {
    pub block_id: String,
    pub link_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragDropRequest {
    pub block_id: String,
    #[serde(default)]
    pub index: usize,
}

pub async fn drag_start(
    data: web::Data<AppState>,
    body: web::Json<DragStartRequest>,
) -> HttpResponse {
    let body = body.into_inner();
    data.drag
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .start(DragSource {
            block_id: body.block_id,
            link_id: body.link_id,
        });
    HttpResponse::NoContent().finish()
}

/// Ends the drag. The session is cleared before the move is applied, so a
/// failed move does not leave a stale source behind.
pub async fn drag_drop(
    data: web::Data<AppState>,
    body: web::Json<DragDropRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let mutation = data
        .drag
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drop_onto(body.block_id, body.index);

    match mutation {
        Some(mutation) => data.apply(mutation).await,
        None => {
            debug!("drop without an active drag");
            Ok(HttpResponse::NoContent().finish())
        }
    }
}

// ── Sync ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// New credential; an empty string removes the stored one.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Gist to link; an empty string unlinks.
    #[serde(default)]
    pub gist_id: Option<String>,
    /// Create a gist when none is linked.
    #[serde(default)]
    pub create: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    pub gist_id: Option<String>,
    pub remote_created_at: Option<i64>,
}

async fn sync_status(data: &AppState) -> SyncStatus {
    SyncStatus {
        enabled: data.remote.is_enabled(),
        gist_id: data.reconciler.current().await.and_then(|s| s.gist_id),
        remote_created_at: data.reconciler.remote_snapshot().await.map(|r| r.created_at),
    }
}

/// Sets the credential and/or the linked gist.
pub async fn configure_sync(
    data: web::Data<AppState>,
    body: web::Json<SyncRequest>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();

    if let Some(token) = body.access_token {
        let token = Some(token)
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        data.store
            .save_access_token(token.clone())
            .await
            .map_err(|err| AppError::Storage(err.to_string()))?;
        data.remote.set_access_token(token);
    }

    if let Some(gist_id) = body.gist_id {
        let gist_id = Some(gist_id).filter(|id| !id.trim().is_empty());
        data.reconciler.link_remote(gist_id).await?;
    }

    if body.create {
        data.reconciler.create_remote(data.remote.as_ref()).await?;
    }

    Ok(HttpResponse::Ok().json(sync_status(&data).await))
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PullReport {
    RemoteAdopted { created_at: i64 },
    LocalKept,
    Unparseable,
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
}

impl From<PullOutcome> for PullReport {
    fn from(outcome: PullOutcome) -> Self {
        match outcome {
            PullOutcome::RemoteAdopted(setting) => PullReport::RemoteAdopted {
                created_at: setting.created_at,
            },
            PullOutcome::LocalKept => PullReport::LocalKept,
            PullOutcome::Unparseable => PullReport::Unparseable,
            PullOutcome::Skipped(reason) => PullReport::Skipped { reason },
        }
    }
}

/// Fetches the linked gist now and reconciles it with the local document.
pub async fn pull_remote(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let outcome = data.reconciler.pull(data.remote.as_ref()).await?;
    Ok(HttpResponse::Ok().json(PullReport::from(outcome)))
}

pub async fn sync_notices(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.notices.recent())
}

