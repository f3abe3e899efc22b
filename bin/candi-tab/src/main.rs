//! # candi-tab Binary
//!
//! The entry point that assembles the dashboard based on compile-time features.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use ct_api::handlers::AppState;
use ct_api::middleware::{cors_policy, standard_middleware};
use ct_config::AppConfig;
use ct_core::reconcile::{Reconciler, ReconcilerOptions};
use ct_core::sync::{spawn_initial_pull, SyncOrchestrator};
use ct_core::traits::{RemoteDocumentClient, SettingsStore};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Feature-gated imports
#[cfg(feature = "store-local")]
use ct_store_local::FileSettingsStore;

#[cfg(not(feature = "store-local"))]
use ct_core::store::MemorySettingsStore;

#[cfg(feature = "remote-gist")]
use ct_remote_gist::GistClient;

#[cfg(not(feature = "remote-gist"))]
use ct_core::traits::OfflineRemote;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let env_file = ct_config::load_env_file();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "candi_tab=info,ct_core=info,ct_api=info,actix_web=info".into()
        }))
        .with(fmt::layer())
        .init();

    if let Some(path) = &env_file {
        debug!(path = %path.display(), ".env loaded");
    }
    let config = AppConfig::load().context("loading configuration")?;

    // 1. Initialize Settings Store
    #[cfg(feature = "store-local")]
    let store: Arc<dyn SettingsStore> = Arc::new(
        FileSettingsStore::open(config.storage.data_dir.clone())
            .await
            .with_context(|| format!("opening data dir {}", config.storage.data_dir.display()))?,
    );

    #[cfg(not(feature = "store-local"))]
    let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());

    // 2. Initialize Remote Client (configured token wins over the stored one)
    #[cfg(feature = "remote-gist")]
    let remote: Arc<dyn RemoteDocumentClient> = {
        let token = match config.sync.access_token.clone() {
            Some(token) => Some(token),
            None => store.load_access_token().await,
        };
        Arc::new(GistClient::new(
            config.sync.api_base.clone(),
            token,
            config.sync.request_timeout(),
        )?)
    };

    #[cfg(not(feature = "remote-gist"))]
    let remote: Arc<dyn RemoteDocumentClient> = Arc::new(OfflineRemote);

    // 3. Load the document and start syncing
    let reconciler = Arc::new(
        Reconciler::bootstrap(
            Arc::clone(&store),
            ReconcilerOptions {
                startup_grace: config.sync.startup_grace(),
                file_name: config.sync.file_name.clone(),
                description: config.sync.description.clone(),
            },
        )
        .await,
    );
    let sync = SyncOrchestrator::new(
        Arc::clone(&reconciler),
        Arc::clone(&remote),
        config.sync.debounce(),
    )
    .spawn();
    spawn_initial_pull(Arc::clone(&reconciler), Arc::clone(&remote));

    // 4. Wrap in AppState
    let state = web::Data::new(AppState::new(
        reconciler,
        store,
        Arc::clone(&remote),
        sync.notices(),
    ));

    let (host, port) = config.bind_address();
    info!(
        sync_enabled = remote.is_enabled(),
        "candi-tab starting on http://{host}:{port}"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(standard_middleware())
            .wrap(cors_policy())
            .configure(ct_api::configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    sync.abort();
    Ok(())
}
