//! # ct-api
//!
//! The web routing layer for candi-tab: the dashboard page and the JSON API
//! that edits and syncs the settings document.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures every route of the dashboard.
///
/// Literal segments (`/api/settings/export`) are registered before the
/// parameterized ones that could shadow them.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::dashboard)).service(
        web::scope("/api")
            .route("/settings", web::get().to(handlers::get_settings))
            .route("/settings/export", web::get().to(handlers::export_settings))
            .route("/settings/import", web::post().to(handlers::import_settings))
            .route("/theme", web::put().to(handlers::set_theme))
            .route("/blocks", web::post().to(handlers::add_block))
            .route("/blocks/{block_id}/after", web::post().to(handlers::add_block_after))
            .route("/blocks/{block_id}", web::patch().to(handlers::update_block))
            .route("/blocks/{block_id}", web::delete().to(handlers::delete_block))
            .route("/blocks/{block_id}/links", web::post().to(handlers::insert_link))
            .route(
                "/blocks/{block_id}/links/{link_id}",
                web::put().to(handlers::update_link),
            )
            .route(
                "/blocks/{block_id}/links/{link_id}",
                web::delete().to(handlers::delete_link),
            )
            .route("/layout", web::post().to(handlers::apply_layout))
            .route("/drag/start", web::post().to(handlers::drag_start))
            .route("/drag/drop", web::post().to(handlers::drag_drop))
            .route("/sync", web::put().to(handlers::configure_sync))
            .route("/sync/pull", web::post().to(handlers::pull_remote))
            .route("/sync/notices", web::get().to(handlers::sync_notices)),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App};
    use ct_core::models::Setting;
    use ct_core::reconcile::{Reconciler, ReconcilerOptions};
    use ct_core::store::MemorySettingsStore;
    use ct_core::sync::NoticeBoard;
    use ct_core::traits::{MockRemoteDocumentClient, OfflineRemote, RemoteDocumentClient, SettingsStore};
    use secrecy::ExposeSecret;
    use serde_json::{json, Value};

    use super::configure_routes;
    use crate::handlers::AppState;

    async fn state_with(
        remote: Arc<dyn RemoteDocumentClient>,
        startup_grace: Duration,
    ) -> web::Data<AppState> {
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
        let options = ReconcilerOptions {
            startup_grace,
            ..ReconcilerOptions::default()
        };
        let reconciler = Arc::new(Reconciler::bootstrap(Arc::clone(&store), options).await);
        web::Data::new(AppState::new(
            reconciler,
            store,
            remote,
            Arc::new(NoticeBoard::new()),
        ))
    }

    async fn offline_state() -> web::Data<AppState> {
        state_with(Arc::new(OfflineRemote), Duration::ZERO).await
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure_routes)).await
        };
    }

    #[actix_web::test]
    async fn test_first_run_dashboard() {
        let state = offline_state().await;
        let app = app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("Create first block"));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/settings").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_blocks_stack_in_anchor_column() {
        let state = offline_state().await;
        let app = app!(state);

        let first: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/blocks")
                .set_json(json!({ "title": "Work" }))
                .to_request(),
        )
        .await;
        let anchor = first.links[0].clone();
        assert_eq!((anchor.layout.x, anchor.layout.y, anchor.layout.w, anchor.layout.h), (0, 0, 2, 8));
        assert!(first.created_at > 0);

        let second: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/blocks/{}/after", anchor.id))
                .to_request(),
        )
        .await;
        assert_eq!(second.links.len(), 2);
        assert_eq!(second.links[1].layout.y, 8);
        assert!(second.created_at > first.created_at);

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/blocks/nope/after").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_link_lifecycle_and_errors() {
        let state = offline_state().await;
        let app = app!(state);

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/blocks").to_request(),
        )
        .await;
        let block_id = setting.links[0].id.clone();

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/blocks/{block_id}/links"))
                .set_json(json!({ "title": "Mail", "url": "https://mail.example.com", "style": "#123456" }))
                .to_request(),
        )
        .await;
        let link_id = setting.links[0].buttons[0].id.clone();

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri(&format!("/api/blocks/{block_id}/links/{link_id}"))
                .set_json(json!({ "title": "Inbox", "url": "https://mail.example.com" }))
                .to_request(),
        )
        .await;
        assert_eq!(setting.links[0].buttons[0].title, "Inbox");
        assert_eq!(setting.links[0].buttons[0].id, link_id);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/blocks/{block_id}/links/missing"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "link not found with ID missing");

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/blocks/{block_id}/links/{link_id}"))
                .to_request(),
        )
        .await;
        assert!(setting.links[0].buttons.is_empty());
    }

    #[actix_web::test]
    async fn test_export_and_import() {
        let state = offline_state().await;
        let app = app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/settings/export").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        state.reconciler.link_remote(Some("g-local".into())).await.unwrap();
        let before = state.reconciler.current().await.unwrap();

        // malformed import changes nothing
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/settings/import")
                .set_payload("{ not json")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.reconciler.current().await, Some(before));

        let imported: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/settings/import")
                .set_payload(
                    r#"{"gistId":"g-other","createdAt":1,"theme":{"solution":"dark"},
                        "links":[{"id":"b1","title":"Home","buttons":[],"layout":{"i":"x","x":0,"y":0,"w":2,"h":8}}]}"#,
                )
                .to_request(),
        )
        .await;
        assert_eq!(imported.gist_id.as_deref(), Some("g-local"));
        assert_eq!(imported.links[0].layout.i, "b1");
        assert!(imported.created_at > 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/settings/export").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(disposition.contains("candi-tab-settings.json"));
        let exported: Setting = test::read_body_json(resp).await;
        assert_eq!(exported, imported);
    }

    #[actix_web::test]
    async fn test_drag_moves_link_once() {
        let state = offline_state().await;
        let app = app!(state);

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/blocks").to_request(),
        )
        .await;
        let from = setting.links[0].id.clone();
        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/blocks/{from}/after"))
                .to_request(),
        )
        .await;
        let to = setting.links[1].id.clone();
        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/blocks/{from}/links"))
                .set_json(json!({ "title": "Docs", "url": "https://docs.example.com" }))
                .to_request(),
        )
        .await;
        let link = setting.links[0].buttons[0].id.clone();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/drag/start")
                .set_json(json!({ "blockId": from, "linkId": link }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let moved: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/drag/drop")
                .set_json(json!({ "blockId": to, "index": 5 }))
                .to_request(),
        )
        .await;
        assert!(moved.links[0].buttons.is_empty());
        assert_eq!(moved.links[1].buttons[0].id, link);

        // the source was consumed by the first drop
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/drag/drop")
                .set_json(json!({ "blockId": from, "index": 0 }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_layout_ignored_during_startup() {
        let state = state_with(Arc::new(OfflineRemote), Duration::from_secs(60)).await;
        let app = app!(state);

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/blocks").to_request(),
        )
        .await;
        let id = setting.links[0].id.clone();

        let after: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/layout")
                .set_json(json!([{ "i": id, "x": 4, "y": 0, "w": 2, "h": 8 }]))
                .to_request(),
        )
        .await;
        assert_eq!(after, setting);
    }

    #[actix_web::test]
    async fn test_page_load_reopens_layout_grace() {
        let state = state_with(Arc::new(OfflineRemote), Duration::from_millis(300)).await;
        let app = app!(state);

        let setting: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/blocks").to_request(),
        )
        .await;
        let id = setting.links[0].id.clone();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let after: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/layout")
                .set_json(json!([{ "i": id, "x": 4, "y": 0, "w": 2, "h": 8 }]))
                .to_request(),
        )
        .await;
        assert_eq!(after, setting);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let moved: Setting = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/layout")
                .set_json(json!([{ "i": id, "x": 4, "y": 0, "w": 2, "h": 8 }]))
                .to_request(),
        )
        .await;
        assert_eq!(moved.links[0].layout.x, 4);
    }

    #[actix_web::test]
    async fn test_configure_sync_stores_credential() {
        let mut remote = MockRemoteDocumentClient::new();
        remote
            .expect_set_access_token()
            .withf(|token| token.as_ref().map(|t| t.expose_secret().to_string()) == Some("ghp_abc".into()))
            .times(1)
            .return_const(());
        remote.expect_is_enabled().return_const(true);
        let state = state_with(Arc::new(remote), Duration::ZERO).await;
        let app = app!(state);

        let status: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri("/api/sync")
                .set_json(json!({ "accessToken": "ghp_abc", "gistId": "g1" }))
                .to_request(),
        )
        .await;

        assert_eq!(status["enabled"], true);
        assert_eq!(status["gistId"], "g1");
        let stored = state.store.load_access_token().await.unwrap();
        assert_eq!(stored.expose_secret(), "ghp_abc");
    }

    #[actix_web::test]
    async fn test_pull_reports_skip_reason() {
        let state = offline_state().await;
        let app = app!(state);

        let report: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/sync/pull").to_request(),
        )
        .await;
        assert_eq!(report, json!({ "outcome": "skipped", "reason": "not_linked" }));

        let notices: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/sync/notices").to_request(),
        )
        .await;
        assert_eq!(notices, json!([]));
    }
}
