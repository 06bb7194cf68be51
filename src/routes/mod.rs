pub mod auth;
pub mod billing;
pub mod errors;
pub mod generate;
pub mod health;
pub mod input;
pub mod org;
pub mod projects;
pub mod proposals;
pub mod stripe;
pub mod tenant;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// All `/api` routes. Per-IP rate limiting and CORS are layered on in `main`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/org/context", get(org::get_org_context))
        .route("/org/invite", post(org::invite_member))
        .route("/ai/generate", post(generate::generate_text))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/{project_id}",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/proposals", get(proposals::list_proposals))
        .route("/proposals/generate", post(proposals::generate_proposal))
        .route(
            "/proposals/{proposal_id}/publish",
            post(proposals::publish_proposal),
        )
        .route(
            "/proposals/{proposal_id}",
            get(proposals::get_proposal)
                .patch(proposals::update_proposal)
                .post(proposals::update_proposal)
                .delete(proposals::delete_proposal),
        )
        .route(
            "/public/proposals/{token}",
            get(proposals::get_public_proposal),
        )
        .route("/billing/checkout", post(billing::create_checkout_session))
        .route("/billing/portal", post(billing::create_portal_session))
        .route("/stripe/webhook", post(stripe::stripe_webhook));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
