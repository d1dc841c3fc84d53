use std::sync::Arc;

use axum::{routing::get, routing::post, Router};

use crate::store::Storage;
use crate::valuation::ValuationModel;

mod dashboard;
pub mod error;
mod properties;
mod proposals;
mod reports;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub valuation: Arc<ValuationModel>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            valuation: Arc::new(ValuationModel::new()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello, Tokenized Property DAO!" }))
        .route(
            "/api/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route("/api/properties/:id", get(properties::get_property))
        .route(
            "/api/voting-proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route("/api/voting-proposals/:id", get(proposals::get_proposal))
        .route("/api/voting-proposals/:id/vote", post(proposals::cast_vote))
        .route("/api/voting-proposals/:id/user-vote", get(proposals::user_vote))
        .route(
            "/api/valuation-reports",
            get(reports::list_reports).post(reports::generate_report),
        )
        .route("/api/dashboard/stats", get(dashboard::stats))
        .with_state(state)
}
