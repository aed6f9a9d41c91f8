use axum::{routing::get, Router};

pub mod jobs;
pub mod shops;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/components", get(system::components))
        .nest("/shops", shops::router())
        .nest("/jobs", jobs::router())
}
