use axum::Router;

pub mod activities;
pub mod system;
pub mod tasks;

/// Router for the task and activity surfaces.
pub fn router() -> Router {
    Router::new()
        .nest("/tasks", tasks::router())
        .nest("/activities", activities::router())
}
