use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_activities))
}

pub async fn list_activities(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ActivityListQuery>,
) -> axum::response::Response {
    let (filter, page) = match query.into_parts() {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    match services.list_activities(&filter, page).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::activity_to_json)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
