use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use taskboard_core::UserId;

use crate::app::errors;
use crate::context::CallerContext;

const USER_ID_HEADER: &str = "x-user-id";

/// Require a valid `x-user-id` header on mutating requests and stash the
/// actor in request extensions. Reads pass through untouched.
pub async fn require_caller(mut req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    if method == Method::POST || method == Method::PUT || method == Method::DELETE {
        let Some(header) = req.headers().get(USER_ID_HEADER) else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_user_id",
                "x-user-id header is required",
            );
        };
        let user_id = header
            .to_str()
            .ok()
            .and_then(|s| s.parse::<UserId>().ok());
        let Some(user_id) = user_id else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_user_id",
                "x-user-id must be a valid UUID",
            );
        };
        req.extensions_mut().insert(CallerContext::new(user_id));
    }
    next.run(req).await
}
