use actix_web::{error, HttpRequest};

use crate::core::AppError;

/// Route extractor failures through `AppError` so every 4xx has the same
/// `{"error": {...}}` body.
pub fn query_error_handler(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected query string");
    AppError::validation(format!("Invalid query string: {}", err)).into()
}

pub fn path_error_handler(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(path = %req.path(), error = %err, "Rejected path parameter");
    AppError::validation(format!("Invalid path parameter: {}", err)).into()
}

/// Extractor configuration shared by the server and handler tests
pub fn extractor_config(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.app_data(actix_web::web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(actix_web::web::PathConfig::default().error_handler(path_error_handler));
}
