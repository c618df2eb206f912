//! Request deadline, reported through the regular error body

use axum::{error_handling::HandleErrorLayer, BoxError, Router};
use std::time::Duration;
use tower::{timeout::error::Elapsed, ServiceBuilder};

use crate::error::AppError;

/// Wrap `router` so requests running past `secs` fail with [`AppError::Timeout`]
pub fn apply(router: Router, secs: u64) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                to_app_error(err, secs)
            }))
            .timeout(Duration::from_secs(secs)),
    )
}

fn to_app_error(err: BoxError, secs: u64) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Timeout(secs)
    } else {
        AppError::Internal(format!("Unhandled middleware error: {}", err))
    }
}
