//! Upload validation for the orchestrator surface.

use crate::config::Settings;
use crate::error::ServiceError;

/// Validate content type and size of an uploaded file against the
/// configured allow-list and size limit.
pub fn validate_upload(
    content_type: Option<&str>,
    size: u64,
    settings: &Settings,
) -> Result<(), ServiceError> {
    match content_type {
        Some(ct) if settings.allowed_image_types.iter().any(|t| t == ct) => {}
        other => {
            return Err(ServiceError::BadRequest(format!(
                "Invalid file type: {}. Allowed: {}",
                other.unwrap_or("unknown"),
                settings.allowed_image_types.join(", ")
            )));
        }
    }
    if size > settings.max_upload_size_bytes() {
        return Err(ServiceError::BadRequest(format!(
            "File too large. Maximum: {}MB",
            settings.max_upload_size_mb
        )));
    }
    Ok(())
}
