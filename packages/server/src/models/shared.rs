use crate::error::AppError;

/// Validate a trimmed title (1-256 Unicode characters).
pub fn validate_title(title: &str) -> Result<(), AppError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 256 {
        return Err(AppError::Validation(
            "Title must be 1-256 characters".into(),
        ));
    }
    Ok(())
}

/// Validate a client-supplied row id (must be positive).
pub fn validate_id(id: i32, name: &str) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::Validation(format!("{name} must be positive")));
    }
    Ok(())
}

/// Validate an ID list for bulk operations (non-empty, max length).
///
/// Repeated ids are allowed; bulk operations report them per item.
pub fn validate_bulk_ids(ids: &[i32], name: &str, max: usize) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }
    if ids.len() > max {
        return Err(AppError::Validation(format!("Too many {name}: max {max}")));
    }
    Ok(())
}
