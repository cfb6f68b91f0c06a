use crate::server::response::ApiError;

const MAX_ROLE_NAME_LEN: usize = 64;

fn is_valid_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ')
}

fn validate_name(name: &str, entity: &str, max_len: usize) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{entity} name cannot be empty"));
    }
    if name.chars().count() > max_len {
        return Err(format!("{entity} name cannot exceed {max_len} characters"));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(format!(
            "{entity} name can only contain letters, digits, spaces, hyphens, \
             underscores, and periods"
        ));
    }
    Ok(())
}

pub fn validate_role_name(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Role", MAX_ROLE_NAME_LEN).map_err(ApiError::bad_request)
}
