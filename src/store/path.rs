use crate::error::{Error, Result};

const MAX_SEGMENT_LEN: usize = 255;

/// Normalizes a client-supplied folder path to `/a/b` form.
///
/// An empty path or a bare `/` is the root. Relative segments (`.` and
/// `..`) are rejected rather than resolved.
pub fn normalize_path(path: &str) -> Result<String> {
    let path = path.trim();

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    for segment in &segments {
        validate_segment(segment)?;
    }

    Ok(format!("/{}", segments.join("/")))
}

/// Validates a single file or folder name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest("name cannot be empty".to_string()));
    }
    if name.contains('/') {
        return Err(Error::BadRequest("name cannot contain '/'".to_string()));
    }
    validate_segment(name)
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(Error::BadRequest(format!(
            "path segment cannot exceed {MAX_SEGMENT_LEN} characters"
        )));
    }

    if segment == "." || segment == ".." {
        return Err(Error::BadRequest(
            "path cannot contain relative segments".to_string(),
        ));
    }

    const INVALID_CHARS: &[char] = &['\0', '\n', '\r'];
    if segment.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(Error::BadRequest(
            "path segment contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Escapes `%`, `_` and `\` for use in a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_basic() {
        assert_eq!(normalize_path("docs").unwrap(), "/docs");
        assert_eq!(normalize_path("/docs").unwrap(), "/docs");
        assert_eq!(normalize_path("docs/").unwrap(), "/docs");
        assert_eq!(normalize_path("/docs/").unwrap(), "/docs");
    }

    #[test]
    fn test_normalize_path_nested() {
        assert_eq!(normalize_path("docs/reports").unwrap(), "/docs/reports");
        assert_eq!(
            normalize_path("//docs//reports//").unwrap(),
            "/docs/reports"
        );
    }

    #[test]
    fn test_normalize_path_root() {
        assert_eq!(normalize_path("").unwrap(), "/");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("  //  ").unwrap(), "/");
    }

    #[test]
    fn test_normalize_path_rejects_relative_segments() {
        assert!(normalize_path("docs/../secret").is_err());
        assert!(normalize_path("./docs").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rep"), "%rep%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
