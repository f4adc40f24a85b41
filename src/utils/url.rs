//! Endpoint URL construction for the chat backend.

/// Strip trailing slashes so endpoints can be appended with a single `/`.
///
/// # Examples
///
/// ```
/// use chatstream::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:5000/"), "http://localhost:5000");
/// assert_eq!(normalize_base_url("https://chat.example.org/app///"), "https://chat.example.org/app");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a backend base URL and an endpoint path.
///
/// # Examples
///
/// ```
/// use chatstream::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://127.0.0.1:5000/", "/api/chat"),
///     "http://127.0.0.1:5000/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:5000"), "http://localhost:5000");
        assert_eq!(normalize_base_url(" http://localhost:5000/ "), "http://localhost:5000");
        assert_eq!(normalize_base_url("///"), "");
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("http://localhost:5000", "api/models"),
            "http://localhost:5000/api/models"
        );
        assert_eq!(
            construct_api_url("https://chat.example.org/app/", "/api/prompts/concise"),
            "https://chat.example.org/app/api/prompts/concise"
        );
        assert_eq!(
            construct_api_url("http://localhost:5000///", "///api/chat"),
            "http://localhost:5000/api/chat"
        );
    }
}
