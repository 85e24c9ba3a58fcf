//! Small helpers shared by the config, remote and repository layers.

/// Longest server response echoed back inside an error message.
const ERROR_SNIPPET_CHARS: usize = 180;

/// Trimmed value, or `None` when nothing but whitespace was given.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_owned())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Whether an endpoint override uses a scheme `reqwest` can talk to.
pub fn is_http_url(value: &str) -> bool {
    matches!(value.split_once("://"), Some(("http" | "https", rest)) if !rest.is_empty())
}

/// Single-line excerpt of a response body for error messages.
pub fn compact_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ERROR_SNIPPET_CHARS)
        .collect()
}

/// Wall-clock time as epoch milliseconds, the unit every stored timestamp uses.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lowercased address when it looks like `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    let (local, domain) = email.split_once('@')?;
    let (host, tld) = domain.rsplit_once('.')?;
    if local.is_empty() || host.is_empty() || tld.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}
