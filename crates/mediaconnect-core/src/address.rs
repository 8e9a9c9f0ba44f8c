use crate::error::ConnectError;
use regex::Regex;
use std::sync::LazyLock;

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("scheme regex is valid"));

/// Turn a typed server address into the ordered list of URLs to try.
///
/// An explicit `http://` or `https://` scheme is taken as-is. Without one the
/// secure scheme is listed first, then plain http.
pub fn normalize_address(address: &str) -> Result<Vec<String>, ConnectError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConnectError::InvalidArgument("address is empty".to_string()));
    }

    if SCHEME_RE.is_match(address) {
        return Ok(vec![address.to_string()]);
    }

    Ok(vec![
        format!("https://{}", address),
        format!("http://{}", address),
    ])
}
