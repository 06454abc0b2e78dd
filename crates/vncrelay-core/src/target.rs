//! Session identifier extraction and dial target assembly.

use url::form_urlencoded;

/// Read the session identifier from a raw query string.
///
/// Form-urlencoded decoding applies (`%xx`, `+`). The first occurrence of
/// `param` wins; a missing parameter yields the empty string. No further
/// validation is done here.
pub fn session_id(raw_query: Option<&str>, param: &str) -> String {
    let Some(q) = raw_query else { return String::new(); };
    form_urlencoded::parse(q.as_bytes())
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Build the backend dial URL: `<resolved>?<raw query>`.
///
/// The inbound query string is passed through verbatim, including the
/// identifier parameter itself. No re-encoding or filtering happens.
pub fn dial_target(resolved: &str, raw_query: Option<&str>) -> String {
    let q = raw_query.unwrap_or("");
    let mut out = String::with_capacity(resolved.len() + 1 + q.len());
    out.push_str(resolved);
    out.push('?');
    out.push_str(q);
    out
}
