//! Utility functions for building URLs for fleet service requests
//! Supports both a full base URL and the host:port shorthand

use url::Url;

/// Build the service root from either base_url or host/port combination
///
/// If base_url is provided, it takes precedence and should include the protocol.
/// Otherwise, constructs the root from host and port using http and the `/api` prefix.
pub fn build_base_url(base_url: Option<&str>, host: &str, port: u16) -> String {
    if let Some(base) = base_url {
        base.trim_end_matches('/').to_string()
    } else if host.starts_with("http://") || host.starts_with("https://") {
        // Host already includes protocol, use as-is
        format!("{}/api", host.trim_end_matches('/'))
    } else {
        format!("http://{}:{}/api", host, port)
    }
}

/// Join an endpoint path onto the service root
pub fn build_api_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Attach the session id as the `session_id` query parameter
pub fn with_session(url: &str, session_id: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    parsed.query_pairs_mut().append_pair("session_id", session_id);
    Ok(parsed.into())
}

/// Path segment for a robot id, percent-encoded
pub fn robot_path(robot_id: &str, leaf: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(robot_id.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("/rover/{}/{}", encoded, leaf)
}
