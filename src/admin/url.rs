// ABOUTME: Admin URL helpers: joining the admin route with view paths and matching route patterns
// ABOUTME: Patterns use `:name` segments to capture parameters

use regex::Regex;
use std::collections::BTreeMap;

/// Query parameters of an admin request
pub type SearchParams = BTreeMap<String, String>;

/// Join the admin route with a view path, collapsing a root admin route
pub fn format_admin_url(admin_route: &str, path: &str) -> String {
    let base = admin_route.trim_end_matches('/');
    if path.is_empty() {
        return if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        };
    }
    format!("{}{}", base, path)
}

/// The current admin route for a list of URL segments
pub fn current_route(admin_route: &str, segments: &[String]) -> String {
    let path = if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    };
    format_admin_url(admin_route, &path)
}

/// Split a request path into non-empty, percent-decoded segments.
/// A segment that does not decode to UTF-8 is kept as sent.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

/// Percent-encode each segment of a decoded route so it can travel in a URL
pub fn encode_path(route: &str) -> String {
    route
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode search params as a query string (without the leading `?`)
pub fn encode_query(params: &SearchParams) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Percent-encode a single query value
pub fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Match `route` against `pattern`, returning captured `:params` on success.
/// Non-exact patterns also match any deeper route.
pub fn match_route(pattern: &str, route: &str, exact: bool) -> Option<BTreeMap<String, String>> {
    let mut names = Vec::new();
    let mut source = String::from("^");
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        source.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            names.push(name.to_string());
            source.push_str("([^/]+)");
        } else {
            source.push_str(&regex::escape(segment));
        }
    }
    if exact {
        source.push_str("/?$");
    } else {
        source.push_str("(?:/.*)?$");
    }

    let re = Regex::new(&source).ok()?;
    let captures = re.captures(route)?;
    Some(
        names
            .into_iter()
            .enumerate()
            .filter_map(|(i, name)| captures.get(i + 1).map(|m| (name, m.as_str().to_string())))
            .collect(),
    )
}

/// Only same-site absolute paths are accepted as post-login redirect targets.
/// Browsers drop tabs and newlines from URLs, so any control or whitespace
/// character could turn `/\t/host` into a protocol-relative URL.
pub fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_control() || c.is_whitespace())
}
