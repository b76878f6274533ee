//! Request path normalization.
//!
//! The upstream URL builder resolves `.`/`..` segments (including the
//! percent-encoded `%2e` spellings) and treats `\` as a separator. Paths are
//! normalized the same way before any filter sees them, so the permit-path
//! check, the route match and the forwarded URL all agree on one path.

use axum::http::{Uri, uri::PathAndQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(segment: &str) -> Option<DotSegment> {
    match segment.to_ascii_lowercase().replace("%2e", ".").as_str() {
        "." => Some(DotSegment::Current),
        ".." => Some(DotSegment::Parent),
        _ => None,
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\'])
}

/// True when `path` has a `.`/`..` segment in any spelling.
pub fn has_dot_segments(path: &str) -> bool {
    segments(path).any(|segment| dot_segment(segment).is_some())
}

/// True when `normalize_path` would change `path`.
pub fn needs_normalizing(path: &str) -> bool {
    path.contains('\\') || has_dot_segments(path)
}

/// Resolves dot segments against the root. `..` never climbs above `/`.
pub fn normalize_path(path: &str) -> String {
    if !needs_normalizing(path) {
        return path.to_string();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut ends_in_directory = false;

    // the first item is whatever precedes the leading '/'
    for segment in segments(path).skip(1) {
        ends_in_directory = false;
        match dot_segment(segment) {
            Some(DotSegment::Current) => ends_in_directory = true,
            Some(DotSegment::Parent) => {
                kept.pop();
                ends_in_directory = true;
            }
            None => kept.push(segment),
        }
    }

    let mut normalized = format!("/{}", kept.join("/"));
    if ends_in_directory && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// `uri` with its path normalized; the query is kept untouched.
pub fn normalize_uri(uri: Uri) -> Result<Uri, axum::http::Error> {
    if !needs_normalizing(uri.path()) {
        return Ok(uri);
    }

    let path = normalize_path(uri.path());
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = uri.into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        for path in ["/", "/orders/5", "/orders/", "/a//b", "/file.txt", "/.well-known/x", "/..x/y"] {
            assert!(!needs_normalizing(path), "{path}");
            assert_eq!(normalize_path(path), path);
        }
    }

    #[test]
    fn parent_segments_are_resolved_in_every_spelling() {
        for path in [
            "/actuator/../orders/5",
            "/actuator/%2e%2e/orders/5",
            "/actuator/%2E%2E/orders/5",
            "/actuator/.%2e/orders/5",
            "/actuator/%2e./orders/5",
            "/actuator\\..\\orders/5",
        ] {
            assert!(needs_normalizing(path), "{path}");
            assert_eq!(normalize_path(path), "/orders/5", "{path}");
        }
    }

    #[test]
    fn current_segments_and_root_overflow() {
        assert_eq!(normalize_path("/orders/./5"), "/orders/5");
        assert_eq!(normalize_path("/orders/5/."), "/orders/5/");
        assert_eq!(normalize_path("/orders/.."), "/");
        assert_eq!(normalize_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_path("/%2e"), "/");
    }

    #[test]
    fn uri_keeps_query_and_authority() {
        let uri: Uri = "/actuator/%2e%2e/orders/5?expand=items".parse().unwrap();
        assert_eq!(normalize_uri(uri).unwrap(), "/orders/5?expand=items");

        let uri: Uri = "http://gw.local/a/../b".parse().unwrap();
        let normalized = normalize_uri(uri).unwrap();
        assert_eq!(normalized.host(), Some("gw.local"));
        assert_eq!(normalized.path(), "/b");
    }
}
