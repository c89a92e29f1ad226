// paths.rs — Mapping between session-root-relative and absolute store paths.
//
// The session root is a plain string prefix over the guest store's flat,
// `/`-separated namespace. An empty root means the store root itself, so
// both mappings collapse to the identity. A non-empty root scopes every
// path under `root + "/"`; anything outside that prefix is not part of the
// session and is reported as out of scope (`None`).

/// Strip the session-root prefix from an absolute store path.
///
/// Returns `None` when the path does not fall under the root — callers
/// treat that as "not this session's file" and drop the event. The path
/// equal to the root itself is also out of scope: the root directory is
/// structural, not a session file.
pub fn to_relative<'a>(absolute: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(absolute);
    }
    absolute.strip_prefix(root)?.strip_prefix('/')
}

/// Prefix a session-root-relative path into an absolute store path.
///
/// Exact inverse of [`to_relative`] for any path under the root.
pub fn to_absolute(relative: &str, root: &str) -> String {
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root, relative)
    }
}

/// Final segment of a `/`-separated path (the entry name).
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the final segment, or `None` for a single-segment path.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Ordered ancestor chain of a directory path, root first, leaf last.
///
/// `"a/b/c"` yields `"a"`, `"a/b"`, `"a/b/c"`. Used by directory
/// materialization, which must create missing ancestors top-down.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
}
