//! History path helpers
//!
//! Paths are `/`-separated segments rooted at `root`, e.g. `root/.data/3/x`.

/// Append one segment to a path
pub fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", base, segment)
    }
}

/// Resolve a path expression against `base`
///
/// - `/a/b` is absolute and resolves to `a/b`
/// - each leading `../` drops the last segment of `base`
/// - `./` is ignored
/// - anything else is appended to what is left of `base`
///
/// Returns `None` when `..` would pop the root segment itself.
pub fn resolve_relative(expr: &str, base: &str) -> Option<String> {
    if let Some(absolute) = expr.strip_prefix('/') {
        let trimmed = absolute.trim_end_matches('/');
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    let mut rest = Vec::new();
    for part in expr.split('/') {
        match part {
            "" | "." => {}
            ".." if rest.is_empty() => {
                if segments.len() <= 1 {
                    return None;
                }
                segments.pop();
            }
            ".." => {
                rest.pop();
            }
            name => rest.push(name),
        }
    }

    segments.extend(rest);
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Final segment of a path
pub fn leaf(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True if `path` is `prefix` or lies beneath it
pub fn is_within(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute() {
        assert_eq!(resolve_relative("/root/a", "root/x/y").as_deref(), Some("root/a"));
        assert_eq!(resolve_relative("/", "root"), None);
    }

    #[test]
    fn test_ascent() {
        let base = "root/player/inventory";
        assert_eq!(
            resolve_relative("../count", base).as_deref(),
            Some("root/player/count")
        );
        assert_eq!(
            resolve_relative("../../score", base).as_deref(),
            Some("root/score")
        );
        assert_eq!(resolve_relative("./len", base).as_deref(), Some("root/player/inventory/len"));
        assert_eq!(resolve_relative("..", base).as_deref(), Some("root/player"));
    }

    #[test]
    fn test_ascent_past_root_fails() {
        assert_eq!(resolve_relative("../x", "root/a").as_deref(), Some("root/x"));
        assert_eq!(resolve_relative("../../x", "root/a"), None);
        assert_eq!(resolve_relative("../../../x", "root/a"), None);
        assert_eq!(resolve_relative("../..", "root/a"), None);
        assert_eq!(resolve_relative("..", "root"), None);
    }

    #[test]
    fn test_join_leaf_within() {
        assert_eq!(join("root", "x"), "root/x");
        assert_eq!(join("", "root"), "root");
        assert_eq!(leaf("root/a/b"), "b");
        assert_eq!(leaf("root"), "root");
        assert!(is_within("root/a/b", "root/a"));
        assert!(is_within("root/a", "root/a"));
        assert!(!is_within("root/ab", "root/a"));
    }
}
