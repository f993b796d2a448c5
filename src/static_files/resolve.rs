//! Request path to filesystem path resolution

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Map a URL path onto `root`
///
/// The path is percent-decoded and its `.`/`..` segments are collapsed
/// lexically against the root. Only then is the prefix checked, so
/// traversal sequences cannot slip past the guard. Nothing is read from the
/// filesystem here.
pub fn resolve_path(root: &Path, request_path: &str) -> Result<PathBuf> {
    let decoded = urlencoding::decode(request_path).map_err(|_| Error::Status {
        code: 400,
        message: "400 Bad Request".to_string(),
    })?;

    if decoded.contains('\0') {
        return Err(Error::TraversalDenied(request_path.to_string()));
    }

    let mut resolved = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                resolved.pop();
            }
            s if s.contains('\\') => {
                return Err(Error::TraversalDenied(request_path.to_string()));
            }
            s => resolved.push(s),
        }
    }

    if !resolved.starts_with(root) {
        return Err(Error::TraversalDenied(request_path.to_string()));
    }
    Ok(resolved)
}

/// Whether any segment of `path` below `root` matches an exclusion pattern
pub fn is_excluded(root: &Path, path: &Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|name| matches_any(name, patterns)),
        _ => false,
    })
}

/// Whether a single file name matches any exclusion pattern
pub fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| glob_match(p, name))
}

/// Match `text` against a pattern where `*` is any run and `?` any one char
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last '*' and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_join() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve_path(root, "/css/site.css").unwrap(),
            Path::new("/srv/public/css/site.css")
        );
        assert_eq!(resolve_path(root, "/").unwrap(), root);
    }

    #[test]
    fn test_traversal_blocked() {
        let root = Path::new("/srv/public");
        assert!(matches!(
            resolve_path(root, "/secret/../../etc/passwd"),
            Err(Error::TraversalDenied(_))
        ));
        assert!(matches!(
            resolve_path(root, "/%2e%2e/%2e%2e/etc/passwd"),
            Err(Error::TraversalDenied(_))
        ));
        assert!(matches!(
            resolve_path(root, "/..%2fetc/passwd"),
            Err(Error::TraversalDenied(_))
        ));
        assert!(matches!(
            resolve_path(root, "/a%00.txt"),
            Err(Error::TraversalDenied(_))
        ));
        assert!(matches!(
            resolve_path(root, "/..\\..\\etc"),
            Err(Error::TraversalDenied(_))
        ));
    }

    #[test]
    fn test_traversal_never_escapes() {
        let root = Path::new("/srv/public");
        let attempts = [
            "/../x",
            "/a/../../x",
            "/a/b/../../../x",
            "/./../x",
            "//..//..//x",
            "/a/%2E%2E/%2E%2E/x",
        ];
        for attempt in attempts {
            match resolve_path(root, attempt) {
                Ok(p) => assert!(p.starts_with(root), "{attempt} resolved to {}", p.display()),
                Err(e) => assert!(matches!(e, Error::TraversalDenied(_))),
            }
        }
    }

    #[test]
    fn test_dot_segments_inside_root() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve_path(root, "/a/./b/../c.txt").unwrap(),
            Path::new("/srv/public/a/c.txt")
        );
    }

    #[test]
    fn test_percent_decoding() {
        let root = Path::new("/srv/public");
        assert_eq!(
            resolve_path(root, "/my%20file.txt").unwrap(),
            Path::new("/srv/public/my file.txt")
        );
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(".env", ".env"));
        assert!(glob_match("*.bak", "index.html.bak"));
        assert!(glob_match(".*", ".git"));
        assert!(glob_match("file?.txt", "file1.txt"));
        assert!(glob_match("*a*b*", "xxaxxbxx"));
        assert!(!glob_match("*.bak", "index.html"));
        assert!(!glob_match("file?.txt", "file10.txt"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_is_excluded_any_segment() {
        let root = Path::new("/srv/public");
        let patterns = vec![".git".to_string(), "*.key".to_string()];
        assert!(is_excluded(root, Path::new("/srv/public/.git/config"), &patterns));
        assert!(is_excluded(root, Path::new("/srv/public/tls/server.key"), &patterns));
        assert!(!is_excluded(root, Path::new("/srv/public/index.html"), &patterns));
        assert!(!is_excluded(root, root, &patterns));
    }
}
