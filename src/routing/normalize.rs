//! Request path normalization
//!
//! Turns a raw request target into a canonical, root-confined pathname.
//! The output is always `/`-rooted and never contains `.` or `..` segments,
//! so joining it under the served directory cannot escape that directory.

use std::path::{Path, PathBuf};

/// Normalize a raw request target into a canonical pathname
///
/// - The query component (everything from the first `?`) is dropped
/// - Both `/` and platform separators split segments
/// - Empty and `.` segments are dropped
/// - `..` pops the previous segment and is absorbed at the root
/// - A target starting with a doubled separator (`//x`) collapses to `/`
///
/// # Examples
/// ```
/// use static_handler::routing::normalize;
///
/// assert_eq!(normalize("/a/./b/../c?x=1"), "/a/c");
/// assert_eq!(normalize("/../../x"), "/x");
/// assert_eq!(normalize("//x"), "/");
/// ```
pub fn normalize(raw: &str) -> String {
    let path = raw.split_once('?').map_or(raw, |(path, _)| path);

    let mut chars = path.chars();
    if matches!(
        (chars.next(), chars.next()),
        (Some(a), Some(b)) if is_separator(a) && is_separator(b)
    ) {
        return "/".to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut canonical = String::with_capacity(path.len() + 1);
    canonical.push('/');
    canonical.push_str(&segments.join("/"));
    canonical
}

/// Join a canonical pathname under the served root directory
pub fn join_under_root(root: &Path, pathname: &str) -> PathBuf {
    let relative = pathname.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || std::path::is_separator(c)
}
