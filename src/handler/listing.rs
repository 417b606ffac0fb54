//! Directory index page
//!
//! Renders a minimal HTML list of a directory's entries.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::io;
use std::path::Path;

/// Bytes escaped in listing links: everything but unreserved characters and `/`
const HREF_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Build the listing page for the directory at `dir`, served at `pathname`
pub async fn render_listing(dir: &Path, pathname: &str) -> io::Result<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(listing_html(pathname, &names))
}

fn listing_html(pathname: &str, names: &[String]) -> String {
    let base = if pathname == "/" { "" } else { pathname };
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\" /></head><body><ul>",
    );
    let base = utf8_percent_encode(base, HREF_ENCODE_SET).to_string();
    for name in names {
        // Names never contain `/`, so the set keeps each one a single segment
        let href = utf8_percent_encode(name, HREF_ENCODE_SET);
        html.push_str(&format!(
            "<li><a href=\"{base}/{href}\">{}</a></li>",
            escape_html(name)
        ));
    }
    html.push_str("</ul></body></html>");
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_listing_links() {
        let html = listing_html("/", &["a.txt".to_string(), "sub".to_string()]);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<li><a href=\"/a.txt\">a.txt</a></li>"));
        assert!(html.contains("<li><a href=\"/sub\">sub</a></li>"));
    }

    #[test]
    fn test_nested_listing_links() {
        let html = listing_html("/docs", &["x.md".to_string()]);
        assert!(html.contains("<a href=\"/docs/x.md\">x.md</a>"));
    }

    #[test]
    fn test_names_are_escaped() {
        let html = listing_html("/", &["<script>&\".txt".to_string()]);
        assert!(html.contains(">&lt;script&gt;&amp;&quot;.txt</a>"));
        assert!(html.contains("href=\"/%3Cscript%3E%26%22.txt\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_links_are_percent_encoded() {
        let html = listing_html("/my docs", &["my file #1?.txt".to_string(), "ü.txt".to_string()]);
        assert!(html.contains("<a href=\"/my%20docs/my%20file%20%231%3F.txt\">my file #1?.txt</a>"));
        assert!(html.contains("<a href=\"/my%20docs/%C3%BC.txt\">ü.txt</a>"));
    }

    #[tokio::test]
    async fn test_render_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let html = render_listing(dir.path(), "/").await.unwrap();
        let a = html.find("a.txt").unwrap();
        let b = html.find("b.txt").unwrap();
        assert!(a < b);
    }
}
