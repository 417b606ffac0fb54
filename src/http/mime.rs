//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.

use std::collections::HashMap;
use std::path::Path;

/// Fallback when an extension is unknown
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Built-in extension table, keyed without the leading dot
const BUILTIN_TYPES: &[(&str, &str)] = &[
    // Text
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("md", "text/markdown"),
    ("txt", "text/plain"),
    ("xhtml", "application/xhtml+xml"),
    ("xml", "application/xml"),
    // Scripts and data
    ("cjs", "application/javascript"),
    ("js", "application/javascript"),
    ("jsx", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("jsonld", "application/ld+json"),
    ("toml", "application/toml"),
    ("yaml", "application/yaml"),
    ("wasm", "application/wasm"),
    // Images
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("ico", "image/x-icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    // Audio
    ("aac", "audio/aac"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("mp3", "audio/mpeg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/opus"),
    ("wav", "audio/wav"),
    ("weba", "audio/webm"),
    // Video
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("ts", "video/mp2t"),
    ("webm", "video/webm"),
    // Fonts
    ("otf", "font/otf"),
    ("ttf", "font/ttf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    // Documents and archives
    ("ogx", "application/ogg"),
    ("pdf", "application/pdf"),
    ("rtf", "application/rtf"),
    ("zip", "application/zip"),
];

/// Extension to Content-Type table with a default fallback
#[derive(Debug, Clone)]
pub struct ContentTypes {
    by_extension: HashMap<String, String>,
    default_type: String,
}

impl ContentTypes {
    /// Start from the built-in table, then apply overrides
    ///
    /// Override keys are accepted with or without a leading dot.
    pub fn with_overrides<I, K, V>(overrides: I, default_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut by_extension: HashMap<String, String> = BUILTIN_TYPES
            .iter()
            .map(|(ext, mime)| ((*ext).to_string(), (*mime).to_string()))
            .collect();
        for (ext, mime) in overrides {
            let ext = ext.as_ref();
            by_extension.insert(ext.strip_prefix('.').unwrap_or(ext).to_string(), mime.into());
        }
        Self {
            by_extension,
            default_type: default_type.into(),
        }
    }

    /// Get MIME Content-Type for a pathname
    ///
    /// Lookup is case-sensitive on the final extension.
    ///
    /// # Examples
    /// ```
    /// use static_handler::http::mime::ContentTypes;
    ///
    /// let types = ContentTypes::default();
    /// assert_eq!(types.resolve("/index.html"), "text/html");
    /// assert_eq!(types.resolve("/video.mp4"), "video/mp4");
    /// assert_eq!(types.resolve("/README"), "application/octet-stream");
    /// ```
    pub fn resolve(&self, pathname: &str) -> &str {
        Path::new(pathname)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.by_extension.get(ext))
            .map_or(self.default_type.as_str(), String::as_str)
    }

    pub fn default_type(&self) -> &str {
        &self.default_type
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::with_overrides(std::iter::empty::<(&str, String)>(), DEFAULT_CONTENT_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        let types = ContentTypes::default();
        assert_eq!(types.resolve("/a.html"), "text/html");
        assert_eq!(types.resolve("/a.css"), "text/css");
        assert_eq!(types.resolve("/a.js"), "application/javascript");
        assert_eq!(types.resolve("/a.json"), "application/json");
        assert_eq!(types.resolve("/a.png"), "image/png");
        assert_eq!(types.resolve("/deep/dir/a.mp4"), "video/mp4");
    }

    #[test]
    fn test_unknown_extension() {
        let types = ContentTypes::default();
        assert_eq!(types.resolve("/a.xyz"), DEFAULT_CONTENT_TYPE);
        assert_eq!(types.resolve("/Makefile"), DEFAULT_CONTENT_TYPE);
        assert_eq!(types.resolve("/.bashrc"), DEFAULT_CONTENT_TYPE);
        assert_eq!(types.resolve("/"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let types = ContentTypes::default();
        assert_eq!(types.resolve("/PHOTO.PNG"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_overrides_and_default() {
        let types = ContentTypes::with_overrides(
            [(".html", "text/html; charset=utf-8"), ("log", "text/plain")],
            "text/plain",
        );
        assert_eq!(types.resolve("/a.html"), "text/html; charset=utf-8");
        assert_eq!(types.resolve("/server.log"), "text/plain");
        assert_eq!(types.resolve("/blob.bin"), "text/plain");
        assert_eq!(types.default_type(), "text/plain");
    }
}
