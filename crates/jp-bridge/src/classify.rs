// classify.rs — Which files are safe to transmit as text.
//
// Exports to the host carry whole-file content as strings, so only files
// whose suffix is on this fixed allow-list are included. Everything else is
// silently omitted from the export (with a diagnostic), never errored on.

/// Suffixes whose content is transmitted as text: notebook, source,
/// markup, structured-config, and shell-script formats.
const TEXT_EXTENSIONS: &[&str] = &[
    ".ipynb",
    ".py",
    ".md",
    ".txt",
    ".csv",
    ".json",
    ".html",
    ".js",
    ".css",
    ".ts",
    ".tsx",
    ".r",
    ".rmd",
    ".xml",
    ".yaml",
    ".yml",
    ".toml",
    ".ini",
    ".cfg",
    ".conf",
    ".properties",
    ".env",
    ".sh",
    ".bat",
    ".cmd",
];

/// True if the path's suffix marks it as text-eligible for export.
pub fn is_text_path(path: &str) -> bool {
    TEXT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
