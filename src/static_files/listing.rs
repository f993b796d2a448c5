//! Directory listing generation

use super::resolve::matches_any;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Enumerate `dir`: directories first, then files, each group by name
///
/// Entries whose name matches an exclusion pattern are left out, as are
/// names that are not valid UTF-8.
pub fn read_entries(dir: &Path, exclude: &[String]) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if matches_any(&name, exclude) {
            continue;
        }
        // Follow symlinks; a dangling link is listed by its own metadata
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(_) => entry.metadata()?,
        };
        entries.push(ListingEntry {
            name,
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().ok(),
        });
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// Directories before files; within a group, by name
pub fn sort_entries(entries: &mut [ListingEntry]) {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}

/// Render the HTML document for a listing
///
/// `request_path` is the raw URL path and is used to build links;
/// `display_path` is its decoded form shown to the reader.
pub fn render(
    request_path: &str,
    display_path: &str,
    entries: &[ListingEntry],
    is_root: bool,
) -> String {
    use std::fmt::Write;

    let base = if request_path.ends_with('/') {
        request_path.to_string()
    } else {
        format!("{request_path}/")
    };
    let title = html_escape(display_path);

    let mut html = String::with_capacity(512 + entries.len() * 128);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Index of {title}</title>\n\
         <style>body{{font-family:monospace;margin:2em}}\
         td{{padding:0 1.5em 0 0}}th{{text-align:left}}</style>\n\
         </head>\n<body>\n<h1>Index of {title}</h1>\n<table>\n\
         <tr><th>Name</th><th>Size</th><th>Modified</th></tr>\n"
    );

    if !is_root {
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">../</a></td><td>-</td><td>-</td></tr>",
            html_escape(&parent_href(&base))
        );
    }

    for entry in entries {
        let slash = if entry.is_dir { "/" } else { "" };
        let href = format!("{base}{}{slash}", urlencoding::encode(&entry.name));
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            human_size(entry.size)
        };
        let modified = entry
            .modified
            .map_or_else(|| "-".to_string(), format_timestamp);
        let _ = writeln!(
            html,
            "<tr><td><a href=\"{}\">{}{slash}</a></td><td>{size}</td><td>{modified}</td></tr>",
            html_escape(&href),
            html_escape(&entry.name),
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

/// Human readable size with 1024-based units
///
/// # Examples
/// ```
/// use assetbridge::static_files::listing::human_size;
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(1536), "1.5 KB");
/// ```
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn parent_href(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) => format!("{parent}/"),
        None => "/".to_string(),
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
