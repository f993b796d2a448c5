//! File delivery with conditional and range support

use super::StaticAssetServer;
use crate::engine::{FileBody, Request, Response, ResponseBody};
use crate::error::{Error, Result};
use crate::http::{cache, mime, range};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Serve one resolved regular file
///
/// Conditional headers are evaluated before any range work, and the file is
/// opened only once every validation has passed. The handle moves into the
/// response body and is released when that body is dropped.
pub(super) fn serve_file(
    server: &StaticAssetServer,
    req: &Request,
    path: &Path,
    meta: &Metadata,
) -> Result<Response> {
    let config = server.config();
    let mut resp = Response::new(200);

    if let Some(hook) = server.modify_hook() {
        hook(req, &mut resp)?;
    }

    resp.headers
        .set("Content-Type", mime::content_type_for(path, &config.content_types).to_string());

    // Precompressed sibling takes over the byte source and validators
    let (source, meta) = match precompressed(server, req, path) {
        Some((gz_path, gz_meta)) => {
            resp.headers.set("Content-Encoding", "gzip");
            (gz_path, gz_meta)
        }
        None => (path.to_path_buf(), meta.clone()),
    };
    if config.compress {
        resp.headers.append("Vary", "Accept-Encoding");
    }

    if config.cache_duration > 0 {
        let max_age = config.cache_duration;
        resp.headers
            .set("Cache-Control", format!("public, max-age={max_age}"));
        if let Some(expires) = SystemTime::now().checked_add(Duration::from_secs(max_age)) {
            resp.headers.set("Expires", cache::http_date(expires));
        }
    }

    let size = meta.len();
    let mtime = meta.modified().map_err(|e| Error::io(&source, e))?;
    resp.headers.set("Last-Modified", cache::http_date(mtime));

    if config.etag {
        let tag = cache::compute_tag(size, mtime);
        resp.headers.set("ETag", tag.clone());

        if cache::matches(req.header("If-None-Match"), &tag)
            || cache::not_modified_since(req.header("If-Modified-Since"), mtime)
        {
            resp.status = 304;
            resp.body = ResponseBody::Empty;
            return Ok(resp);
        }
    }

    if config.byte_range {
        resp.headers.set("Accept-Ranges", "bytes");

        if let Some(range_header) = req.header("Range") {
            let window = range::resolve(range_header, size)?;
            return deliver(resp, req, &source, 206, window.start(), window.len())
                .map(|mut resp| {
                    resp.headers.set("Content-Range", window.content_range());
                    resp
                });
        }
    }

    deliver(resp, req, &source, 200, 0, size)
}

fn deliver(
    mut resp: Response,
    req: &Request,
    path: &Path,
    status: u16,
    start: u64,
    len: u64,
) -> Result<Response> {
    resp.status = status;
    resp.headers.set("Content-Length", len.to_string());
    resp.body = if req.is_head() || len == 0 {
        ResponseBody::Empty
    } else {
        let body = FileBody::open_window(path, start, len).map_err(|e| Error::io(path, e))?;
        ResponseBody::File(body)
    };
    Ok(resp)
}

/// `<file>.gz` next to `path`, if compression is on and the client takes gzip
fn precompressed(
    server: &StaticAssetServer,
    req: &Request,
    path: &Path,
) -> Option<(PathBuf, Metadata)> {
    if !server.config().compress || !accepts_gzip(req.header("Accept-Encoding")?) {
        return None;
    }
    let mut gz = path.as_os_str().to_owned();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    if server.is_excluded(&gz) {
        return None;
    }
    let meta = fs::metadata(&gz).ok().filter(Metadata::is_file)?;
    server.is_within_root(&gz).then_some((gz, meta))
}

fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|item| {
        let mut parts = item.split(';');
        let coding = parts.next().unwrap_or("").trim();
        if !(coding.eq_ignore_ascii_case("gzip") || coding == "*") {
            return false;
        }
        // "q=0" explicitly refuses the coding
        !parts.any(|p| {
            p.trim()
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_gzip() {
        assert!(accepts_gzip("gzip, deflate, br"));
        assert!(accepts_gzip("br;q=1.0, GZIP;q=0.5"));
        assert!(accepts_gzip("*"));
        assert!(!accepts_gzip("gzip;q=0"));
        assert!(!accepts_gzip("br, deflate"));
        assert!(!accepts_gzip("identity"));
    }
}
