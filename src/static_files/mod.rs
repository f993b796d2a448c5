//! Static file serving module
//!
//! Resolves request paths under a configured root and serves files,
//! index files or generated directory listings. Traversal, exclusion and
//! range failures are answered locally with their status; filesystem
//! failures propagate to the caller as internal errors.

mod config;
pub mod listing;
pub mod resolve;
mod serve;

pub use self::config::StaticConfig;

use crate::engine::{Handler, Request, Response};
use crate::error::{Error, Result};
use crate::http::response::{build_error_response, build_html_response};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Called instead of the generic 404 when a path does not exist
pub type NotFoundFallback = Arc<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

/// Runs before a file response is assembled; an error aborts the request
pub type ModifyHook = Arc<dyn Fn(&Request, &mut Response) -> Result<()> + Send + Sync>;

/// Upper bound for `cache_duration`: one year, in seconds
pub const MAX_CACHE_DURATION: u64 = 365 * 24 * 60 * 60;

pub struct StaticAssetServer {
    config: StaticConfig,
    /// Canonical form of `config.root`
    root: PathBuf,
    not_found: Option<NotFoundFallback>,
    modify: Option<ModifyHook>,
}

impl StaticAssetServer {
    /// Validate the root and build a server
    pub fn new(config: StaticConfig) -> Result<Self> {
        let root = fs::canonicalize(&config.root).map_err(|e| {
            config_error(format!(
                "static root '{}' is not accessible: {e}",
                config.root.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(config_error(format!(
                "static root '{}' is not a directory",
                root.display()
            )));
        }
        if config.cache_duration > MAX_CACHE_DURATION {
            return Err(config_error(format!(
                "cache_duration {} exceeds the {MAX_CACHE_DURATION} second limit",
                config.cache_duration
            )));
        }

        tracing::info!(root = %root.display(), browse = config.browse, "static root ready");
        Ok(Self {
            config,
            root,
            not_found: None,
            modify: None,
        })
    }

    #[must_use]
    pub fn with_not_found<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Request) -> Result<Response> + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(fallback));
        self
    }

    #[must_use]
    pub fn with_modify<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.modify = Some(Arc::new(hook));
        self
    }

    pub const fn config(&self) -> &StaticConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn modify_hook(&self) -> Option<&ModifyHook> {
        self.modify.as_ref()
    }

    /// Serve `req`, reporting every failure as an error
    pub fn serve(&self, req: &Request) -> Result<Response> {
        if !(req.method.eq_ignore_ascii_case("GET") || req.is_head()) {
            return Err(Error::MethodNotAllowed(req.method.clone()));
        }

        let path = resolve::resolve_path(&self.root, req.path())?;

        if self.is_excluded(&path) {
            return Err(Error::Excluded(req.path().to_string()));
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if is_missing(&e) => return self.fallback(req),
            Err(e) => return Err(Error::io(path, e)),
        };

        // Symlinks may point anywhere; the target must still be under root
        if !self.is_within_root(&path) {
            return Err(Error::TraversalDenied(req.path().to_string()));
        }

        if meta.is_dir() {
            self.serve_directory(req, &path)
        } else {
            serve::serve_file(self, req, &path, &meta)
        }
    }

    fn serve_directory(&self, req: &Request, dir: &Path) -> Result<Response> {
        let index = dir.join(&self.config.index);
        match fs::metadata(&index) {
            Ok(meta)
                if meta.is_file() && !self.is_excluded(&index) && self.is_within_root(&index) =>
            {
                return serve::serve_file(self, req, &index, &meta);
            }
            Ok(_) => {}
            Err(e) if is_missing(&e) => {}
            Err(e) => return Err(Error::io(index, e)),
        }

        if !self.config.browse {
            return Err(Error::ListingDisabled(req.path().to_string()));
        }

        let entries =
            listing::read_entries(dir, &self.config.exclude).map_err(|e| Error::io(dir, e))?;
        let display_path = urlencoding::decode(req.path())
            .map_or_else(|_| req.path().to_string(), |p| p.into_owned());
        let html = listing::render(req.path(), &display_path, &entries, dir == self.root);
        Ok(build_html_response(html, req.is_head()))
    }

    fn fallback(&self, req: &Request) -> Result<Response> {
        match &self.not_found {
            Some(fallback) => fallback(req),
            None => Err(Error::NotFound(req.path().to_string())),
        }
    }

    pub(crate) fn is_excluded(&self, path: &Path) -> bool {
        resolve::is_excluded(&self.root, path, &self.config.exclude)
    }

    pub(crate) fn is_within_root(&self, path: &Path) -> bool {
        fs::canonicalize(path).is_ok_and(|real| real.starts_with(&self.root))
    }
}

impl Handler for StaticAssetServer {
    fn handle(&self, req: Request) -> Result<Response> {
        match self.serve(&req) {
            Ok(resp) => Ok(resp),
            // Validation failures never escalate
            Err(err) if !err.is_internal() => {
                tracing::debug!(path = req.path(), status = err.status(), error = %err, "static request rejected");
                Ok(build_error_response(&err))
            }
            Err(err) => Err(err),
        }
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn config_error(message: String) -> Error {
    Error::Config(::config::ConfigError::Message(message))
}
