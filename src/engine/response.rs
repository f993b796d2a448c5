//! Primary response shape

use super::HeaderList;
use hyper::body::Bytes;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderList,
    pub body: ResponseBody,
}

impl Response {
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderList::new(),
            body: ResponseBody::Empty,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<Bytes>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ResponseBody::Bytes(body.into());
        self
    }

    /// Length of the body that will be transmitted, if known
    pub fn body_len(&self) -> u64 {
        match &self.body {
            ResponseBody::Empty => 0,
            ResponseBody::Bytes(bytes) => bytes.len() as u64,
            ResponseBody::File(file) => file.len(),
        }
    }
}

#[derive(Debug, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Bytes(Bytes),
    File(FileBody),
}

/// Open file handle positioned at the first byte to send
///
/// The handle belongs to exactly one response and closes when the body is
/// dropped, whether it was fully written or not.
#[derive(Debug)]
pub struct FileBody {
    file: File,
    len: u64,
}

impl FileBody {
    /// Open `path` and seek to `start`; `len` bytes will be sent from there
    pub fn open_window(path: &Path, start: u64, len: u64) -> io::Result<Self> {
        let mut file = File::open(path)?;
        if start > 0 {
            file.seek(SeekFrom::Start(start))?;
        }
        Ok(Self { file, len })
    }

    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reader limited to the window
    pub fn into_reader(self) -> io::Take<File> {
        self.file.take(self.len)
    }

    /// Read the whole window into memory
    pub fn read_all(self) -> io::Result<Vec<u8>> {
        let expected = self.len;
        let mut out = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        self.into_reader().read_to_end(&mut out)?;
        if out.len() as u64 != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while being served",
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_window() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();

        let body = FileBody::open_window(tmp.path(), 3, 4).unwrap();
        assert_eq!(body.len(), 4);
        assert_eq!(body.read_all().unwrap(), b"3456");
    }

    #[test]
    fn test_file_window_past_end() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"short").unwrap();

        let body = FileBody::open_window(tmp.path(), 2, 10).unwrap();
        assert!(body.read_all().is_err());
    }

    #[test]
    fn test_builder_and_len() {
        let resp = Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body("hello");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_len(), 5);
        assert_eq!(resp.headers.get_str("content-type"), Some("text/plain"));
    }
}
