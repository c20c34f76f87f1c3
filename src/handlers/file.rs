use std::any::Any;
use std::fs::{self, File, Metadata};
use std::path::{Path, PathBuf};

use url::Url;

use super::error::{OpenError, Result};
use super::traits::{Connection, ProtocolHandler};
use super::types::Proxy;

/// Connection to a local file; the file is only touched on first use
#[derive(Debug, Clone)]
pub struct FileConnection {
    url: Url,
    path: PathBuf,
}

impl FileConnection {
    pub fn new(url: Url) -> Result<Self> {
        let path = url
            .to_file_path()
            .map_err(|_| OpenError::NotAFilePath(url.to_string()))?;
        Ok(Self { url, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> Result<Metadata> {
        fs::metadata(&self.path).map_err(|source| self.io_error(source))
    }

    pub fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|source| self.io_error(source))
    }

    pub fn read_to_end(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> OpenError {
        OpenError::Io {
            url: self.url.to_string(),
            source,
        }
    }
}

impl Connection for FileConnection {
    fn url(&self) -> &Url {
        &self.url
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Stock handler for `file` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHandler;

impl ProtocolHandler for FileHandler {
    fn open(&self, url: &Url) -> Result<Box<dyn Connection>> {
        Ok(Box::new(FileConnection::new(url.clone())?))
    }

    // Local files have no route to proxy through.
    fn open_with_proxy(&self, url: &Url, _proxy: &Proxy) -> Result<Box<dyn Connection>> {
        self.open(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_read_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hello.txt");
        fs::write(&path, b"hello").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let conn = FileHandler.open(&url).unwrap();
        assert_eq!(conn.kind(), "file");

        let file = conn.downcast_ref::<FileConnection>().unwrap();
        assert_eq!(file.path(), path.as_path());
        assert_eq!(file.read_to_end().unwrap(), b"hello");
        assert_eq!(file.metadata().unwrap().len(), 5);
    }

    #[test]
    fn test_missing_file_fails_on_use_not_open() {
        let temp_dir = TempDir::new().unwrap();
        let url = Url::from_file_path(temp_dir.path().join("absent.txt")).unwrap();

        let conn = FileHandler.open(&url).unwrap();
        let file = conn.downcast_ref::<FileConnection>().unwrap();
        assert!(matches!(file.read_to_end(), Err(OpenError::Io { .. })));
    }

    #[test]
    fn test_non_file_url_is_rejected() {
        let url = Url::parse("file://remote-host/share/data.txt").unwrap();
        let result = FileHandler.open(&url);
        assert!(matches!(result, Err(OpenError::NotAFilePath(_))));
    }
}
