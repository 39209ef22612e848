use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use crate::err::{NfcomxError, Result};

/// A re-openable XML byte source.
///
/// Extraction and consolidation may read the same document more than once
/// (e.g. an extraction pass followed by a result-driven consolidation), so a
/// source hands out a fresh reader on every call to [`DocumentSource::open`]
/// instead of requiring the underlying handle to be seekable.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Buffer { name: String, data: Vec<u8> },
}

impl DocumentSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        DocumentSource::Path(path.as_ref().to_path_buf())
    }

    pub fn from_buffer(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        DocumentSource::Buffer {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Display name used in result records and log messages.
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Path(path) => path.display().to_string(),
            DocumentSource::Buffer { name, .. } => name.clone(),
        }
    }

    /// Opens a fresh buffered reader positioned at the start of the document.
    pub fn open(&self) -> Result<Box<dyn BufRead + '_>> {
        match self {
            DocumentSource::Path(path) => {
                let f = File::open(path).map_err(|source| NfcomxError::FailedToOpenFile {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(BufReader::new(f)))
            }
            DocumentSource::Buffer { data, .. } => Ok(Box::new(Cursor::new(data.as_slice()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn buffer_source_reopens_from_the_start() {
        let source = DocumentSource::from_buffer("mem.xml", b"<a/>".to_vec());

        for _ in 0..2 {
            let mut contents = String::new();
            source.open().unwrap().read_to_string(&mut contents).unwrap();
            assert_eq!(contents, "<a/>");
        }
    }

    #[test]
    fn missing_path_is_an_invalid_source() {
        let source = DocumentSource::from_path("/definitely/not/here.xml");
        let err = source.open().err().unwrap();
        assert!(err.is_invalid_source());
    }
}
