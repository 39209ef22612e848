use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NfcomxError>;

#[derive(Debug, Error)]
pub enum NfcomxError {
    #[error("invalid document source `{}`: {source}", path.display())]
    FailedToOpenFile { path: PathBuf, source: io::Error },

    #[error("invalid document source `{name}`: {source}")]
    InvalidSource { name: String, source: io::Error },

    #[error("XML syntax error near byte {offset}: {message}")]
    Syntax { offset: u64, message: String },

    /// Since `quick-xml` maintains the element stack for us, structural errors
    /// with the XML will be included in this generic error alongside IO errors.
    #[error("writing XML output failed with: {message}")]
    XmlOutput { message: String },

    #[error("an unexpected error has occurred: {detail}")]
    Unexpected { detail: String },
}

impl NfcomxError {
    /// True for failures of the source handle itself, as opposed to failures
    /// of the document it yielded.
    pub fn is_invalid_source(&self) -> bool {
        matches!(
            self,
            NfcomxError::FailedToOpenFile { .. } | NfcomxError::InvalidSource { .. }
        )
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, NfcomxError::Syntax { .. })
    }
}

impl From<io::Error> for NfcomxError {
    fn from(err: io::Error) -> Self {
        NfcomxError::XmlOutput {
            message: format!("{err}"),
        }
    }
}

impl From<quick_xml::Error> for NfcomxError {
    fn from(err: quick_xml::Error) -> Self {
        NfcomxError::XmlOutput {
            message: format!("{err}"),
        }
    }
}

/// Generic error constructor for faults with no more specific variant.
#[macro_export]
macro_rules! format_err {
   ($($arg:tt)*) => { $crate::err::NfcomxError::Unexpected { detail: format!($($arg)*) } }
}
