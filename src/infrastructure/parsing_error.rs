//! Error types for descriptor parsing and feed normalization
//!
//! Both are per-shop failures: the shop is dropped or yields zero rows, the
//! run continues.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("descriptor document is empty")]
    EmptyDocument,

    #[error("descriptor XML is malformed: {message}")]
    MalformedXml { message: String },
}

impl ParsingError {
    pub fn malformed(err: &roxmltree::Error) -> Self {
        Self::MalformedXml {
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("feed could not be decoded (declared encoding: {})", declared.as_deref().unwrap_or("none"))]
    Decode { declared: Option<String> },

    #[error("feed populates only {fields} canonical fields (need at least {required})")]
    Shape { fields: usize, required: usize },
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_mentions_declared_encoding() {
        let err = NormalizeError::Decode { declared: Some("iso-8859-15".into()) };
        assert!(err.to_string().contains("iso-8859-15"));

        let err = NormalizeError::Decode { declared: None };
        assert!(err.to_string().contains("none"));
    }
}
