//! Header line parsing and reconstruction.

use crate::error::{Error, Result};
use crate::lines::lines;

/// Field names taken from the first line of the source object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    fields: Vec<String>,
    delimiter: String,
}

impl Header {
    /// Parse a header line.
    ///
    /// The line is trimmed and, when `lowercase` is set, lower-cased before
    /// being split on `delimiter`. The delimiter is matched literally.
    pub fn parse(line: &[u8], delimiter: &str, lowercase: bool) -> Result<Self> {
        if delimiter.is_empty() {
            return Err(Error::InvalidHeader("delimiter must not be empty".to_string()));
        }

        let text = std::str::from_utf8(line)
            .map_err(|e| Error::InvalidHeader(format!("header is not valid UTF-8: {e}")))?
            .trim();
        let text = if lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        Ok(Self {
            fields: text.split(delimiter).map(str::to_string).collect(),
            delimiter: delimiter.to_string(),
        })
    }

    /// Parse the header from the first line of a sample window.
    ///
    /// `covers_object` tells whether the window holds the whole object; only
    /// then may the header line end without a terminator.
    pub fn from_window(
        window: &[u8],
        covers_object: bool,
        delimiter: &str,
        lowercase: bool,
    ) -> Result<Self> {
        let first = lines(window)
            .next()
            .ok_or_else(|| Error::InvalidHeader("object has no header line".to_string()))?;

        if !first.terminated && !covers_object {
            return Err(Error::InvalidHeader(format!(
                "header line is longer than the {} byte sample window",
                window.len()
            )));
        }

        Self::parse(first.content, delimiter, lowercase)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Render the header fields joined by the delimiter, without a terminator.
    pub fn render(&self) -> String {
        self.fields.join(&self.delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_lowercases() {
        let header = Header::parse(b"  ID,Name,E-Mail \r", ",", true).unwrap();
        assert_eq!(header.fields(), ["id", "name", "e-mail"]);
        assert_eq!(header.render(), "id,name,e-mail");
    }

    #[test]
    fn test_parse_keeps_case_when_asked() {
        let header = Header::parse(b"ID|Name", "|", false).unwrap();
        assert_eq!(header.fields(), ["ID", "Name"]);
        assert_eq!(header.render(), "ID|Name");
    }

    #[test]
    fn test_tab_delimiter() {
        let header = Header::parse(b"a\tb\tc", "\t", true).unwrap();
        assert_eq!(header.fields().len(), 3);
        assert_eq!(header.render(), "a\tb\tc");
    }

    #[test]
    fn test_regex_metacharacter_delimiter_is_literal() {
        let header = Header::parse(b"a.b.c", ".", true).unwrap();
        assert_eq!(header.fields(), ["a", "b", "c"]);
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert!(matches!(
            Header::parse(b"a,b", "", true),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(matches!(
            Header::parse(&[0xff, 0xfe, b','], ",", true),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_from_window_uses_first_line() {
        let header = Header::from_window(b"A,B\r\n1,2\r\n", false, ",", true).unwrap();
        assert_eq!(header.render(), "a,b");
    }

    #[test]
    fn test_from_window_rejects_truncated_header() {
        let err = Header::from_window(b"a,b,c,d", false, ",", true).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));

        // The same bytes are fine when they are the whole object.
        let header = Header::from_window(b"a,b,c,d", true, ",", true).unwrap();
        assert_eq!(header.fields().len(), 4);
    }

    #[test]
    fn test_from_window_rejects_empty_object() {
        assert!(Header::from_window(b"", true, ",", true).is_err());
    }
}
