//! Encoding selection by field-count validation.
//!
//! IMGW archives come in UTF-8, Windows-1250, ISO-8859-2 and occasionally
//! Latin-1 without any marker. An encoding is accepted when the first line
//! decodes strictly and splits into exactly the layout's column count, and
//! the whole file then decodes strictly as well.

use encoding_rs::{ISO_8859_2, UTF_8, WINDOWS_1250};
use std::borrow::Cow;
use tracing::debug;

use crate::layout::{Layout, TextEncoding};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A decoded file together with the encoding and delimiter that fit it
#[derive(Debug)]
pub struct Selection<'a> {
    pub encoding: TextEncoding,
    pub delimiter: u8,
    pub text: Cow<'a, str>,
}

/// Strict decode; `None` when the bytes are not valid in `encoding`.
pub fn decode(encoding: TextEncoding, bytes: &[u8]) -> Option<Cow<'_, str>> {
    match encoding {
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
        }
        TextEncoding::Windows1250 => {
            WINDOWS_1250.decode_without_bom_handling_and_without_replacement(bytes)
        }
        TextEncoding::Iso8859_2 => {
            ISO_8859_2.decode_without_bom_handling_and_without_replacement(bytes)
        }
        TextEncoding::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
    }
}

/// Bytes of the first line, without the line terminator
pub fn first_line(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let line = &bytes[..end];
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Number of fields in one delimited line, honouring quotes
pub fn count_fields(line: &str, delimiter: u8) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Some(record.len()),
        _ => None,
    }
}

/// Try every (delimiter, encoding) pair of the layout in declared order.
pub fn select_encoding<'a>(bytes: &'a [u8], layout: &Layout) -> Option<Selection<'a>> {
    let head = first_line(bytes);
    let expected = layout.column_count();

    for &delimiter in layout.delimiters {
        for &encoding in layout.encodings {
            let Some(line) = decode(encoding, head) else {
                continue;
            };
            let found = count_fields(&line, delimiter);
            if found != Some(expected) {
                debug!(
                    "{} with {:?}: {:?} fields, expected {}",
                    encoding.name(),
                    delimiter as char,
                    found,
                    expected
                );
                continue;
            }

            match decode(encoding, bytes) {
                Some(text) => {
                    return Some(Selection {
                        encoding,
                        delimiter,
                        text,
                    });
                }
                None => debug!(
                    "{} accepted the first line but not the whole file",
                    encoding.name()
                ),
            }
        }
    }

    None
}
