//! Per-place review dataset: a single-column delimited file written with a
//! UTF-8 byte-order mark so spreadsheet tools pick the right encoding.
//!
//! Layout is `files/review_<place_id>.csv`, header `content`, one review per
//! record. Fields containing the delimiter, a quote or a line break are
//! quoted with embedded quotes doubled.

use std::path::{Path, PathBuf};

use crate::error::DatasetError;

const BOM: &str = "\u{feff}";
const HEADER: &str = "content";

pub fn dataset_path(files_dir: &Path, place_id: i32) -> PathBuf {
    files_dir.join(format!("review_{}.csv", place_id))
}

/// Overwrites the dataset for `place_id`, creating the directory if needed.
pub async fn write_reviews(
    files_dir: &Path,
    place_id: i32,
    reviews: &[String],
) -> Result<PathBuf, DatasetError> {
    let path = dataset_path(files_dir, place_id);
    let io_err = |source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    };

    tokio::fs::create_dir_all(files_dir).await.map_err(io_err)?;
    tokio::fs::write(&path, encode(reviews)).await.map_err(io_err)?;
    Ok(path)
}

pub async fn read_reviews(path: &Path) -> Result<Vec<String>, DatasetError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
    decode(&raw).map_err(|err| match err {
        DecodeError::MissingHeader => DatasetError::MissingHeader {
            path: path.display().to_string(),
        },
        DecodeError::UnterminatedQuote => DatasetError::UnterminatedQuote {
            path: path.display().to_string(),
        },
    })
}

fn encode(reviews: &[String]) -> String {
    let mut out = String::with_capacity(BOM.len() + HEADER.len() + 1);
    out.push_str(BOM);
    out.push_str(HEADER);
    out.push('\n');
    for review in reviews {
        out.push_str(&quote_field(review));
        out.push('\n');
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[derive(Debug, PartialEq)]
enum DecodeError {
    MissingHeader,
    UnterminatedQuote,
}

fn decode(raw: &str) -> Result<Vec<String>, DecodeError> {
    let body = raw.strip_prefix(BOM).unwrap_or(raw);
    let mut records = split_records(body)?.into_iter();

    match records.next() {
        Some(header) if header == HEADER => Ok(records.collect()),
        _ => Err(DecodeError::MissingHeader),
    }
}

fn split_records(body: &str) -> Result<Vec<String>, DecodeError> {
    let mut records = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => records.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err(DecodeError::UnterminatedQuote);
    }
    if !field.is_empty() {
        records.push(field);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bom_header_and_quotes_when_needed() {
        let encoded = encode(&[
            "맛있어요!".to_string(),
            "가격은, 괜찮아요".to_string(),
            "두 줄\n리뷰".to_string(),
        ]);

        assert!(encoded.starts_with('\u{feff}'));
        assert_eq!(
            encoded,
            "\u{feff}content\n맛있어요!\n\"가격은, 괜찮아요\"\n\"두 줄\n리뷰\"\n"
        );
    }

    #[test]
    fn empty_dataset_is_header_only() {
        assert_eq!(encode(&[]), "\u{feff}content\n");
        assert_eq!(decode("\u{feff}content\n").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn decodes_quoted_fields_and_crlf() {
        let raw = "\u{feff}content\r\n\"a, \"\"b\"\"\"\r\nplain\r\n\"multi\nline\"\r\n";
        assert_eq!(
            decode(raw).unwrap(),
            vec![
                "a, \"b\"".to_string(),
                "plain".to_string(),
                "multi\nline".to_string()
            ]
        );
    }

    #[test]
    fn rejects_foreign_header_and_open_quote() {
        assert_eq!(decode("review\nx\n"), Err(DecodeError::MissingHeader));
        assert_eq!(decode(""), Err(DecodeError::MissingHeader));
        assert_eq!(
            decode("content\n\"never closed\n"),
            Err(DecodeError::UnterminatedQuote)
        );
    }

    #[tokio::test]
    async fn write_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("files");

        write_reviews(&files, 3, &["one".into(), "two".into()])
            .await
            .unwrap();
        let path = write_reviews(&files, 3, &["three".into()]).await.unwrap();

        assert_eq!(path, files.join("review_3.csv"));
        assert_eq!(read_reviews(&path).await.unwrap(), vec!["three".to_string()]);
    }
}
