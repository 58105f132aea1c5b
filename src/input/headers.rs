use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::settings::parse_properties;
use crate::units::{Length, parse_length};

/// Headers are only looked for near the top of a file.
pub const HEADER_SCAN_LINES: usize = 50;
const HEADER_PREFIX: &str = "%#";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemType {
    Article,
    Fixed,
    HeadSpan,
    Title,
    Spread,
}

/// How an input's body is to be typeset, from the `Mode` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Latex,
    /// Punctuation is taken literally.
    Plain,
    Markdown,
}

/// Per-item `%#Key=value` headers.
#[derive(Clone, Debug)]
pub struct Headers {
    path: PathBuf,
    map: BTreeMap<String, String>,
}

impl Headers {
    /// Split `text` into headers and body. Header lines are dropped from the body.
    pub fn parse(path: &Path, text: &str) -> (Headers, String) {
        let mut header_text = String::new();
        let mut body = String::with_capacity(text.len());
        for (i, line) in text.lines().enumerate() {
            match line.strip_prefix(HEADER_PREFIX) {
                Some(h) if i < HEADER_SCAN_LINES => {
                    header_text.push_str(h);
                    header_text.push('\n');
                }
                _ => {
                    body.push_str(line);
                    body.push('\n');
                }
            }
        }
        let headers = Headers {
            path: path.to_path_buf(),
            map: parse_properties(&header_text),
        };
        (headers, body)
    }

    pub fn from_pairs<'a>(path: &Path, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Headers {
            path: path.to_path_buf(),
            map: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A header's trimmed value; blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn item_type(&self) -> Option<ItemType> {
        match self.get("Type")?.to_ascii_lowercase().as_str() {
            "article" => Some(ItemType::Article),
            "fixed" | "insert" => Some(ItemType::Fixed),
            "headspan" => Some(ItemType::HeadSpan),
            "title" => Some(ItemType::Title),
            "truck" | "spread" => Some(ItemType::Spread),
            _ => None,
        }
    }

    /// Unknown modes fall back to LaTeX.
    pub fn input_mode(&self) -> InputMode {
        match self.get("Mode").map(str::to_ascii_lowercase).as_deref() {
            Some("markdown") => InputMode::Markdown,
            Some("plain") => InputMode::Plain,
            _ => InputMode::Latex,
        }
    }

    fn bad(&self, msg: String) -> Error {
        Error::Header {
            path: self.path.clone(),
            msg,
        }
    }

    pub fn integer(&self, key: &str, min: i64, max: i64) -> Result<Option<i64>, Error> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let value: i64 = raw.parse().map_err(|_| {
            self.bad(format!(
                "Bad header value [{raw}] for [{key}]; not a valid integer in range {min}-{max}"
            ))
        })?;
        if value < min || value > max {
            return Err(self.bad(format!(
                "Bad header value [{raw}] for [{key}]; not in range {min}-{max}"
            )));
        }
        Ok(Some(value))
    }

    pub fn length(&self, key: &str) -> Result<Option<Length>, Error> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse_length(raw)
                .map(Some)
                .map_err(|e| self.bad(format!("Bad length [{raw}] for [{key}]: {e}"))),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// `Page`: positive is the first page the item may appear on, negative counts from the end.
    pub fn target_page(&self) -> Result<Option<i64>, Error> {
        self.integer("Page", i64::MIN + 1, i64::MAX)
    }

    /// `ColumnHint`: preferred first column, 1-based.
    pub fn column_hint(&self) -> Result<Option<usize>, Error> {
        Ok(self.integer("ColumnHint", 0, i64::MAX)?.map(|v| v as usize))
    }

    /// `Cols`: required span of a head-span article.
    pub fn cols(&self) -> Result<usize, Error> {
        match self.integer("Cols", 1, i64::MAX)? {
            Some(c) => Ok(c as usize),
            None => Err(self.bad(
                "HeadSpan article: 'Cols' header must exist and be a positive number of columns"
                    .into(),
            )),
        }
    }

    pub fn preamble_lines(&self) -> Vec<String> {
        self.map
            .iter()
            .filter(|(k, _)| k.starts_with("Preamble"))
            .map(|(_, v)| v.clone())
            .collect()
    }
}
