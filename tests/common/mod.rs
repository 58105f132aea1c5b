#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use pasteup::input::headers::Headers;
use pasteup::layout::{ArticleFragment, Column, ColumnarPage, FixedRef, Occupant, Page};
use pasteup::measure::{LengthOracle, MeasureRequest};
use pasteup::model::{FixedBlock, Item, ItemId, ItemKind, Span};
use pasteup::{Error, Settings};

/// A compact page: 6 columns of 50bp with 10bp alleys, 100bp tall.
pub const SMALL: &[(&str, &str)] = &[
    ("pageWidth", "400bp"),
    ("pageHeight", "200bp"),
    ("columnWidth", "50bp"),
    ("columnHeight", "100bp"),
    ("alleyWidth", "10bp"),
    ("alleyHeight", "5bp"),
    ("minSideMargins", "0bp"),
    ("squash", "2bp"),
];

pub fn settings_with(extra: &[(&str, &str)]) -> Settings {
    let mut props: BTreeMap<String, String> = SMALL
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (k, v) in extra {
        props.insert(k.to_string(), v.to_string());
    }
    Settings::from_properties(&props).expect("valid test settings")
}

pub fn small_settings() -> Settings {
    settings_with(&[])
}

/// Answers from a table keyed by item path; everything else gets `default`.
/// Every request is recorded.
pub struct ScriptedOracle {
    lengths: HashMap<String, f64>,
    default: f64,
    pub calls: Mutex<Vec<(String, f64, usize)>>,
}

impl ScriptedOracle {
    pub fn new(lengths: &[(&str, f64)]) -> Self {
        ScriptedOracle {
            lengths: lengths.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            default: 0.0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, key: &str) -> Vec<(String, f64, usize)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.0 == key)
            .cloned()
            .collect()
    }
}

impl LengthOracle for ScriptedOracle {
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((req.key.to_string(), req.width, req.prior_splits.len()));
        Ok(self.lengths.get(req.key).copied().unwrap_or(self.default))
    }
}

fn item(id: usize, name: &str, kind: ItemKind, headers: &[(&str, &str)]) -> Item {
    let path = PathBuf::from(name);
    let headers = Headers::from_pairs(&path, headers.iter().copied());
    let target_page = headers.target_page().expect("valid Page header");
    let column_hint = headers.column_hint().expect("valid ColumnHint header");
    Item {
        id: ItemId(id),
        path,
        headers,
        body: Arc::from("Some text to set."),
        modified: None,
        kind,
        target_page,
        column_hint,
    }
}

pub fn article(id: usize, name: &str) -> Item {
    item(id, name, ItemKind::Article, &[("Type", "article")])
}

pub fn article_with(id: usize, name: &str, headers: &[(&str, &str)]) -> Item {
    item(id, name, ItemKind::Article, headers)
}

pub fn insert(id: usize, name: &str, span: Span, height: f64) -> Item {
    item(id, name, ItemKind::Insert { span, height }, &[("Type", "fixed")])
}

pub fn head_span(id: usize, name: &str, cols: usize) -> Item {
    item(id, name, ItemKind::HeadSpan { cols }, &[("Type", "headspan")])
}

pub fn spread(id: usize, name: &str, rotate: bool) -> Item {
    let headers: &[(&str, &str)] = if rotate {
        &[("Type", "spread"), ("Rotate", "true")]
    } else {
        &[("Type", "spread")]
    };
    item(id, name, ItemKind::Spread { rotate }, headers)
}

pub fn block(id: usize, span: Span, height: f64, hint: Option<usize>) -> FixedBlock {
    FixedBlock {
        item: ItemId(id),
        path: PathBuf::from(format!("block{id}.tex")),
        label: format!("block{id}").into(),
        span,
        height,
        column_hint: hint,
    }
}

pub fn fixed(id: usize, cols: usize) -> Occupant {
    Occupant::Fixed(FixedRef {
        item: ItemId(id),
        label: format!("fixed{id}").into(),
        cols,
    })
}

/// Fragments tile the column from 0 to its height without gaps or overlaps.
pub fn assert_tiled(column: &Column) {
    let frags = column.fragments();
    assert!(!frags.is_empty(), "column has no fragments");
    assert!(frags[0].start.abs() < 1e-9, "first fragment starts at {}", frags[0].start);
    for pair in frags.windows(2) {
        assert!(
            (pair[0].end - pair[1].start).abs() < 1e-9,
            "gap or overlap between {} and {}",
            pair[0],
            pair[1]
        );
    }
    for f in frags {
        assert!(f.end > f.start, "empty extent {f}");
    }
    let last = frags[frags.len() - 1].end;
    assert!((last - column.height()).abs() < 1e-9, "column ends at {last}");
}

pub fn assert_page_tiled(page: &Page) {
    if let Some(p) = page.as_columnar() {
        for c in p.columns() {
            assert_tiled(c);
        }
    }
}

pub fn article_fragments(page: &ColumnarPage, col: usize) -> Vec<ArticleFragment> {
    page.column(col)
        .fragments()
        .iter()
        .filter_map(|f| match &f.occupant {
            Some(Occupant::Article(a)) => Some(a.clone()),
            _ => None,
        })
        .collect()
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!(
        "pasteup-{name}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub fn write_file(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write test file");
    path
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
