use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::input::headers::Headers;
use crate::settings::Settings;

/// Index of an input item, in load order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// Can be split across columns and pages.
    Flowable,
    /// Placed whole, spanning one or more columns.
    FixedSize,
    /// Takes a page by itself.
    WholePage,
}

/// Horizontal extent of a fixed block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Span {
    /// Every column of the page it lands on.
    Fill,
    Width(f64),
    Columns(usize),
}

#[derive(Clone, Debug)]
pub enum ItemKind {
    Article,
    Insert { span: Span, height: f64 },
    /// Splittable text set as a single fixed block; its height is measured.
    HeadSpan { cols: usize },
    /// Like an insert, but never honours a column hint.
    Title { span: Span, height: f64 },
    Spread { rotate: bool },
}

#[derive(Clone, Debug)]
pub struct Item {
    pub id: ItemId,
    pub path: PathBuf,
    pub headers: Headers,
    pub body: Arc<str>,
    pub modified: Option<SystemTime>,
    pub kind: ItemKind,
    pub target_page: Option<i64>,
    /// 1-based, as written in the header.
    pub column_hint: Option<usize>,
}

impl Item {
    pub fn capability(&self) -> Capability {
        match self.kind {
            ItemKind::Article => Capability::Flowable,
            ItemKind::Insert { .. } | ItemKind::HeadSpan { .. } | ItemKind::Title { .. } => {
                Capability::FixedSize
            }
            ItemKind::Spread { .. } => Capability::WholePage,
        }
    }

    /// Short name used in traces and proof labels.
    pub fn label(&self) -> Arc<str> {
        display_name(&self.path).into()
    }

    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ItemKind::Article => "Article",
            ItemKind::Insert { .. } => "Insert",
            ItemKind::HeadSpan { .. } => "HeadSpan",
            ItemKind::Title { .. } => "Title",
            ItemKind::Spread { .. } => "Spread",
        }
    }

    /// Preamble contributed by this item; rotated spreads need the rotation package.
    pub fn preamble_lines(&self) -> Vec<String> {
        let mut lines = self.headers.preamble_lines();
        if let ItemKind::Spread { rotate: true } = self.kind {
            lines.push("\\usepackage{pdflscape}".to_string());
            lines.push("\\usepackage{afterpage}".to_string());
        }
        lines
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.type_name(), display_name(&self.path))
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A non-splittable block handed to the fixed-element packer.
#[derive(Clone, Debug)]
pub struct FixedBlock {
    pub item: ItemId,
    pub path: PathBuf,
    pub label: Arc<str>,
    pub span: Span,
    pub height: f64,
    /// 0-based preferred first column.
    pub column_hint: Option<usize>,
}

impl FixedBlock {
    pub fn is_full_width(&self) -> bool {
        self.span == Span::Fill
    }

    /// Columns this block occupies on a page of `page_cols` columns.
    pub fn cols(&self, page_cols: usize, settings: &Settings) -> usize {
        let cols = match self.span {
            Span::Fill => page_cols,
            Span::Columns(c) => c,
            Span::Width(w) => width_to_columns(w, settings.alley_width, settings.column_width),
        };
        cols.max(1)
    }
}

/// Number of columns needed to hold `width`. Whole column+alley pairs are
/// counted first; what is left rounds up to one, two or three more columns.
pub fn width_to_columns(width: f64, alley_width: f64, column_width: f64) -> usize {
    let pitch = alley_width + column_width;
    let whole = ((width / pitch).floor() as i64 - 1).max(0);
    let remainder = width - whole as f64 * pitch;
    let extra = if remainder <= 0.0 {
        0
    } else if remainder <= column_width {
        1
    } else if remainder <= 2.0 * column_width + alley_width {
        2
    } else {
        3
    };
    whole as usize + extra
}
