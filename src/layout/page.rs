use std::fmt;
use std::sync::Arc;

use super::article::{ArticleFragment, ArticleId};
use super::column::{Column, Occupant, SpacerId, TINY};
use crate::error::Error;
use crate::model::ItemId;

/// A vertical alley; `cols` grows as neighbouring columns share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spacer {
    pub cols: usize,
}

#[derive(Clone, Debug)]
pub enum Page {
    Columnar(ColumnarPage),
    Spread(SpreadPage),
}

impl Page {
    pub fn number(&self) -> usize {
        match self {
            Page::Columnar(p) => p.number,
            Page::Spread(s) => s.number,
        }
    }

    pub fn set_number(&mut self, number: usize) {
        match self {
            Page::Columnar(p) => p.number = number,
            Page::Spread(s) => s.number = number,
        }
    }

    /// A spread is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Page::Columnar(p) => p.is_empty(),
            Page::Spread(_) => false,
        }
    }

    pub fn as_columnar(&self) -> Option<&ColumnarPage> {
        match self {
            Page::Columnar(p) => Some(p),
            Page::Spread(_) => None,
        }
    }

    pub fn as_columnar_mut(&mut self) -> Option<&mut ColumnarPage> {
        match self {
            Page::Columnar(p) => Some(p),
            Page::Spread(_) => None,
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Columnar(p) => write!(f, "{p}"),
            Page::Spread(s) => writeln!(
                f,
                "PAGE {}\n Spread:{}{}",
                s.number,
                s.label,
                if s.rotate { " (rotated)" } else { "" }
            ),
        }
    }
}

/// A whole page given over to one item.
#[derive(Clone, Debug)]
pub struct SpreadPage {
    pub number: usize,
    pub item: ItemId,
    pub label: Arc<str>,
    pub rotate: bool,
}

#[derive(Clone, Debug)]
pub struct ColumnarPage {
    pub number: usize,
    columns: Vec<Column>,
    spacers: Vec<Spacer>,
    extra_cols: usize,
    column_height: f64,
}

impl ColumnarPage {
    pub fn new(number: usize, cols: usize, column_height: f64) -> Result<Self, Error> {
        if cols == 0 {
            return Err(Error::Placement(format!("page {number} must have columns")));
        }
        let columns = (0..cols)
            .map(|i| Column::new(column_height, i.checked_sub(1)))
            .collect();
        Ok(ColumnarPage {
            number,
            columns,
            spacers: Vec::new(),
            extra_cols: 0,
            column_height,
        })
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, i: usize) -> &Column {
        &self.columns[i]
    }

    pub fn column_height(&self) -> f64 {
        self.column_height
    }

    pub fn spacer(&self, id: SpacerId) -> Spacer {
        self.spacers[id.0]
    }

    /// Columns added beyond the ones the page was created with.
    pub fn extra_cols(&self) -> usize {
        self.extra_cols
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Column::is_blank)
    }

    /// Append a column linked to the current last one; returns its index.
    pub fn add_extra_column(&mut self) -> usize {
        let prev = self.columns.len().checked_sub(1);
        self.columns.push(Column::new(self.column_height, prev));
        self.extra_cols += 1;
        self.columns.len() - 1
    }

    pub fn place(
        &mut self,
        col: usize,
        occupant: Occupant,
        start: f64,
        end: f64,
        squash: f64,
    ) -> Result<(), Error> {
        let column = self.columns.get_mut(col).ok_or_else(|| {
            Error::Placement(format!("page {} has no column {}", self.number, col + 1))
        })?;
        column.place(occupant, start, end, squash).map(|_| ())
    }

    /// Place a vertical alley of height `alley` at `start` in column `col`.
    /// If the column to the left has a spacer starting at the same offset,
    /// that spacer is widened instead of starting a new one.
    pub fn place_spacer(
        &mut self,
        col: usize,
        start: f64,
        alley: f64,
        squash: f64,
    ) -> Result<(), Error> {
        if col >= self.columns.len() {
            return Err(Error::Placement(format!(
                "page {} has no column {}",
                self.number,
                col + 1
            )));
        }
        let id = SpacerId(self.spacers.len());
        self.spacers.push(Spacer { cols: 1 });
        let column = &mut self.columns[col];
        let at = match column.place(Occupant::Spacer(id), start, start + alley, squash) {
            Ok(at) => at,
            Err(e) => {
                self.spacers.pop();
                return Err(e);
            }
        };
        let placed_start = column.fragments()[at].start;

        let Some(prev) = self.columns[col].prev() else {
            return Ok(());
        };
        let shared = self.columns[prev].fragments().iter().find_map(|f| match &f.occupant {
            Some(Occupant::Spacer(other)) if (f.start - placed_start).abs() <= TINY => Some(*other),
            _ => None,
        });
        if let Some(other) = shared {
            self.spacers.pop();
            self.spacers[other.0].cols += 1;
            if let Some(frag) = self.columns[col].fragments_mut().nth(at) {
                frag.occupant = Some(Occupant::Spacer(other));
            }
        }
        Ok(())
    }

    /// The placed fragment holding `split` of `article`, if it is on this page.
    pub fn article_fragment_mut(
        &mut self,
        article: ArticleId,
        split: usize,
    ) -> Option<&mut ArticleFragment> {
        self.columns
            .iter_mut()
            .flat_map(|c| c.fragments_mut())
            .find_map(|f| match &mut f.occupant {
                Some(Occupant::Article(a)) if a.article == article && a.split == split => Some(a),
                _ => None,
            })
    }

    /// Every item with at least one fragment on this page.
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.columns
            .iter()
            .flat_map(|c| c.fragments())
            .filter_map(|f| f.occupant.as_ref().and_then(Occupant::item))
    }
}

impl fmt::Display for ColumnarPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PAGE {}", self.number)?;
        for (i, c) in self.columns.iter().enumerate() {
            writeln!(f, " Column{}:{c}", i + 1)?;
        }
        Ok(())
    }
}
