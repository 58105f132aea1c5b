use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::Error;
use crate::measure::{LengthOracle, MeasureRequest};
use crate::model::{Item, ItemId};

/// Handle into the engine's article table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArticleId(pub usize);

/// A splittable text and the history of where it has been cut.
#[derive(Clone, Debug)]
pub struct Article {
    pub item: ItemId,
    pub path: PathBuf,
    pub label: Arc<str>,
    pub width: f64,
    content: Arc<str>,
    modified: Option<SystemTime>,
    total: f64,
    splits: Vec<f64>,
    split_counter: usize,
    /// split index -> page its successor continues on
    continued_on: BTreeMap<usize, usize>,
}

impl Article {
    pub fn new(item: &Item, width: f64, total: f64) -> Self {
        Article {
            item: item.id,
            path: item.path.clone(),
            label: item.label(),
            width,
            content: Arc::clone(&item.body),
            modified: item.modified,
            total,
            splits: Vec::new(),
            split_counter: 0,
            continued_on: BTreeMap::new(),
        }
    }

    /// Most recently measured total length.
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn splits(&self) -> &[f64] {
        &self.splits
    }

    pub fn split_count(&self) -> usize {
        self.split_counter
    }

    pub fn committed(&self) -> f64 {
        self.splits.iter().sum()
    }

    /// Length not yet committed to any box, by the last measurement.
    pub fn remaining(&self) -> f64 {
        (self.total - self.committed()).max(0.0)
    }

    pub fn continued_on(&self, split: usize) -> Option<usize> {
        self.continued_on.get(&split).copied()
    }

    /// Ask the oracle again, now that line breaks at the committed splits
    /// are known. Returns the new remainder.
    pub fn remeasure(&mut self, oracle: &dyn LengthOracle) -> Result<f64, Error> {
        let key = self.path.to_string_lossy();
        let total = oracle.measure(&MeasureRequest {
            key: &key,
            width: self.width,
            prior_splits: &self.splits,
            content: &self.content,
            modified: self.modified,
        })?;
        if !total.is_finite() {
            return Err(Error::Measure {
                key: key.into_owned(),
                msg: format!("not a length: {total}"),
            });
        }
        if total <= 0.0 {
            return Err(Error::ZeroLength(self.path.clone()));
        }
        self.total = total;
        Ok(self.remaining())
    }

    /// Commit `length` as the next slice; returns its split index.
    pub fn split(&mut self, length: f64) -> usize {
        self.splits.push(length);
        self.split_counter += 1;
        self.split_counter - 1
    }

    /// Shorten a committed slice, e.g. to make room for an annotation.
    /// Returns how much was actually taken off.
    pub fn reduce_split(&mut self, split: usize, by: f64) -> f64 {
        let Some(len) = self.splits.get_mut(split) else {
            return 0.0;
        };
        let taken = by.min(*len).max(0.0);
        *len -= taken;
        taken
    }

    /// Record that the text after the latest slice continues on the page
    /// after `page`, and hand back the rest as an overflow.
    pub fn create_overflow(&mut self, id: ArticleId, remaining: f64, page: usize) -> Overflow {
        if self.split_counter > 0 {
            self.continued_on.insert(self.split_counter - 1, page + 1);
        }
        Overflow {
            article: id,
            remaining,
            split: self.split_counter,
            from_page: page,
        }
    }

    /// The rest is about to be set on `page`; point the latest slice's
    /// "continued on" there.
    pub fn continue_on(&mut self, page: usize) {
        if self.split_counter > 0 {
            self.continued_on.insert(self.split_counter - 1, page);
        }
    }

    /// The continuation promised by the latest slice turned out to be empty.
    pub fn cancel_continuation(&mut self) {
        if self.split_counter > 0 {
            self.continued_on.remove(&(self.split_counter - 1));
        }
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// One committed slice of an article as placed in a column.
#[derive(Clone, Debug)]
pub struct ArticleFragment {
    pub article: ArticleId,
    pub item: ItemId,
    pub label: Arc<str>,
    pub split: usize,
    /// Text set in this slice.
    pub height: f64,
    /// Space held back for continuation notes.
    pub reserved: f64,
    pub continued_from: Option<usize>,
    /// Text is spread out to the bottom of the fragment.
    pub stretched: bool,
}

impl ArticleFragment {
    pub fn new(article: &Article, id: ArticleId, split: usize, height: f64) -> Self {
        ArticleFragment {
            article: id,
            item: article.item,
            label: Arc::clone(&article.label),
            split,
            height,
            reserved: 0.0,
            continued_from: None,
            stretched: false,
        }
    }
}

impl fmt::Display for ArticleFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{} => {:.3}pt]", self.label, self.split, self.height)
    }
}

/// What is left of an article when a page filled up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overflow {
    pub article: ArticleId,
    pub remaining: f64,
    /// Index the next slice will get.
    pub split: usize,
    /// Page the previous slice ended on.
    pub from_page: usize,
}

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Overflowing: last {:.3}pt of article #{} from page {}",
            self.remaining, self.article.0, self.from_page
        )
    }
}
