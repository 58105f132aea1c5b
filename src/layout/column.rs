use std::fmt;
use std::sync::Arc;

use super::article::ArticleFragment;
use crate::error::Error;
use crate::model::ItemId;

/// Offsets closer than this are the same offset.
pub(crate) const TINY: f64 = 1e-6;

/// Index of a vertical spacer in its page's spacer table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpacerId(pub usize);

#[derive(Clone, Debug)]
pub struct FixedRef {
    pub item: ItemId,
    pub label: Arc<str>,
    pub cols: usize,
}

/// What fills an occupied fragment.
#[derive(Clone, Debug)]
pub enum Occupant {
    Article(ArticleFragment),
    /// Inserts, titles and head-span articles; repeated in every column they cover.
    Fixed(FixedRef),
    /// Vertical alley between stacked items.
    Spacer(SpacerId),
}

impl Occupant {
    /// Column-spanning things don't get the rule between columns.
    pub fn skips_alley(&self) -> bool {
        !matches!(self, Occupant::Article(_))
    }

    pub fn item(&self) -> Option<ItemId> {
        match self {
            Occupant::Article(a) => Some(a.item),
            Occupant::Fixed(f) => Some(f.item),
            Occupant::Spacer(_) => None,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occupant::Article(a) => write!(f, "{a}"),
            Occupant::Fixed(x) => write!(f, "[Fixed:{}({} cols)]", x.label, x.cols),
            Occupant::Spacer(id) => write!(f, "V-mode alley#{}", id.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Fragment {
    pub start: f64,
    pub end: f64,
    pub occupant: Option<Occupant>,
}

impl Fragment {
    pub fn height(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.occupant {
            None => write!(f, "Fragment empty@[{:.3}-{:.3}]", self.start, self.end),
            Some(o) => write!(f, "Fragment for part {o}@[{:.3}-{:.3}]", self.start, self.end),
        }
    }
}

/// One column of a page: fragments tiling `[0, height]` without gaps.
#[derive(Clone, Debug)]
pub struct Column {
    fragments: Vec<Fragment>,
    height: f64,
    prev: Option<usize>,
}

impl Column {
    pub fn new(height: f64, prev: Option<usize>) -> Self {
        Column {
            fragments: vec![Fragment {
                start: 0.0,
                end: height,
                occupant: None,
            }],
            height,
            prev,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Index of the column to the left, for spacer merging.
    pub fn prev(&self) -> Option<usize> {
        self.prev
    }

    pub fn is_blank(&self) -> bool {
        self.fragments.len() == 1 && self.fragments[0].is_empty()
    }

    pub fn first_empty(&self) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.is_empty())
    }

    /// Tallest empty fragment; the first one wins a tie.
    pub fn longest_empty(&self) -> Option<&Fragment> {
        self.fragments
            .iter()
            .filter(|f| f.is_empty())
            .fold(None, |best: Option<&Fragment>, f| match best {
                Some(b) if b.height() >= f.height() => Some(b),
                _ => Some(f),
            })
    }

    pub(crate) fn fragments_mut(&mut self) -> impl Iterator<Item = &mut Fragment> {
        self.fragments.iter_mut()
    }

    /// Put `occupant` at `[start, end)`, carving it out of the empty fragment
    /// that covers that range. A leading gap narrower than `squash` is folded
    /// into the placed fragment; the trailing gap stays empty. Returns the
    /// index of the new fragment.
    pub fn place(
        &mut self,
        occupant: Occupant,
        start: f64,
        end: f64,
        squash: f64,
    ) -> Result<usize, Error> {
        if end - start <= TINY {
            return Err(Error::Placement(format!(
                "0-height fragment {occupant} at {start:.3}-{end:.3}"
            )));
        }
        let Some(i) = self
            .fragments
            .iter()
            .position(|f| f.is_empty() && f.start <= start + TINY && f.end >= end - TINY)
        else {
            return Err(Error::Placement(format!(
                "no empty fragment covers {start:.3}-{end:.3} for {occupant} in {self}"
            )));
        };
        let gap = self.fragments.remove(i);
        let mut at = i;

        let lead = start - gap.start;
        let start = if lead > TINY && lead >= squash {
            self.fragments.insert(
                at,
                Fragment {
                    start: gap.start,
                    end: start,
                    occupant: None,
                },
            );
            at += 1;
            start
        } else {
            gap.start
        };

        let end = if gap.end - end > TINY { end } else { gap.end };
        self.fragments.insert(
            at,
            Fragment {
                start,
                end,
                occupant: Some(occupant),
            },
        );
        if end < gap.end {
            self.fragments.insert(
                at + 1,
                Fragment {
                    start: end,
                    end: gap.end,
                    occupant: None,
                },
            );
        }
        Ok(at)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, frag) in self.fragments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{frag}")?;
        }
        write!(f, "]")
    }
}
