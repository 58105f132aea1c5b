//! Setting splittable articles into the gaps of a page.

use super::article::{Article, ArticleFragment, ArticleId, Overflow};
use super::column::{Occupant, TINY};
use super::page::ColumnarPage;
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::measure::{LengthOracle, MeasureRequest};
use crate::settings::Settings;

/// A remeasured remainder this small means the article is already all set.
pub const EPSILON: f64 = 1e-3;

/// Heights of the "continued" notes, measured once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Annotations {
    pub continued_from: f64,
    pub continued_on: f64,
}

impl Annotations {
    /// Notes take no room at all.
    pub fn none() -> Self {
        Annotations::default()
    }

    pub fn measure(settings: &Settings, oracle: &dyn LengthOracle) -> Self {
        let height = |key: &str, template: &str| {
            let text = template.replace("{page}", "99");
            let req = MeasureRequest {
                key,
                width: settings.column_width,
                prior_splits: &[],
                content: &text,
                modified: None,
            };
            match oracle.measure(&req) {
                Ok(len) if len.is_finite() && len > 0.0 => len,
                Ok(_) => 0.0,
                Err(e) => {
                    log::warn!("Cannot measure {key} note, leaving it out: {e}");
                    0.0
                }
            }
        };
        Annotations {
            continued_from: height("continued-from", &settings.continued_from_text),
            continued_on: height("continued-on", &settings.continued_on_text),
        }
    }
}

/// Everything placement needs besides the page and the article.
pub struct FlowCx<'a> {
    pub settings: &'a Settings,
    pub oracle: &'a dyn LengthOracle,
    pub notes: Annotations,
    pub diag: &'a mut dyn Diagnostics,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlowOutcome {
    /// The whole article is on the page.
    Complete,
    /// Part of it is; the rest goes on a later page.
    Overflow(Overflow),
    /// The page had no usable gap.
    Unplaced,
    /// No empty fragment is left anywhere on the page.
    PageFull,
}

/// The empty fragment with the greatest height on the page, as
/// `(column, start, end)`. Leftmost column wins a tie.
pub fn worst_fit(page: &ColumnarPage) -> Option<(usize, f64, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (i, col) in page.columns().iter().enumerate() {
        let Some(f) = col.longest_empty() else {
            continue;
        };
        match best {
            Some((_, s, e)) if e - s >= f.height() => {}
            _ => best = Some((i, f.start, f.end)),
        }
    }
    best
}

/// Set a fresh article into the largest gap on the page, falling back to
/// [`place_first_fit`] when it doesn't fit there whole.
pub fn place_flowable(
    page: &mut ColumnarPage,
    article: &mut Article,
    id: ArticleId,
    max_cols: usize,
    cx: &mut FlowCx<'_>,
) -> Result<FlowOutcome, Error> {
    let Some((col, gap_start, gap_end)) = worst_fit(page) else {
        cx.diag.algorithm("Exactly filled page!");
        return Ok(FlowOutcome::PageFull);
    };
    let settings = cx.settings;
    let length = article.remaining();
    let alley = if gap_start > TINY {
        settings.alley_height
    } else {
        0.0
    };
    let usable = gap_end - gap_start - alley;
    cx.diag.algorithm(&format!(
        "Setting fragment-able article {article} ({length:.3}pt) into {usable:.3}pt gap of column {}",
        col + 1
    ));

    if usable > TINY && usable + TINY >= length {
        let split = article.split(length);
        let mut start = gap_start;
        if alley > 0.0 {
            page.place_spacer(col, start, alley, settings.squash)?;
            start += alley;
        }
        let stretched = length >= settings.stretch_ratio * usable;
        let end = if stretched { gap_end } else { start + length };
        let mut frag = ArticleFragment::new(article, id, split, length);
        frag.stretched = stretched;
        cx.diag.elements(&format!("{frag} at {start:.3}-{end:.3}"));
        page.place(col, Occupant::Article(frag), start, end, settings.squash)?;
        return Ok(FlowOutcome::Complete);
    }

    place_first_fit(page, article, id, length, None, max_cols, cx)
}

/// Set `length` of `article` column by column from the left, starting in
/// each column's first gap. Grows the page up to `max_cols` columns when it
/// runs out. `continued_from` is the page an earlier slice ended on.
pub fn place_first_fit(
    page: &mut ColumnarPage,
    article: &mut Article,
    id: ArticleId,
    length: f64,
    continued_from: Option<usize>,
    max_cols: usize,
    cx: &mut FlowCx<'_>,
) -> Result<FlowOutcome, Error> {
    let settings = cx.settings;
    let alley_height = settings.alley_height;
    let mut remaining = length;
    let mut last_split: Option<usize> = None;
    let mut col = 0;

    loop {
        if col >= page.num_cols() {
            if page.num_cols() >= max_cols {
                break;
            }
            let added = page.add_extra_column();
            cx.diag.elements(&format!(
                "Added column {} to page {} for {article}",
                added + 1,
                page.number
            ));
        }
        let Some(gap) = page.column(col).first_empty() else {
            col += 1;
            continue;
        };
        let (gap_start, gap_end) = (gap.start, gap.end);
        let alley = if gap_start > TINY { alley_height } else { 0.0 };
        let space = gap_end - gap_start - alley;
        if space <= alley_height {
            col += 1;
            continue;
        }

        let first = last_split.is_none();
        let reserve = match continued_from {
            Some(_) if first => cx.notes.continued_from,
            _ => 0.0,
        };

        let mut take = space - reserve;
        if space + TINY >= remaining + reserve {
            // line breaks land differently once the earlier cuts are known
            remaining = article.remeasure(cx.oracle)?;
            if remaining <= EPSILON {
                cx.diag
                    .algorithm(&format!(" - {article} already fully set after remeasuring"));
                if last_split.is_none() {
                    article.cancel_continuation();
                }
                return Ok(FlowOutcome::Complete);
            }
            if space + TINY >= remaining + reserve {
                take = remaining;
            }
        }
        if take <= TINY {
            col += 1;
            continue;
        }

        let split = article.split(take);
        let mut start = gap_start;
        if alley > 0.0 {
            page.place_spacer(col, start, alley, settings.squash)?;
            start += alley;
        }
        let end = (start + take + reserve).min(gap_end);
        let mut frag = ArticleFragment::new(article, id, split, take);
        frag.reserved = reserve;
        if first {
            frag.continued_from = continued_from;
        }
        cx.diag.elements(&format!(
            "{frag} in column {} at {start:.3}-{end:.3}",
            col + 1
        ));
        page.place(col, Occupant::Article(frag), start, end, settings.squash)?;
        remaining -= take;
        last_split = Some(split);
        if remaining <= EPSILON {
            return Ok(FlowOutcome::Complete);
        }
        col += 1;
    }

    let Some(split) = last_split else {
        cx.diag
            .algorithm(&format!(" - no room for {article} on page {}", page.number));
        return Ok(FlowOutcome::Unplaced);
    };

    // make room at the foot of the last slice for the "continued on" note
    let taken = article.reduce_split(split, cx.notes.continued_on);
    if taken > 0.0 {
        remaining += taken;
        if let Some(frag) = page.article_fragment_mut(id, split) {
            frag.height -= taken;
            frag.reserved += taken;
        }
    }
    let overflow = article.create_overflow(id, remaining, page.number);
    cx.diag.algorithm(&format!(" - {overflow}"));
    Ok(FlowOutcome::Overflow(overflow))
}
