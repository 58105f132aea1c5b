//! Drives the layout: one page at a time, each through a fixed sequence of
//! stages, until nothing is left to set.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use rayon::prelude::*;

use super::article::{Article, ArticleId, Overflow};
use super::estimate::Estimate;
use super::flow::{self, Annotations, FlowCx, FlowOutcome};
use super::packer::FixedPacker;
use super::page::{ColumnarPage, Page, SpreadPage};
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::input::headers::InputMode;
use crate::measure::{LengthOracle, MeasureRequest};
use crate::model::{Capability, FixedBlock, Item, ItemId, ItemKind, Span};
use crate::settings::{Settings, describe};

/// Pages appended beyond every other bound before giving up.
const SPARE_PAGES: usize = 16;

/// What a page is doing next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    SelectCandidates,
    PackFixed,
    DeferFixed,
    PlaceOverflow,
    PlaceFlowable,
    DeferFlowable,
    Done,
}

/// Working set of one page.
#[derive(Default)]
struct PageRun {
    fixed: Vec<ItemId>,
    flowables: VecDeque<ItemId>,
    /// Goes back to the front of the queue once the page is done.
    returned: Vec<ItemId>,
    /// Most columns the page may grow to.
    cap: usize,
}

/// The finished paper.
#[derive(Debug)]
pub struct Layout {
    pub pages: Vec<Page>,
    pub articles: Vec<Article>,
    pub items: Vec<Item>,
    pub preamble: Vec<String>,
}

impl Layout {
    pub fn item(&self, id: ItemId) -> &Item {
        &self.items[id.0]
    }

    pub fn article(&self, id: ArticleId) -> &Article {
        &self.articles[id.0]
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for page in &self.pages {
            write!(f, "{page}")?;
        }
        Ok(())
    }
}

pub struct Engine<'a> {
    settings: &'a Settings,
    oracle: &'a dyn LengthOracle,
    diag: &'a mut dyn Diagnostics,
    notes: Annotations,
    items: Vec<Item>,
    areas: Vec<f64>,
    article_of: Vec<Option<ArticleId>>,
    articles: Vec<Article>,
    blocks: Vec<Option<FixedBlock>>,
    pending: VecDeque<ItemId>,
    pages: Vec<Page>,
    overflow: Option<Overflow>,
    estimate: Estimate,
    page_limit: usize,
}

impl<'a> Engine<'a> {
    /// Measure every item, size the paper and lay out the initial pages
    /// (still empty).
    pub fn new(
        settings: &'a Settings,
        mut items: Vec<Item>,
        oracle: &'a dyn LengthOracle,
        diag: &'a mut dyn Diagnostics,
    ) -> Result<Self, Error> {
        for (i, item) in items.iter_mut().enumerate() {
            item.id = ItemId(i);
        }

        let lengths = items
            .par_iter()
            .map(|item| measure_item(item, settings, oracle))
            .collect::<Result<Vec<f64>, Error>>()?;

        let max_cols = settings.max_cols_per_page();
        let mut total = 0.0;
        for (item, &len) in items.iter().zip(&lengths) {
            diag.elements(&format!("{item} estimated at {len:.3}pt"));
            total += match fixed_span(item) {
                Some(span) => {
                    if len > settings.column_height {
                        return Err(Error::TooTall {
                            path: item.path.clone(),
                            height: len,
                            column_height: settings.column_height,
                        });
                    }
                    len * span_cols(span, max_cols, settings) as f64
                }
                None => len,
            };
        }

        let estimate = Estimate::calculate(
            settings.column_strategy,
            total,
            settings.column_height,
            max_cols,
        );
        diag.algorithm(&format!("Estimated {} of content: {estimate}", describe(total)));

        let mut areas = Vec::with_capacity(items.len());
        let mut article_of = Vec::with_capacity(items.len());
        let mut articles = Vec::new();
        let mut blocks = Vec::with_capacity(items.len());
        for (item, &len) in items.iter().zip(&lengths) {
            let (area, article, block) = match &item.kind {
                ItemKind::Article => {
                    let id = ArticleId(articles.len());
                    articles.push(Article::new(item, settings.column_width, len));
                    (settings.column_width * len, Some(id), None)
                }
                ItemKind::Spread { .. } => (0.0, None, None),
                kind => {
                    let span = match kind {
                        ItemKind::HeadSpan { cols } => Span::Columns(*cols),
                        ItemKind::Insert { span, .. } | ItemKind::Title { span, .. } => *span,
                        _ => Span::Fill,
                    };
                    let width = match span {
                        Span::Fill => settings.span_width(estimate.cols_per_page),
                        Span::Width(w) => w,
                        Span::Columns(c) => settings.span_width(c),
                    };
                    let hint = match kind {
                        ItemKind::Title { .. } => None,
                        _ => item.column_hint.map(|h| h - 1),
                    };
                    let block = FixedBlock {
                        item: item.id,
                        path: item.path.clone(),
                        label: item.label(),
                        span,
                        height: len,
                        column_hint: hint,
                    };
                    (width * len, None, Some(block))
                }
            };
            areas.push(area);
            article_of.push(article);
            blocks.push(block);
        }

        let mut pages = Vec::new();
        for (i, cols) in estimate
            .initial_page_columns(max_cols)
            .into_iter()
            .enumerate()
        {
            pages.push(Page::Columnar(ColumnarPage::new(
                i + 1,
                cols,
                settings.column_height,
            )?));
        }

        let max_target = items
            .iter()
            .filter_map(|i| i.target_page)
            .filter(|&p| p > 0)
            .max()
            .unwrap_or(0) as usize;
        let page_limit = pages.len() + items.len() + max_target + SPARE_PAGES;
        let pending = items.iter().map(|i| i.id).collect();
        let notes = Annotations::measure(settings, oracle);

        Ok(Engine {
            settings,
            oracle,
            diag,
            notes,
            items,
            areas,
            article_of,
            articles,
            blocks,
            pending,
            pages,
            overflow: None,
            estimate,
            page_limit,
        })
    }

    /// Replace the measured "continued" note heights.
    pub fn with_annotations(mut self, notes: Annotations) -> Self {
        self.notes = notes;
        self
    }

    pub fn estimate(&self) -> Estimate {
        self.estimate
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut Vec<Page> {
        &mut self.pages
    }

    pub fn pending(&self) -> &VecDeque<ItemId> {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut VecDeque<ItemId> {
        &mut self.pending
    }

    pub fn overflow(&self) -> Option<Overflow> {
        self.overflow
    }

    pub fn set_overflow(&mut self, overflow: Option<Overflow>) {
        self.overflow = overflow;
    }

    pub fn article(&self, id: ArticleId) -> &Article {
        &self.articles[id.0]
    }

    pub fn article_for(&self, item: ItemId) -> Option<ArticleId> {
        self.article_of.get(item.0).copied().flatten()
    }

    fn has_data(&self) -> bool {
        !self.pending.is_empty() || self.overflow.is_some()
    }

    /// Lay out the whole paper, then trim and check it.
    pub fn run(mut self) -> Result<Layout, Error> {
        let max_cols = self.settings.max_cols_per_page();
        let mut idx = 0;
        while self.has_data() {
            if idx >= self.pages.len() {
                if self.pages.len() >= self.page_limit {
                    return Err(Error::NoProgress {
                        pages: self.pages.len(),
                    });
                }
                let page = ColumnarPage::new(
                    idx + 1,
                    self.estimate.cols_per_page,
                    self.settings.column_height,
                )?;
                self.diag.elements(&format!(
                    "Adding page {} for {} pending inputs",
                    idx + 1,
                    self.pending.len()
                ));
                self.pages.push(Page::Columnar(page));
            }
            self.pages[idx].set_number(idx + 1);
            if let Some(page) = self.pages[idx].as_columnar() {
                let allow = max_cols.saturating_sub(page.num_cols());
                self.layout_page(idx, allow)?;
            }
            idx += 1;

            while let Some(&front) = self.pending.front()
                && let ItemKind::Spread { rotate } = self.items[front.0].kind
            {
                self.pending.pop_front();
                let item = &self.items[front.0];
                self.diag
                    .algorithm(&format!("Inserting {item} as page {}", idx + 1));
                self.pages.insert(
                    idx,
                    Page::Spread(SpreadPage {
                        number: idx + 1,
                        item: front,
                        label: item.label(),
                        rotate,
                    }),
                );
                idx += 1;
            }
        }

        for (i, page) in self.pages.iter_mut().enumerate() {
            page.set_number(i + 1);
        }
        self.trim_empty_pages();
        self.diag.algorithm("Layout done");
        self.validate()?;

        let mut preamble = self.settings.preamble.clone();
        if self
            .items
            .iter()
            .any(|i| i.headers.input_mode() == InputMode::Markdown)
        {
            preamble.push(self.settings.markdown.clone());
        }
        for item in &self.items {
            preamble.extend(item.preamble_lines());
        }
        Ok(Layout {
            pages: self.pages,
            articles: self.articles,
            items: self.items,
            preamble,
        })
    }

    /// Drop empty pages from the end. Pages in the middle stay so that page
    /// numbers asked for in headers still hold.
    pub fn trim_empty_pages(&mut self) {
        while self.pages.last().is_some_and(Page::is_empty) {
            self.pages.pop();
        }
    }

    /// Every input must show up somewhere.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = BTreeSet::new();
        for page in &self.pages {
            match page {
                Page::Columnar(p) => seen.extend(p.items()),
                Page::Spread(s) => {
                    seen.insert(s.item);
                }
            }
        }
        let missing: Vec<_> = self
            .items
            .iter()
            .filter(|i| !seen.contains(&i.id))
            .map(|i| i.path.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::NotRendered(missing))
        }
    }

    /// Lay out the columnar page at `idx`, letting it grow by up to `allow`
    /// columns.
    pub fn layout_page(&mut self, idx: usize, allow: usize) -> Result<(), Error> {
        let page = columnar(&self.pages, idx)?;
        let mut run = PageRun {
            cap: page.num_cols() + allow,
            ..PageRun::default()
        };
        let was_empty = page.is_empty();
        self.diag.algorithm(&format!(
            "Laying out page [{}]; overflow={}",
            page.number,
            self.overflow
                .map_or_else(|| "none".to_string(), |o| o.to_string())
        ));
        self.diag
            .algorithm(&format!("Inputs remaining: #{}", self.pending.len()));

        let mut stage = Stage::SelectCandidates;
        loop {
            stage = match stage {
                Stage::SelectCandidates => {
                    self.select_candidates(idx, &mut run);
                    match (run.fixed.is_empty(), was_empty) {
                        (true, _) => Stage::PlaceOverflow,
                        (false, true) => Stage::PackFixed,
                        (false, false) => Stage::DeferFixed,
                    }
                }
                Stage::PackFixed => {
                    self.pack_fixed(idx, &mut run)?;
                    Stage::PlaceOverflow
                }
                Stage::DeferFixed => {
                    self.diag.algorithm(&format!(
                        "Page already has content; deferring {} fixed items",
                        run.fixed.len()
                    ));
                    run.returned.append(&mut run.fixed);
                    Stage::PlaceOverflow
                }
                Stage::PlaceOverflow => {
                    if self.place_overflow(idx, &run)? {
                        Stage::PlaceFlowable
                    } else {
                        Stage::DeferFlowable
                    }
                }
                Stage::PlaceFlowable => self.place_flowable(idx, &mut run)?,
                Stage::DeferFlowable => {
                    if !run.flowables.is_empty() {
                        self.diag.algorithm(&format!(
                            " - Deferring to next page: {} articles",
                            run.flowables.len()
                        ));
                    }
                    run.returned.extend(run.flowables.drain(..));
                    Stage::Done
                }
                Stage::Done => break,
            };
        }

        // the queue stays in input order
        run.returned.sort();
        for id in run.returned.into_iter().rev() {
            self.pending.push_front(id);
        }
        let page = columnar(&self.pages, idx)?;
        self.diag.algorithm(&format!(
            "Laying out page [{}] done; overflow={}",
            page.number,
            self.overflow
                .map_or_else(|| "none".to_string(), |o| o.to_string())
        ));
        self.diag.elements(&page.to_string());
        Ok(())
    }

    fn select_candidates(&mut self, idx: usize, run: &mut PageRun) {
        let page_no = self.pages[idx].number();
        let total_pages = self.pages.len();
        let page_area = self.settings.page_area();
        let mut area = self
            .overflow
            .map_or(0.0, |o| o.remaining * self.settings.column_width);

        while area < page_area {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let item = &self.items[id.0];
            let capability = item.capability();
            if capability == Capability::WholePage
                || !eligible(item.target_page, page_no, total_pages)
            {
                run.returned.push(id);
                continue;
            }
            area += self.areas[id.0];
            self.diag.algorithm(&format!(
                " - Expecting on this page: {item} of type {}",
                item.type_name()
            ));
            match capability {
                Capability::Flowable => run.flowables.push_back(id),
                _ => run.fixed.push(id),
            }
        }
    }

    fn pack_fixed(&mut self, idx: usize, run: &mut PageRun) -> Result<(), Error> {
        let settings = self.settings;
        let page = columnar_mut(&mut self.pages, idx)?;
        let mut packer = FixedPacker::new(page.num_cols(), settings);
        let fixed = std::mem::take(&mut run.fixed);
        for (i, &id) in fixed.iter().enumerate() {
            let Some(block) = self.blocks[id.0].as_ref() else {
                continue;
            };
            self.diag
                .algorithm(&format!("Fitting fixed-size {}", self.items[id.0]));
            if !packer.fit(block, page, run.cap, &mut *self.diag)? {
                self.diag.algorithm(&format!(
                    "Failed to fit insert {}; deferring {} fixed items to next page",
                    block.label,
                    fixed.len() - i
                ));
                run.returned.extend_from_slice(&fixed[i..]);
                break;
            }
        }
        self.diag.algorithm(&format!("Placing {packer}"));
        packer.commit(page, &mut *self.diag)
    }

    /// Returns false when the carried article still overflows this page.
    fn place_overflow(&mut self, idx: usize, run: &PageRun) -> Result<bool, Error> {
        let Some(overflow) = self.overflow else {
            return Ok(true);
        };
        let page = columnar_mut(&mut self.pages, idx)?;
        let article = &mut self.articles[overflow.article.0];
        self.diag.algorithm(&format!("Setting overflow: {overflow}"));
        article.continue_on(page.number);

        let mut cx = FlowCx {
            settings: self.settings,
            oracle: self.oracle,
            notes: self.notes,
            diag: &mut *self.diag,
        };
        let outcome = flow::place_first_fit(
            page,
            article,
            overflow.article,
            overflow.remaining,
            Some(overflow.from_page),
            run.cap,
            &mut cx,
        )?;
        match outcome {
            FlowOutcome::Complete => {
                self.diag.algorithm(" - overflow set");
                self.overflow = None;
                Ok(true)
            }
            FlowOutcome::Overflow(next) => {
                self.diag
                    .algorithm(" - overflow set, but created a new overflow");
                self.overflow = Some(next);
                Ok(false)
            }
            FlowOutcome::Unplaced | FlowOutcome::PageFull => Ok(false),
        }
    }

    fn place_flowable(&mut self, idx: usize, run: &mut PageRun) -> Result<Stage, Error> {
        let Some(id) = run.flowables.pop_front() else {
            return Ok(Stage::Done);
        };
        let Some(aid) = self.article_for(id) else {
            return Err(Error::Placement(format!(
                "{} is not an article",
                self.items[id.0]
            )));
        };
        let page = columnar_mut(&mut self.pages, idx)?;
        let article = &mut self.articles[aid.0];
        let mut cx = FlowCx {
            settings: self.settings,
            oracle: self.oracle,
            notes: self.notes,
            diag: &mut *self.diag,
        };
        match flow::place_flowable(page, article, aid, run.cap, &mut cx)? {
            FlowOutcome::Complete => Ok(Stage::PlaceFlowable),
            FlowOutcome::Overflow(overflow) => {
                self.overflow = Some(overflow);
                Ok(Stage::DeferFlowable)
            }
            FlowOutcome::Unplaced | FlowOutcome::PageFull => {
                run.flowables.push_front(id);
                Ok(Stage::DeferFlowable)
            }
        }
    }
}

/// Whether an item asking for `target` may go on page `page_no` of
/// `total_pages`. Positive targets are absolute page numbers; negative ones
/// count back from the last page.
pub fn eligible(target: Option<i64>, page_no: usize, total_pages: usize) -> bool {
    let page_no = page_no as i64;
    match target {
        Some(n) if n > 0 => n <= page_no,
        Some(n) if n < 0 => n <= page_no - total_pages as i64 - 1,
        _ => true,
    }
}

fn columnar(pages: &[Page], idx: usize) -> Result<&ColumnarPage, Error> {
    pages
        .get(idx)
        .and_then(Page::as_columnar)
        .ok_or_else(|| Error::Placement(format!("page {} is not a columnar page", idx + 1)))
}

fn columnar_mut(pages: &mut [Page], idx: usize) -> Result<&mut ColumnarPage, Error> {
    pages
        .get_mut(idx)
        .and_then(Page::as_columnar_mut)
        .ok_or_else(|| Error::Placement(format!("page {} is not a columnar page", idx + 1)))
}

fn fixed_span(item: &Item) -> Option<Span> {
    match &item.kind {
        ItemKind::Insert { span, .. } | ItemKind::Title { span, .. } => Some(*span),
        ItemKind::HeadSpan { cols } => Some(Span::Columns(*cols)),
        ItemKind::Article | ItemKind::Spread { .. } => None,
    }
}

fn span_cols(span: Span, max_cols: usize, settings: &Settings) -> usize {
    match span {
        Span::Fill => max_cols,
        Span::Columns(c) => c,
        Span::Width(w) => {
            crate::model::width_to_columns(w, settings.alley_width, settings.column_width)
        }
    }
    .max(1)
}

/// Column length of `item` before any splitting: measured text for
/// articles and head-spans, the given height for inserts.
fn measure_item(item: &Item, settings: &Settings, oracle: &dyn LengthOracle) -> Result<f64, Error> {
    let width = match &item.kind {
        ItemKind::Article => settings.column_width,
        ItemKind::HeadSpan { cols } => settings.span_width(*cols),
        ItemKind::Insert { height, .. } | ItemKind::Title { height, .. } => return Ok(*height),
        ItemKind::Spread { .. } => return Ok(0.0),
    };
    let key = item.key();
    let len = oracle.measure(&MeasureRequest {
        key: &key,
        width,
        prior_splits: &[],
        content: &item.body,
        modified: item.modified,
    })?;
    if !len.is_finite() {
        return Err(Error::Measure {
            key,
            msg: format!("not a length: {len}"),
        });
    }
    if len <= 0.0 {
        return Err(Error::ZeroLength(item.path.clone()));
    }
    Ok(len)
}
