//! A proof sheet of the layout geometry: boxes where the text and pictures
//! will go, so a page plan can be checked before typesetting.

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str};

use crate::error::Error;
use crate::layout::{ColumnarPage, Layout, Occupant, Page, SpreadPage};
use crate::settings::Settings;

const FONT: &[u8] = b"F1";
const LABEL_SIZE: f32 = 7.0;
const NOTE_SIZE: f32 = 6.0;

/// Horizontal and vertical placement of a page's columns on the sheet.
struct Frame {
    left: f32,
    top: f32,
    col_w: f32,
    alley_w: f32,
}

impl Frame {
    fn new(settings: &Settings, cols: usize) -> Self {
        let col_w = settings.column_width as f32;
        let alley_w = settings.alley_width as f32;
        let total = cols as f32 * col_w + cols.saturating_sub(1) as f32 * alley_w;
        let page_w = settings.page_width as f32;
        let page_h = settings.page_height as f32;
        let col_h = settings.column_height as f32;
        Frame {
            left: (page_w - total) / 2.0,
            top: (page_h + col_h) / 2.0,
            col_w,
            alley_w,
        }
    }

    fn x(&self, col: usize) -> f32 {
        self.left + col as f32 * (self.col_w + self.alley_w)
    }

    fn span(&self, cols: usize) -> f32 {
        cols as f32 * self.col_w + cols.saturating_sub(1) as f32 * self.alley_w
    }

    /// PDF y of a depth measured down from the top of the columns.
    fn y(&self, depth: f64) -> f32 {
        self.top - depth as f32
    }
}

pub fn render_proof(layout: &Layout, settings: &Settings) -> Result<Vec<u8>, Error> {
    let t0 = std::time::Instant::now();
    if layout.pages.is_empty() {
        return Err(Error::Render("nothing to render: the layout has no pages".into()));
    }
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let font_id = alloc();
    let page_ids: Vec<Ref> = layout.pages.iter().map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = layout.pages.iter().map(|_| alloc()).collect();

    pdf.type1_font(font_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    for (i, page) in layout.pages.iter().enumerate() {
        let mut content = Content::new();
        match page {
            Page::Columnar(p) => draw_columnar(&mut content, layout, settings, p),
            Page::Spread(s) => draw_spread(&mut content, settings, s),
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed)
            .filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    let media = Rect::new(
        0.0,
        0.0,
        settings.page_width as f32,
        settings.page_height as f32,
    );
    for (i, &page_id) in page_ids.iter().enumerate() {
        let mut page = pdf.page(page_id);
        page.media_box(media)
            .parent(pages_id)
            .contents(content_ids[i]);
        page.resources().fonts().pair(Name(FONT), font_id);
    }

    log::info!(
        "Proof: {} pages in {:.1}ms",
        layout.pages.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(pdf.finish())
}

fn draw_columnar(content: &mut Content, layout: &Layout, settings: &Settings, page: &ColumnarPage) {
    let frame = Frame::new(settings, page.num_cols());
    let page_h = settings.page_height as f32;
    label(
        content,
        frame.left,
        (frame.top + page_h) / 2.0,
        LABEL_SIZE,
        &format!("Page {}", page.number),
    );

    for (c, column) in page.columns().iter().enumerate() {
        let x = frame.x(c);
        // column outline
        content.save_state();
        content.set_line_width(0.25);
        content.set_stroke_gray(0.7);
        content.rect(x, frame.y(column.height()), frame.col_w, column.height() as f32);
        content.stroke();
        content.restore_state();

        for frag in column.fragments() {
            let top = frame.y(frag.start);
            let bottom = frame.y(frag.end);
            match &frag.occupant {
                None => {}
                Some(Occupant::Article(a)) => {
                    let text_top = if a.continued_from.is_some() {
                        top - (a.reserved as f32).min(top - bottom)
                    } else {
                        top
                    };
                    let text_h = a.height as f32;
                    content.save_state();
                    content.set_fill_gray(0.85);
                    content.rect(x, text_top - text_h, frame.col_w, text_h);
                    content.fill_nonzero();
                    content.restore_state();

                    let article = layout.article(a.article);
                    let name = format!("{} {}/{}", a.label, a.split + 1, article.split_count());
                    label(content, x + 2.0, text_top - LABEL_SIZE - 1.0, LABEL_SIZE, &name);
                    if a.split == 0
                        && let Some(head) = layout.item(a.item).headers.get("Head")
                    {
                        let y = text_top - 2.0 * (LABEL_SIZE + 1.0);
                        label(content, x + 2.0, y, NOTE_SIZE, head);
                    }
                    if let Some(from) = a.continued_from {
                        let note = settings.continued_from_text.replace("{page}", &from.to_string());
                        label(content, x + 2.0, top - NOTE_SIZE - 1.0, NOTE_SIZE, &note);
                    }
                    if let Some(on) = article.continued_on(a.split) {
                        let note = settings.continued_on_text.replace("{page}", &on.to_string());
                        label(content, x + 2.0, bottom + 2.0, NOTE_SIZE, &note);
                    }
                }
                Some(Occupant::Fixed(f)) => {
                    // drawn once, from the leftmost column it covers
                    let starts_here = c == 0
                        || !page.column(c - 1).fragments().iter().any(|o| {
                            matches!(&o.occupant, Some(Occupant::Fixed(g)) if g.item == f.item)
                                && (o.start - frag.start).abs() < 1e-6
                        });
                    if starts_here {
                        let w = frame.span(f.cols);
                        content.save_state();
                        content.set_line_width(0.75);
                        content.rect(x, bottom, w, top - bottom);
                        content.stroke();
                        content.move_to(x, bottom);
                        content.line_to(x + w, top);
                        content.stroke();
                        content.restore_state();
                        label(content, x + 2.0, top - LABEL_SIZE - 1.0, LABEL_SIZE, &f.label);
                    }
                }
                Some(Occupant::Spacer(_)) => {
                    let mid = (top + bottom) / 2.0;
                    content.save_state();
                    content.set_line_width(settings.alley_thick_height as f32);
                    content.move_to(x, mid);
                    content.line_to(x + frame.col_w, mid);
                    content.stroke();
                    content.restore_state();
                }
            }
        }
    }

    // rules between columns, only where text meets text
    content.save_state();
    content.set_line_width(settings.alley_thick_width as f32);
    for c in 1..page.num_cols() {
        let mid = frame.x(c) - frame.alley_w / 2.0;
        for left in page.column(c - 1).fragments() {
            if left.occupant.as_ref().is_none_or(Occupant::skips_alley) {
                continue;
            }
            for right in page.column(c).fragments() {
                if right.occupant.as_ref().is_none_or(Occupant::skips_alley) {
                    continue;
                }
                let from = left.start.max(right.start);
                let to = left.end.min(right.end);
                if to > from {
                    content.move_to(mid, frame.y(from));
                    content.line_to(mid, frame.y(to));
                    content.stroke();
                }
            }
        }
    }
    content.restore_state();
}

fn draw_spread(content: &mut Content, settings: &Settings, spread: &SpreadPage) {
    let margin = settings.min_side_margins as f32;
    let w = settings.page_width as f32 - 2.0 * margin;
    let h = settings.page_height as f32 - 2.0 * margin;
    content.save_state();
    content.set_line_width(1.0);
    content.rect(margin, margin, w, h);
    content.stroke();
    content.restore_state();
    let title = if spread.rotate {
        format!("Page {}: {} (rotated)", spread.number, spread.label)
    } else {
        format!("Page {}: {}", spread.number, spread.label)
    };
    label(content, margin + 4.0, margin + h - LABEL_SIZE - 4.0, LABEL_SIZE, &title);
}

fn label(content: &mut Content, x: f32, y: f32, size: f32, text: &str) {
    let bytes = winansi(text);
    content
        .begin_text()
        .set_font(Name(FONT), size)
        .next_line(x, y)
        .show(Str(&bytes))
        .end_text();
}

/// Latin-1 passes through; anything else becomes `?`.
fn winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            _ => b'?',
        })
        .collect()
}
