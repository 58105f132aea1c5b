use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use ttf_parser::Face;

use super::{LengthOracle, MeasureRequest};
use crate::error::Error;
use crate::settings::Settings;

/// Characters whose advances are read from a font file up front.
const MEASURED_RANGE: std::ops::RangeInclusive<u32> = 0x20..=0x24F;

/// Estimates set length by greedy line breaking over per-character advance
/// widths. Without a font file, built-in Helvetica approximations are used.
pub struct MetricOracle {
    widths: CharWidths,
    font_size: f64,
    line_height: f64,
    parskip: f64,
}

enum CharWidths {
    /// Helvetica widths for chars 32..=255, in 1000-units.
    Builtin(Vec<f32>),
    Font {
        widths: HashMap<char, f32>,
        fallback: f32,
    },
}

impl CharWidths {
    fn width_1000(&self, ch: char) -> f32 {
        match self {
            CharWidths::Builtin(table) => {
                let code = ch as u32;
                if (32..=255).contains(&code) {
                    table[(code - 32) as usize]
                } else if ch.is_whitespace() || ch.is_control() {
                    0.0
                } else {
                    556.0
                }
            }
            CharWidths::Font { widths, fallback } => widths.get(&ch).copied().unwrap_or(*fallback),
        }
    }
}

/// Approximate Helvetica widths at 1000 units/em for chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J
            77 => 833.0,                          // M
            65..=90 => 667.0,                     // uppercase
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // f i j l t
            109 | 119 => 833.0,                   // m w
            97..=122 => 556.0,                    // lowercase
            _ => 556.0,
        })
        .collect()
}

fn font_widths(path: &Path) -> Result<CharWidths, Error> {
    let t0 = std::time::Instant::now();
    let file = File::open(path).map_err(Error::Io)?;
    let data = unsafe { Mmap::map(&file) }.map_err(Error::Io)?;
    let face = Face::parse(&data, 0)
        .map_err(|e| Error::Settings(format!("measureFont {}: {e}", path.display())))?;
    let units = face.units_per_em() as f32;

    let mut widths = HashMap::new();
    for code in MEASURED_RANGE {
        let Some(ch) = char::from_u32(code) else {
            continue;
        };
        if let Some(adv) = face
            .glyph_index(ch)
            .and_then(|gid| face.glyph_hor_advance(gid))
        {
            widths.insert(ch, adv as f32 / units * 1000.0);
        }
    }
    let fallback = if widths.is_empty() {
        556.0
    } else {
        widths.values().sum::<f32>() / widths.len() as f32
    };
    log::debug!(
        "Measure font {}: {} advances in {:.1}ms",
        path.display(),
        widths.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(CharWidths::Font { widths, fallback })
}

/// One set line, with the paragraph gap that precedes it.
#[derive(Clone, Copy, Debug)]
struct Line {
    glue: f64,
    height: f64,
}

impl MetricOracle {
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let widths = match &settings.measure_font {
            Some(path) => font_widths(path)?,
            None => CharWidths::Builtin(helvetica_widths()),
        };
        Ok(MetricOracle {
            widths,
            font_size: settings.font_size,
            line_height: settings.font_size * settings.leading,
            parskip: settings.parskip,
        })
    }

    /// Built-in metrics, no font file.
    pub fn helvetica(font_size: f64, leading: f64, parskip: f64) -> Self {
        MetricOracle {
            widths: CharWidths::Builtin(helvetica_widths()),
            font_size,
            line_height: font_size * leading,
            parskip,
        }
    }

    fn word_width(&self, word: &str) -> f64 {
        word.chars()
            .map(|ch| self.widths.width_1000(ch) as f64 * self.font_size / 1000.0)
            .sum()
    }

    fn break_lines(&self, content: &str, width: f64) -> Vec<Line> {
        let space = self.word_width(" ");
        let mut lines = Vec::new();
        for (p, para) in paragraphs(content).iter().enumerate() {
            let mut glue = if p == 0 { 0.0 } else { self.parskip };
            let mut x = 0.0;
            let mut open = false;
            for word in para.iter().flat_map(|l| l.split_whitespace()) {
                let w = self.word_width(word);
                if open && x + space + w > width {
                    lines.push(Line {
                        glue,
                        height: self.line_height,
                    });
                    glue = 0.0;
                    x = w;
                } else if open {
                    x += space + w;
                } else {
                    // an over-long word still gets a line of its own
                    x = w;
                    open = true;
                }
            }
            if open {
                lines.push(Line {
                    glue,
                    height: self.line_height,
                });
            }
        }
        lines
    }
}

/// Runs of non-blank lines. Any line ending counts.
fn paragraphs(content: &str) -> Vec<Vec<&str>> {
    let mut paras: Vec<Vec<&str>> = Vec::new();
    let mut blank = true;
    for line in content.lines() {
        if line.trim().is_empty() {
            blank = true;
        } else if blank {
            paras.push(vec![line]);
            blank = false;
        } else if let Some(para) = paras.last_mut() {
            para.push(line);
        }
    }
    paras
}

impl LengthOracle for MetricOracle {
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error> {
        if req.width <= 0.0 {
            return Err(Error::Measure {
                key: req.key.to_string(),
                msg: format!("cannot set text {:.2}pt wide", req.width),
            });
        }
        let lines = self.break_lines(req.content, req.width);
        let mut next = 0;
        let mut committed = 0.0;
        // each earlier box takes the whole lines that fit; glue at its top is dropped
        for &split in req.prior_splits {
            let mut used = 0.0;
            let mut first = true;
            while let Some(line) = lines.get(next) {
                let glue = if first { 0.0 } else { line.glue };
                if used + glue + line.height > split + 1e-6 {
                    break;
                }
                used += glue + line.height;
                next += 1;
                first = false;
            }
            committed += split;
        }
        let rest: f64 = lines[next.min(lines.len())..]
            .iter()
            .enumerate()
            .map(|(i, l)| if i == 0 { l.height } else { l.glue + l.height })
            .sum();
        Ok(committed + rest)
    }
}
