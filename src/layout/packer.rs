//! Places non-splittable blocks onto an empty page before any text.
//!
//! Blocks are stacked in horizontal bands ("sections"). Each new block
//! normally starts its own band, stair-stepping leftwards from the right edge
//! so unrelated blocks don't pile up in one spot. When the column height runs
//! out, a block may instead join an existing band beside its other blocks.

use std::fmt;

use super::column::{FixedRef, Occupant, TINY};
use super::page::ColumnarPage;
use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::model::FixedBlock;
use crate::settings::Settings;

#[derive(Clone, Debug)]
struct Packed {
    block: FixedBlock,
    cols: usize,
}

/// A band of blocks side by side over `start_col..=end_col`.
#[derive(Clone, Debug)]
pub struct Section {
    blocks: Vec<Packed>,
    pub length: f64,
    pub start_col: usize,
    pub end_col: usize,
}

impl Section {
    pub fn cols(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&FixedBlock, usize)> {
        self.blocks.iter().map(|p| (&p.block, p.cols))
    }

    fn reflow(&mut self) {
        let width: usize = self.blocks.iter().map(|p| p.cols).sum();
        self.end_col = self.start_col + width - 1;
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.blocks.iter().map(|p| &*p.block.label).collect();
        write!(
            f,
            "Band{{{}-{}@{:.2}:{}}}",
            self.start_col,
            self.end_col,
            self.length,
            names.join(",")
        )
    }
}

pub struct FixedPacker<'s> {
    settings: &'s Settings,
    num_cols: usize,
    /// Stair-step cursor: one past the last column used.
    cursor: usize,
    /// Height used by the bands so far, alleys included.
    v_size: f64,
    sections: Vec<Section>,
}

impl<'s> FixedPacker<'s> {
    pub fn new(num_cols: usize, settings: &'s Settings) -> Self {
        FixedPacker {
            settings,
            num_cols,
            cursor: num_cols,
            v_size: 0.0,
            sections: Vec::new(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn v_size(&self) -> f64 {
        self.v_size
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Try to fit `block`, growing `page` (up to `max_cols` columns) if it is
    /// too wide. `Ok(false)` means it does not fit on this page.
    pub fn fit(
        &mut self,
        block: &FixedBlock,
        page: &mut ColumnarPage,
        max_cols: usize,
        diag: &mut dyn Diagnostics,
    ) -> Result<bool, Error> {
        let column_height = self.settings.column_height;
        if block.height > column_height + TINY {
            return Err(Error::TooTall {
                path: block.path.clone(),
                height: block.height,
                column_height,
            });
        }

        let mut cols = block.cols(self.num_cols, self.settings);
        if cols > self.num_cols {
            let budget = max_cols.saturating_sub(page.num_cols());
            if cols > self.num_cols + budget {
                return Err(Error::TooWide {
                    path: block.path.clone(),
                    cols,
                    available: self.num_cols + budget,
                });
            }
            let extra = cols - self.num_cols;
            diag.algorithm(&format!(
                "Enlarged page from {} columns; added {extra} columns",
                self.num_cols
            ));
            self.add_columns(extra, page);
            cols = block.cols(self.num_cols, self.settings);
        }

        diag.algorithm(&format!(
            " - layout of fixed size {} cols by {:.2}pt onto {} col page (used {:.2}pt of {:.2}pt)",
            cols, block.height, self.num_cols, self.v_size, column_height
        ));
        let alley = if self.sections.is_empty() {
            0.0
        } else {
            self.settings.alley_height
        };
        if self.v_size + alley + block.height <= column_height + TINY {
            self.stair_step(block, cols, alley);
            return Ok(true);
        }
        Ok(self.fit_by_first_fit(block, cols, diag))
    }

    fn add_columns(&mut self, extra: usize, page: &mut ColumnarPage) {
        for _ in 0..extra {
            page.add_extra_column();
        }
        self.num_cols += extra;
        // full-width blocks follow the page out to the new edge
        let num_cols = self.num_cols;
        let settings = self.settings;
        for section in &mut self.sections {
            let mut changed = false;
            for p in &mut section.blocks {
                if p.block.is_full_width() {
                    p.cols = p.block.cols(num_cols, settings);
                    changed = true;
                }
            }
            if changed {
                section.reflow();
            }
        }
    }

    fn stair_step(&mut self, block: &FixedBlock, cols: usize, alley: f64) {
        let hinted = block
            .column_hint
            .filter(|&hint| hint + cols <= self.num_cols);
        let start = match hinted {
            Some(hint) => hint,
            None => {
                if self.cursor < cols {
                    self.cursor = self.num_cols;
                }
                let start = self.cursor - cols;
                self.cursor = self.cursor.saturating_sub(1);
                start
            }
        };
        self.sections.push(Section {
            blocks: vec![Packed {
                block: block.clone(),
                cols,
            }],
            length: block.height,
            start_col: start,
            end_col: start + cols - 1,
        });
        self.v_size += alley + block.height;
    }

    /// Put `block` beside an existing band: to its left, to its right, or by
    /// sliding the band to column 0 and appending on the right.
    fn fit_by_first_fit(
        &mut self,
        block: &FixedBlock,
        cols: usize,
        diag: &mut dyn Diagnostics,
    ) -> bool {
        let free = self.settings.column_height - self.v_size;
        let num_cols = self.num_cols;
        for section in &mut self.sections {
            if section.length + free + TINY < block.height {
                continue;
            }
            let packed = Packed {
                block: block.clone(),
                cols,
            };
            if section.start_col >= cols {
                diag.algorithm(&format!(" - combining left of {section}"));
                section.start_col -= cols;
                section.blocks.insert(0, packed);
            } else if num_cols - section.end_col - 1 >= cols {
                diag.algorithm(&format!(" - combining right of {section}"));
                section.blocks.push(packed);
            } else if cols + section.cols() <= num_cols {
                diag.algorithm(&format!(" - sliding {section} left to make room"));
                section.start_col = 0;
                section.blocks.push(packed);
            } else {
                continue;
            }
            section.reflow();
            let grown = (block.height - section.length).max(0.0);
            section.length = section.length.max(block.height);
            self.v_size += grown;
            return true;
        }
        false
    }

    /// Write the bands onto `page` top to bottom, with a spacer above every
    /// band after the first.
    pub fn commit(self, page: &mut ColumnarPage, diag: &mut dyn Diagnostics) -> Result<(), Error> {
        let alley = self.settings.alley_height;
        let squash = self.settings.squash;
        let mut top = 0.0;
        for (i, section) in self.sections.iter().enumerate() {
            diag.algorithm(&format!(": band {section}"));
            if i > 0 {
                for col in section.start_col..=section.end_col {
                    page.place_spacer(col, top, alley, squash)?;
                }
                top += alley;
            }
            let mut col = section.start_col;
            for p in &section.blocks {
                let occupant = Occupant::Fixed(FixedRef {
                    item: p.block.item,
                    label: p.block.label.clone(),
                    cols: p.cols,
                });
                for c in col..col + p.cols {
                    page.place(c, occupant.clone(), top, top + p.block.height, squash)?;
                }
                col += p.cols;
            }
            top += section.length;
        }
        Ok(())
    }
}

impl fmt::Display for FixedPacker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartialLayout:{:.2}pt:[", self.v_size)?;
        for (i, s) in self.sections.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "]")
    }
}
