use std::fmt;

use crate::settings::ColumnStrategy;

/// First guess at the shape of the paper, from the summed estimated lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Estimate {
    pub total_columns: usize,
    pub num_pages: usize,
    pub cols_per_page: usize,
}

impl Estimate {
    pub fn calculate(
        strategy: ColumnStrategy,
        total_length: f64,
        column_height: f64,
        max_cols_per_page: usize,
    ) -> Estimate {
        let max = max_cols_per_page.max(1);
        let total_columns = if column_height > 0.0 {
            ((total_length / column_height).ceil() as usize).max(1)
        } else {
            1
        };
        let num_pages = total_columns.div_ceil(max);
        let cols_per_page = match strategy {
            ColumnStrategy::Balance => {
                ((total_columns as f64 / num_pages as f64).round() as usize).clamp(1, max)
            }
            ColumnStrategy::FillFirst => max,
        };
        Estimate {
            total_columns,
            num_pages,
            cols_per_page,
        }
    }

    /// Column counts of the initial pages: all but the last get
    /// `cols_per_page`, the last takes what is left.
    pub fn initial_page_columns(&self, max_cols_per_page: usize) -> Vec<usize> {
        let mut cols = vec![self.cols_per_page; self.num_pages.saturating_sub(1)];
        let used = self.cols_per_page * cols.len();
        let last = self
            .total_columns
            .saturating_sub(used)
            .clamp(1, max_cols_per_page.max(1));
        cols.push(last);
        cols
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} columns => {} pages mostly {} cols",
            self.total_columns, self.num_pages, self.cols_per_page
        )
    }
}
