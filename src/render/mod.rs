//! Writing a finished layout out: the text dump, the preamble and an
//! optional proof PDF.

pub mod proof;

use std::path::Path;

use crate::error::Error;
use crate::layout::Layout;

/// The layout in its plain-text form, one `PAGE` block per page.
pub fn write_dump(layout: &Layout, path: &Path) -> Result<(), Error> {
    std::fs::write(path, layout.to_string()).map_err(Error::Io)
}

/// One preamble directive per line, in the order they were collected.
pub fn write_preamble(layout: &Layout, path: &Path) -> Result<(), Error> {
    let mut text = String::new();
    for line in &layout.preamble {
        text.push_str(line);
        text.push('\n');
    }
    std::fs::write(path, text).map_err(Error::Io)
}

pub use proof::render_proof;
