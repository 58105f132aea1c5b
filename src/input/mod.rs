pub mod headers;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::Error;
use crate::model::{Item, ItemId, ItemKind, Span};
use crate::settings::{SETTINGS_FILE, Settings};
use crate::units::Length;

use headers::{Headers, ItemType};

/// Read every input file in `dirs`, in sorted path order. Files without a
/// `Type` header and files that fail to parse are skipped.
pub fn load_dirs(dirs: &[PathBuf], settings: &Settings) -> Result<Vec<Item>, Error> {
    let t0 = std::time::Instant::now();
    let mut files: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        log::debug!("Directory <{}>", dir.display());
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                log::error!("Skipping {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries {
            let path = entry.map_err(Error::Io)?.path();
            if path.is_file() && is_input_file(&path, settings) {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut items = Vec::new();
    for path in files {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                log::error!("Error reading {}: {e}", path.display());
                continue;
            }
        };
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        match read_item(&path, &text, modified, ItemId(items.len()), settings) {
            Ok(Some(item)) => {
                log::debug!("Read {item} with {} headers", item.headers.len());
                items.push(item);
            }
            Ok(None) => {
                log::debug!("{} has no Type header; not an input", path.display());
            }
            Err(e) => log::error!("Error reading {}: {e}", path.display()),
        }
    }

    log::info!(
        "Loaded {} inputs from {} directories in {:.1}ms",
        items.len(),
        dirs.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(items)
}

pub fn is_input_file(path: &Path, settings: &Settings) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name != SETTINGS_FILE && settings.input_filters.iter().any(|f| name.ends_with(f.as_str()))
}

/// Build an item from file contents. `Ok(None)` means the file declares no known type.
pub fn read_item(
    path: &Path,
    text: &str,
    modified: Option<SystemTime>,
    id: ItemId,
    settings: &Settings,
) -> Result<Option<Item>, Error> {
    let (headers, body) = Headers::parse(path, text);
    let Some(item_type) = headers.item_type() else {
        return Ok(None);
    };

    let kind = match item_type {
        ItemType::Article => ItemKind::Article,
        ItemType::Fixed => {
            let (span, height) = insert_size(&headers, settings)?;
            ItemKind::Insert { span, height }
        }
        ItemType::Title => {
            let (span, height) = insert_size(&headers, settings)?;
            ItemKind::Title { span, height }
        }
        ItemType::HeadSpan => {
            let wanted = headers.cols()?;
            let max = settings.max_cols_per_page();
            if wanted > max {
                log::warn!(
                    "{}: Cols={wanted} exceeds {max} columns per page; using {max}",
                    path.display()
                );
            }
            ItemKind::HeadSpan {
                cols: wanted.min(max),
            }
        }
        ItemType::Spread => ItemKind::Spread {
            rotate: headers.flag("Rotate"),
        },
    };

    let column_hint = match kind {
        ItemKind::Title { .. } => None,
        _ => headers.column_hint()?.filter(|&h| h > 0),
    };

    Ok(Some(Item {
        id,
        path: path.to_path_buf(),
        target_page: headers.target_page()?,
        column_hint,
        headers,
        body: Arc::from(body),
        modified,
        kind,
    }))
}

/// `Width` defaults to, and is capped at, the page width; a full-page width
/// means "every column on the page". `Height` defaults to a full column.
fn insert_size(headers: &Headers, settings: &Settings) -> Result<(Span, f64), Error> {
    let span = match headers.length("Width")? {
        None | Some(Length::Fill) => Span::Fill,
        Some(Length::Points(w)) if w >= settings.page_width => Span::Fill,
        Some(Length::Points(w)) => Span::Width(w),
    };
    let height = headers
        .length("Height")?
        .map_or(settings.column_height, |h| h.or_fill(settings.column_height));
    if height <= 0.0 {
        return Err(Error::Header {
            path: headers.path().to_path_buf(),
            msg: format!("Height must be positive, got {height:.2}pt"),
        });
    }
    Ok((span, height))
}
