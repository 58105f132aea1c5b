use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Error;
use crate::units::{self, parse_points};

pub const SETTINGS_FILE: &str = "settings.properties";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnStrategy {
    /// Spread the columns evenly over the pages.
    Balance,
    /// Fill every page but the last to the maximum column count.
    FillFirst,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeasureMode {
    /// Built-in greedy line breaking over font metrics.
    Metrics,
    /// Shell out to an external measuring command.
    Command,
}

/// Named page sizes, width x height.
const PAGE_SIZES: &[(&str, &str, &str)] = &[
    ("A2", "410mm", "578mm"),
    ("A3", "297mm", "420mm"),
    ("A4", "297mm", "210mm"),
    ("B2", "500mm", "707mm"),
    ("B3", "353mm", "500mm"),
    ("LETTER", "11in", "8.5in"),
    ("LEGAL", "14in", "8.5in"),
    ("A", "9in", "12in"),
    ("B", "12in", "18in"),
    ("C", "18in", "24in"),
    ("D", "24in", "36in"),
    ("E", "36in", "48in"),
    ("E1", "30in", "42in"),
    ("E3", "27in", "39in"),
    ("CANADAT", "260mm", "368mm"),
    ("NORWAYT", "280mm", "400mm"),
    ("BRITAINT", "280mm", "430mm"),
    ("MIDI", "315mm", "470mm"),
    ("USA", "381mm", "578mm"),
    ("NORWAY", "400mm", "570mm"),
    ("BRITAIN", "375mm", "597mm"),
    ("BIG", "650mm", "750mm"),
];

/// Immutable run configuration. All lengths in points.
#[derive(Clone, Debug)]
pub struct Settings {
    pub page_width: f64,
    pub page_height: f64,
    pub column_width: f64,
    pub column_height: f64,
    pub alley_width: f64,
    pub alley_height: f64,
    pub alley_thick_width: f64,
    pub alley_thick_height: f64,
    pub min_side_margins: f64,
    pub column_strategy: ColumnStrategy,
    /// Leading gaps smaller than this are absorbed into the item placed below them.
    pub squash: f64,
    /// An article set whole into a gap is stretched to the gap end when it
    /// fills at least this share of it. 0 stretches every one.
    pub stretch_ratio: f64,
    pub input_filters: Vec<String>,
    pub out: PathBuf,
    pub job_name: String,
    pub lengths_cache: String,
    pub continued_on_text: String,
    pub continued_from_text: String,
    pub preamble: Vec<String>,
    /// Preamble line loading the markdown package, added once when any input is markdown.
    pub markdown: String,
    pub measure: MeasureMode,
    pub measure_command: Option<String>,
    pub measure_args: Vec<String>,
    pub measure_font: Option<PathBuf>,
    pub font_size: f64,
    pub leading: f64,
    pub parskip: f64,
}

impl Settings {
    /// Load and merge `settings.properties` from each directory; later ones win.
    pub fn load(dirs: &[PathBuf]) -> Result<Self, Error> {
        let mut props = BTreeMap::new();
        for dir in dirs {
            let path = dir.join(SETTINGS_FILE);
            if !path.is_file() {
                log::debug!("No {} in {}", SETTINGS_FILE, dir.display());
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(Error::Io)?;
            let loaded = parse_properties(&text);
            log::debug!("Loaded {} settings from {}", loaded.len(), path.display());
            props.extend(loaded);
        }
        Self::from_properties(&props)
    }

    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self, Error> {
        let get = |k: &str| props.get(k).map(|s| s.trim()).filter(|s| !s.is_empty());
        let length = |k: &str, default: &str| -> Result<f64, Error> {
            let raw = get(k).unwrap_or(default);
            parse_points(raw).map_err(|e| Error::Settings(format!("{k}: {e}")))
        };
        let number = |k: &str, default: f64| -> Result<f64, Error> {
            match get(k) {
                None => Ok(default),
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|e| Error::Settings(format!("{k}: [{raw}] {e}"))),
            }
        };

        let size_code = get("pageSize").unwrap_or("BIG").to_ascii_uppercase();
        let &(_, def_w, def_h) = PAGE_SIZES
            .iter()
            .find(|(name, _, _)| *name == size_code)
            .ok_or_else(|| Error::Settings(format!("pageSize: unknown size [{size_code}]")))?;

        let page_width = length("pageWidth", def_w)?;
        let page_height = length("pageHeight", def_h)?;
        let ratio = number("columnHeightRatioOfPage", 0.9)?;
        let column_height = match get("columnHeight") {
            Some(raw) => {
                parse_points(raw).map_err(|e| Error::Settings(format!("columnHeight: {e}")))?
            }
            None => ratio * page_height,
        };

        let column_strategy = match get("columnStrategy").map(|s| s.to_ascii_uppercase()) {
            None => ColumnStrategy::Balance,
            Some(s) if s == "BALANCE" => ColumnStrategy::Balance,
            Some(s) if s == "FILLFIRST" => ColumnStrategy::FillFirst,
            Some(s) => {
                return Err(Error::Settings(format!(
                    "columnStrategy: expected BALANCE or FILLFIRST, got [{s}]"
                )));
            }
        };

        let measure = match get("measure").map(|s| s.to_ascii_lowercase()) {
            None => MeasureMode::Metrics,
            Some(s) if s == "metrics" => MeasureMode::Metrics,
            Some(s) if s == "command" => MeasureMode::Command,
            Some(s) => {
                return Err(Error::Settings(format!(
                    "measure: expected metrics or command, got [{s}]"
                )));
            }
        };

        let preamble = props
            .iter()
            .filter(|(k, _)| k.to_ascii_lowercase().starts_with("preamble"))
            .map(|(_, v)| v.clone())
            .collect();

        let settings = Settings {
            page_width,
            page_height,
            column_width: length("columnWidth", "1.5in")?,
            column_height,
            alley_width: length("alleyWidth", "0.125in")?,
            alley_height: length("alleyHeight", "0.125in")?,
            alley_thick_width: length("alleyThickWidth", "0.0125in")?,
            alley_thick_height: length("alleyThickHeight", "0.0125in")?,
            min_side_margins: length("minSideMargins", "0.125in")?,
            column_strategy,
            squash: length("squash", "2bp")?,
            stretch_ratio: number("stretchRatio", 0.0)?,
            input_filters: get("inputFilter")
                .unwrap_or(".tex,.md,.txt,.text")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            out: PathBuf::from(get("out").unwrap_or("out")),
            job_name: get("jobName").unwrap_or("newspaper").to_string(),
            lengths_cache: get("lengthsCache").unwrap_or("lengths.cache").to_string(),
            continued_on_text: get("continuedOnPageText")
                .unwrap_or("Continued on page {page}...")
                .to_string(),
            continued_from_text: get("continuedFromPageText")
                .unwrap_or("...continued from page {page}")
                .to_string(),
            preamble,
            markdown: get("markdown")
                .unwrap_or("\\usepackage[smartEllipses,fancyLists]{markdown}")
                .to_string(),
            measure,
            measure_command: get("measureCommand").map(str::to_string),
            measure_args: get("measureArgs")
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            measure_font: get("measureFont").map(PathBuf::from),
            font_size: length("fontSize", "10bp")?,
            leading: number("leading", 1.2)?,
            parskip: length("parskip", "0")?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.column_width <= 0.0 {
            return Err(Error::Settings("columnWidth must be positive".into()));
        }
        if self.column_height <= 0.0 {
            return Err(Error::Settings("columnHeight must be positive".into()));
        }
        if self.alley_height >= self.column_height {
            return Err(Error::Settings(
                "alleyHeight must be smaller than the column height".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.stretch_ratio) {
            return Err(Error::Settings("stretchRatio must be within 0..1".into()));
        }
        if self.raw_max_cols() < 1 {
            return Err(Error::Settings(format!(
                "page width {:.1}pt holds no {:.1}pt columns",
                self.page_width, self.column_width
            )));
        }
        if self.measure == MeasureMode::Command && self.measure_command.is_none() {
            return Err(Error::Settings(
                "measure=command requires measureCommand".into(),
            ));
        }
        Ok(())
    }

    fn raw_max_cols(&self) -> i64 {
        // each column brings one alley, except the last
        ((self.page_width - self.min_side_margins + self.alley_width)
            / (self.column_width + self.alley_width))
            .floor() as i64
    }

    pub fn max_cols_per_page(&self) -> usize {
        self.raw_max_cols().max(1) as usize
    }

    /// Width of `cols` adjacent columns including the alleys between them.
    pub fn span_width(&self, cols: usize) -> f64 {
        let n = cols as f64;
        n * self.column_width + (n - 1.0).max(0.0) * self.alley_width
    }

    /// Page area available to content, used to batch candidates per page.
    pub fn page_area(&self) -> f64 {
        self.page_width * self.column_height
    }

    pub fn cache_path(&self) -> PathBuf {
        self.out.join(&self.lengths_cache)
    }

    pub fn output_path(&self, ext: &str) -> PathBuf {
        self.out.join(format!("{}.{ext}", self.job_name))
    }
}

/// Parse `key=value` / `key: value` lines, ignoring `#` and `!` comments.
/// A trailing backslash continues a value on the next line.
pub(crate) fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);
        let entry = std::mem::take(&mut pending);
        if let Some((k, v)) = split_property(&entry) {
            out.insert(k, v);
        }
    }
    if let Some((k, v)) = split_property(&pending) {
        out.insert(k, v);
    }
    out
}

fn split_property(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let idx = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace());
    let (key, value) = match idx {
        Some(i) => {
            let rest = line[i..].trim_start();
            let rest = rest
                .strip_prefix('=')
                .or_else(|| rest.strip_prefix(':'))
                .unwrap_or(rest);
            (&line[..i], rest.trim())
        }
        None => (line, ""),
    };
    Some((key.to_string(), value.to_string()))
}

/// A length for log lines, in points and inches.
pub fn describe(points: f64) -> String {
    format!("{:.2}pt ({:.3}in)", points, points / units::POINTS_PER_INCH)
}
