//! Length parsing. Everything inside the crate is measured in PostScript
//! points (1/72 in); input lengths may use any of the usual print units.

pub const POINTS_PER_INCH: f64 = 72.0;
/// TeX points per inch. `pt` in input means TeX points, `bp` means PostScript points.
const TEX_POINTS_PER_INCH: f64 = 72.27;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Length {
    Points(f64),
    /// Take all the space available (e.g. the full page width).
    Fill,
}

impl Length {
    pub fn or_fill(self, fill: f64) -> f64 {
        match self {
            Length::Points(v) => v,
            Length::Fill => fill,
        }
    }
}

pub fn parse_length(s: &str) -> Result<Length, String> {
    let s = s.trim().to_ascii_lowercase();
    if s == "fill" {
        return Ok(Length::Fill);
    }
    if !s.is_empty() && s.chars().all(|c| c == '0' || c == '.') {
        return Ok(Length::Points(0.0));
    }
    // longest suffixes first so "inches" isn't read as "...es" and "mm" isn't read as "m"
    const UNITS: &[(&str, f64)] = &[
        ("inches", POINTS_PER_INCH),
        ("inch", POINTS_PER_INCH),
        ("in", POINTS_PER_INCH),
        ("pts", POINTS_PER_INCH / TEX_POINTS_PER_INCH),
        ("pt", POINTS_PER_INCH / TEX_POINTS_PER_INCH),
        ("bp", 1.0),
        ("mm", POINTS_PER_INCH / 25.4),
        ("cm", POINTS_PER_INCH / 2.54),
        ("dm", POINTS_PER_INCH / 0.254),
        ("m", POINTS_PER_INCH / 0.0254),
    ];
    for (suffix, factor) in UNITS {
        if let Some(num) = s.strip_suffix(suffix) {
            let v: f64 = num
                .trim()
                .parse()
                .map_err(|e| format!("failed to parse length [{s}]: {e}"))?;
            if !v.is_finite() {
                return Err(format!("length [{s}] is not finite"));
            }
            return Ok(Length::Points(v * factor));
        }
    }
    Err(format!(
        "unknown unit in length [{s}]; try mm, cm, in, pt or bp"
    ))
}

/// Parse a length that must be absolute.
pub fn parse_points(s: &str) -> Result<f64, String> {
    match parse_length(s)? {
        Length::Points(v) => Ok(v),
        Length::Fill => Err(format!("[{s}] must be an absolute length")),
    }
}

pub fn inches(v: f64) -> f64 {
    v * POINTS_PER_INCH
}

pub fn mm(v: f64) -> f64 {
    v * POINTS_PER_INCH / 25.4
}
