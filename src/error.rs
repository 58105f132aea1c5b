use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// A configuration value could not be parsed or describes an impossible page.
    Settings(String),
    /// A per-item header is missing or malformed.
    Header { path: PathBuf, msg: String },
    /// The length oracle could not produce a length.
    Measure { key: String, msg: String },
    ZeroLength(PathBuf),
    TooTall { path: PathBuf, height: f64, column_height: f64 },
    TooWide { path: PathBuf, cols: usize, available: usize },
    Placement(String),
    NotRendered(Vec<PathBuf>),
    NoProgress { pages: usize },
    Render(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Settings(msg) => write!(f, "Bad settings: {msg}"),
            Error::Header { path, msg } => write!(f, "{}: {msg}", path.display()),
            Error::Measure { key, msg } => write!(f, "Failed to measure {key}: {msg}"),
            Error::ZeroLength(path) => write!(f, "{} has 0 column length", path.display()),
            Error::TooTall {
                path,
                height,
                column_height,
            } => write!(
                f,
                "Input {} would be longer than available page height ({height:.2}pt > {column_height:.2}pt). \
                 Increase page size, change to type article, or reduce size of insert.",
                path.display()
            ),
            Error::TooWide {
                path,
                cols,
                available,
            } => write!(
                f,
                "Insert or spanning article {} too wide for page: needs {cols} columns, at most {available} available",
                path.display()
            ),
            Error::Placement(msg) => write!(f, "Placement failed: {msg}"),
            Error::NotRendered(paths) => {
                let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "Not rendered: {}", names.join(", "))
            }
            Error::NoProgress { pages } => write!(
                f,
                "Layout made no progress after {pages} pages; check Page headers"
            ),
            Error::Render(msg) => write!(f, "Render error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
