//! Length oracles: how long a piece of text is once set at a given width.

pub mod cache;
pub mod command;
pub mod metrics;

use std::time::SystemTime;

use crate::error::Error;
use crate::settings::{MeasureMode, Settings};

pub use cache::CachingOracle;
pub use command::CommandOracle;
pub use metrics::MetricOracle;

/// One question to an oracle.
#[derive(Clone, Copy, Debug)]
pub struct MeasureRequest<'a> {
    /// Stable identity of the content, usually its path.
    pub key: &'a str,
    pub width: f64,
    /// Lengths already committed to earlier boxes, oldest first.
    pub prior_splits: &'a [f64],
    pub content: &'a str,
    /// Modification time of the source, used to invalidate cached answers.
    pub modified: Option<SystemTime>,
}

pub trait LengthOracle: Send + Sync {
    /// Total settable length of `req.content` when the first boxes are cut
    /// at `req.prior_splits`. Never less than the sum of the splits.
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error>;
}

impl<T: LengthOracle + ?Sized> LengthOracle for Box<T> {
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error> {
        (**self).measure(req)
    }
}

/// The oracle described by `settings`, without caching.
pub fn base_oracle(settings: &Settings) -> Result<Box<dyn LengthOracle>, Error> {
    let oracle: Box<dyn LengthOracle> = match settings.measure {
        MeasureMode::Metrics => Box::new(MetricOracle::from_settings(settings)?),
        MeasureMode::Command => Box::new(CommandOracle::from_settings(settings)?),
    };
    Ok(oracle)
}
