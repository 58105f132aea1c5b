pub mod diagnostics;
mod error;
pub mod input;
pub mod layout;
pub mod measure;
pub mod model;
pub mod render;
pub mod settings;
pub mod units;

pub use error::Error;
pub use layout::{Engine, Layout};
pub use settings::Settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use diagnostics::LogSink;
use measure::{CachingOracle, LengthOracle};

/// How a run should behave beyond what the settings files say.
#[derive(Clone, Debug)]
pub struct Options {
    /// Reuse measured lengths from `<out>/<lengthsCache>` and save new ones.
    pub use_cache: bool,
    /// Overrides the `out` setting.
    pub out: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            use_cache: true,
            out: None,
        }
    }
}

/// A laid-out paper together with the settings it was laid out under.
#[derive(Debug)]
pub struct Newspaper {
    pub settings: Settings,
    pub layout: Layout,
}

/// Read settings and inputs from `dirs` and paginate them.
pub fn lay_out(dirs: &[PathBuf], options: &Options) -> Result<Newspaper, Error> {
    let t0 = Instant::now();

    let mut settings = Settings::load(dirs)?;
    if let Some(out) = &options.out {
        settings.out = out.clone();
    }
    let t_settings = t0.elapsed();

    let items = input::load_dirs(dirs, &settings)?;
    let t_inputs = t0.elapsed();
    let n_items = items.len();

    let base = measure::base_oracle(&settings)?;
    let layout = if options.use_cache {
        let cached = CachingOracle::open(base, settings.cache_path());
        let layout = paginate(&settings, items, &cached);
        let (hits, misses) = cached.stats();
        log::info!("Length cache: {hits} hits, {misses} misses");
        // keep what was measured even if the layout failed
        if let Err(e) = cached.save() {
            log::warn!("Cannot save length cache: {e}");
        }
        layout?
    } else {
        paginate(&settings, items, &base)?
    };
    let t_total = t0.elapsed();

    log::info!(
        "Timing: settings={:.1}ms, inputs={:.1}ms, layout={:.1}ms, total={:.1}ms ({} inputs, {} pages)",
        t_settings.as_secs_f64() * 1000.0,
        (t_inputs - t_settings).as_secs_f64() * 1000.0,
        (t_total - t_inputs).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        n_items,
        layout.pages.len(),
    );

    Ok(Newspaper { settings, layout })
}

fn paginate(
    settings: &Settings,
    items: Vec<model::Item>,
    oracle: &dyn LengthOracle,
) -> Result<Layout, Error> {
    let mut sink = LogSink;
    Engine::new(settings, items, oracle, &mut sink)?.run()
}

/// Write the text dump and preamble into the output directory, plus a proof
/// PDF at `proof` if asked. Returns the files written.
pub fn write_outputs(
    layout: &Layout,
    settings: &Settings,
    proof: Option<&Path>,
) -> Result<Vec<PathBuf>, Error> {
    let t0 = Instant::now();
    std::fs::create_dir_all(&settings.out).map_err(Error::Io)?;

    let dump = settings.output_path("layout");
    render::write_dump(layout, &dump)?;
    let preamble = settings.output_path("preamble");
    render::write_preamble(layout, &preamble)?;
    let mut written = vec![dump, preamble];

    if let Some(path) = proof {
        let bytes = render::render_proof(layout, settings)?;
        std::fs::write(path, &bytes).map_err(Error::Io)?;
        log::debug!("Proof is {} bytes", bytes.len());
        written.push(path.to_path_buf());
    }

    log::info!(
        "Wrote {} files in {:.1}ms",
        written.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(written)
}
