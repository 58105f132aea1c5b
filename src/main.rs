use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pasteup",
    version,
    about = "Paginate articles, inserts and spreads into newspaper columns"
)]
struct Cli {
    /// Directories holding inputs and settings.properties; later ones override earlier settings.
    #[arg(required = true)]
    dirs: Vec<PathBuf>,
    /// Output directory (overrides the `out` setting).
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Also write a proof PDF of the page geometry.
    #[arg(long, value_name = "FILE")]
    proof: Option<PathBuf>,
    /// Measure everything afresh and leave the length cache alone.
    #[arg(long)]
    no_cache: bool,
    /// Show the layout decisions.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Only warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = pasteup::Options {
        use_cache: !cli.no_cache,
        out: cli.out,
    };
    let result = pasteup::lay_out(&cli.dirs, &options).and_then(|paper| {
        pasteup::write_outputs(&paper.layout, &paper.settings, cli.proof.as_deref())
    });
    match result {
        Ok(files) => {
            for f in files {
                println!("{}", f.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
