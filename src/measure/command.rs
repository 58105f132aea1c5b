use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use super::{LengthOracle, MeasureRequest};
use crate::error::Error;
use crate::settings::Settings;
use crate::units::parse_points;

/// Runs an external program per request. The content goes to stdin, the
/// width and prior splits (in points) to `PASTEUP_WIDTH` / `PASTEUP_SPLITS`,
/// and the last non-empty line of stdout is read back as a length
/// (bare numbers are points).
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandOracle {
            program: program.into(),
            args,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let program = settings
            .measure_command
            .clone()
            .ok_or_else(|| Error::Settings("measureCommand is not set".into()))?;
        Ok(CommandOracle::new(program, settings.measure_args.clone()))
    }
}

impl LengthOracle for CommandOracle {
    fn measure(&self, req: &MeasureRequest<'_>) -> Result<f64, Error> {
        let fail = |msg: String| Error::Measure {
            key: req.key.to_string(),
            msg,
        };
        let width = format!("{:.4}", req.width);
        let splits: Vec<String> = req.prior_splits.iter().map(|s| format!("{s:.4}")).collect();
        let args: Vec<String> = self.args.iter().map(|a| a.replace("{width}", &width)).collect();

        let t0 = std::time::Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .env("PASTEUP_WIDTH", &width)
            .env("PASTEUP_SPLITS", splits.join(","))
            .env("PASTEUP_KEY", req.key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("cannot run {}: {e}", self.program)))?;

        // stdin is written while the output pipes drain
        let stdin = child.stdin.take();
        let content = req.content.as_bytes();
        let (written, output) = std::thread::scope(|s| {
            let writer = s.spawn(move || match stdin {
                Some(mut pipe) => match pipe.write_all(content) {
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                },
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output.map_err(|e| fail(format!("waiting for {}: {e}", self.program)))?;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(fail(format!("writing to {}: {e}", self.program))),
            Err(_) => return Err(fail(format!("writing to {} failed", self.program))),
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(last) = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() else {
            return Err(fail(format!("{} printed no length", self.program)));
        };
        // a bare number is taken as points
        let length = match last.parse::<f64>() {
            Ok(v) => v,
            Err(_) => parse_points(last).map_err(fail)?,
        };
        if !length.is_finite() {
            return Err(fail(format!("{} printed {last}, not a length", self.program)));
        }
        log::debug!(
            "Measured {} at {width}pt with {} splits: {length:.2}pt in {:.1}ms",
            req.key,
            splits.len(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(length)
    }
}
