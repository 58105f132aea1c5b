mod common;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pasteup::measure::{CachingOracle, LengthOracle, MeasureRequest, MetricOracle, base_oracle};
use pasteup::Error;

use common::{ScriptedOracle, approx, scratch_dir, settings_with, write_file};

fn request<'a>(key: &'a str, width: f64, splits: &'a [f64], content: &'a str) -> MeasureRequest<'a> {
    MeasureRequest {
        key,
        width,
        prior_splits: splits,
        content,
        modified: None,
    }
}

fn at(secs: u64) -> Option<SystemTime> {
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

#[test]
fn one_word_per_line_when_narrow() {
    let oracle = MetricOracle::helvetica(10.0, 1.2, 0.0);
    let len = oracle.measure(&request("t", 1.0, &[], "one two three")).unwrap();
    assert!(approx(len, 36.0), "{len}");
}

#[test]
fn earlier_boxes_keep_whole_lines() {
    let oracle = MetricOracle::helvetica(10.0, 1.2, 0.0);
    // a 20pt box holds one 12pt line; the rest is two more lines
    let len = oracle.measure(&request("t", 1.0, &[20.0], "one two three")).unwrap();
    assert!(approx(len, 44.0), "{len}");
    let len = oracle.measure(&request("t", 1.0, &[24.0], "one two three")).unwrap();
    assert!(approx(len, 36.0), "{len}");
}

#[test]
fn paragraphs_are_separated_by_parskip() {
    let oracle = MetricOracle::helvetica(10.0, 1.2, 3.0);
    let len = oracle
        .measure(&request("t", 500.0, &[], "First paragraph.\n\nSecond one."))
        .unwrap();
    assert!(approx(len, 27.0), "{len}");

    // CRLF files and whitespace-only separators too
    for text in ["First paragraph.\r\n\r\nSecond one.", "First\r\nparagraph.\n \t\nSecond one.\r\n"] {
        let len = oracle.measure(&request("t", 500.0, &[], text)).unwrap();
        assert!(approx(len, 27.0), "{text:?}: {len}");
    }
}

#[test]
fn wide_column_sets_a_short_text_on_one_line() {
    let oracle = MetricOracle::helvetica(10.0, 1.2, 0.0);
    let len = oracle.measure(&request("t", 500.0, &[], "one two three")).unwrap();
    assert!(approx(len, 12.0), "{len}");
    assert!(approx(oracle.measure(&request("t", 500.0, &[], "   ")).unwrap(), 0.0));
}

#[test]
fn zero_width_cannot_be_measured() {
    let oracle = MetricOracle::helvetica(10.0, 1.2, 0.0);
    let err = oracle.measure(&request("t", 0.0, &[], "text")).unwrap_err();
    assert!(matches!(err, Error::Measure { .. }), "{err}");
}

#[test]
fn base_oracle_follows_settings() {
    let settings = settings_with(&[("fontSize", "20bp"), ("leading", "1.5")]);
    let oracle = base_oracle(&settings).unwrap();
    let len = oracle.measure(&request("t", 1.0, &[], "a b")).unwrap();
    assert!(approx(len, 60.0), "{len}");

    let missing = settings_with(&[("measureFont", "/nonexistent/font.ttf")]);
    assert!(base_oracle(&missing).is_err());
}

#[test]
fn cache_answers_repeated_questions() {
    let cache = CachingOracle::new(ScriptedOracle::new(&[("a.tex", 42.0)]));
    let req = MeasureRequest {
        modified: at(1000),
        ..request("a.tex", 50.0, &[], "text")
    };
    assert_eq!(cache.measure(&req).unwrap(), 42.0);
    assert_eq!(cache.measure(&req).unwrap(), 42.0);
    assert_eq!(cache.stats(), (1, 1));
    assert_eq!(cache.len(), 1);

    // different cuts are a different question
    let splits = [10.0];
    let cut = MeasureRequest {
        prior_splits: &splits,
        ..req
    };
    cache.measure(&cut).unwrap();
    assert_eq!(cache.stats(), (1, 2));

    // a newer source is measured again
    let newer = MeasureRequest {
        modified: at(2000),
        ..req
    };
    cache.measure(&newer).unwrap();
    assert_eq!(cache.stats(), (1, 3));
}

#[test]
fn requests_without_a_timestamp_bypass_the_cache() {
    let cache = CachingOracle::new(ScriptedOracle::new(&[]).with_default(7.0));
    let req = request("continued-on", 50.0, &[], "Continued on page 99...");
    assert_eq!(cache.measure(&req).unwrap(), 7.0);
    assert_eq!(cache.measure(&req).unwrap(), 7.0);
    assert_eq!(cache.stats(), (0, 0));
    assert!(cache.is_empty());
}

#[test]
fn cache_survives_a_restart() {
    let dir = scratch_dir("cache");
    let path = dir.join("out").join("lengths.cache");
    let key = dir.join("gone.tex").to_string_lossy().into_owned();
    let req = MeasureRequest {
        modified: at(1000),
        ..request(&key, 50.0, &[12.0, 24.5], "text")
    };

    let first = CachingOracle::open(ScriptedOracle::new(&[]).with_default(42.0), path.clone());
    assert!(first.is_empty());
    first.measure(&req).unwrap();
    first.save().unwrap();
    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.starts_with("v1\n"));

    // a different answer from the inner oracle proves the cached one is used
    let second = CachingOracle::open(ScriptedOracle::new(&[]).with_default(99.0), path.clone());
    assert_eq!(second.len(), 1);
    assert_eq!(second.measure(&req).unwrap(), 42.0);
    assert_eq!(second.stats(), (1, 0));
}

#[test]
fn clean_cache_is_not_written() {
    let dir = scratch_dir("cache-clean");
    let path = dir.join("lengths.cache");
    let cache = CachingOracle::open(ScriptedOracle::new(&[]), path.clone());
    cache.save().unwrap();
    assert!(!path.exists());
}

#[test]
fn entries_for_changed_files_are_dropped() {
    let dir = scratch_dir("cache-stale");
    let source = write_file(&dir, "story.tex", "%#Type=article\nText.\n");
    let key = source.to_string_lossy().into_owned();
    let path = dir.join("lengths.cache");

    // measured against a timestamp the file no longer has
    let req = MeasureRequest {
        modified: at(1000),
        ..request(&key, 50.0, &[], "Text.")
    };
    let cache = CachingOracle::open(ScriptedOracle::new(&[]).with_default(5.0), path.clone());
    cache.measure(&req).unwrap();
    cache.save().unwrap();

    let reopened = CachingOracle::open(ScriptedOracle::new(&[]), path);
    assert!(reopened.is_empty());
}

#[test]
fn unknown_cache_version_starts_empty() {
    let dir = scratch_dir("cache-version");
    let path = write_file(&dir, "lengths.cache", "v0\nx.tex\t50.0000\t\t1000\t12\n");
    let cache = CachingOracle::open(ScriptedOracle::new(&[]), path);
    assert!(cache.is_empty());
}

#[cfg(unix)]
mod command {
    use pasteup::measure::{CommandOracle, LengthOracle};
    use pasteup::Error;

    use super::{approx, request};

    fn sh(script: &str) -> CommandOracle {
        CommandOracle::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn reads_the_last_line_as_points() {
        let oracle = sh("echo measuring; echo 42");
        assert!(approx(oracle.measure(&request("a", 50.0, &[], "")).unwrap(), 42.0));
    }

    #[test]
    fn understands_units() {
        let oracle = sh("echo 1in");
        assert!(approx(oracle.measure(&request("a", 50.0, &[], "")).unwrap(), 72.0));
    }

    #[test]
    fn passes_content_and_geometry() {
        let oracle = sh("wc -c");
        assert!(approx(oracle.measure(&request("a", 50.0, &[], "hello")).unwrap(), 5.0));

        let oracle = sh("echo $PASTEUP_WIDTH");
        assert!(approx(oracle.measure(&request("a", 50.0, &[], "")).unwrap(), 50.0));

        let oracle = CommandOracle::new(
            "sh",
            vec!["-c".into(), "echo \"$1\"".into(), "sh".into(), "{width}".into()],
        );
        assert!(approx(oracle.measure(&request("a", 64.5, &[], "")).unwrap(), 64.5));

        let oracle = sh("echo \"$PASTEUP_SPLITS\" | tr ',' '\\n' | wc -l");
        let splits = [10.0, 20.0, 30.0];
        assert!(approx(oracle.measure(&request("a", 50.0, &splits, "")).unwrap(), 3.0));
    }

    #[test]
    fn talkative_program_does_not_block_on_its_input() {
        // more output than a pipe buffer holds, before reading any input
        let oracle = sh("head -c 200000 /dev/zero | tr '\\0' x; echo; cat >/dev/null; echo 10");
        let content = "x".repeat(200_000);
        assert!(approx(oracle.measure(&request("a", 50.0, &[], &content)).unwrap(), 10.0));
    }

    #[test]
    fn failures_are_measure_errors() {
        for script in ["exit 3", "true", "echo not-a-length", "echo inf", "echo NaN"] {
            let err = sh(script).measure(&request("a", 50.0, &[], "")).unwrap_err();
            assert!(matches!(err, Error::Measure { ref key, .. } if key == "a"), "{err}");
        }
        let missing = CommandOracle::new("/nonexistent/measure", Vec::new());
        assert!(missing.measure(&request("a", 50.0, &[], "")).is_err());
    }
}
