mod common;

use pasteup::diagnostics::CapturingSink;
use pasteup::layout::flow::{place_first_fit, place_flowable, worst_fit};
use pasteup::layout::{Annotations, Article, ArticleId, ColumnarPage, FlowCx, FlowOutcome, Occupant};
use pasteup::Settings;

use common::{
    ScriptedOracle, article, article_fragments, assert_tiled, fixed, settings_with, small_settings,
};

const ID: ArticleId = ArticleId(0);

fn new_article(total: f64) -> Article {
    Article::new(&article(0, "a.tex"), 50.0, total)
}

fn cx<'a>(
    settings: &'a Settings,
    oracle: &'a ScriptedOracle,
    notes: Annotations,
    sink: &'a mut CapturingSink,
) -> FlowCx<'a> {
    FlowCx {
        settings,
        oracle,
        notes,
        diag: sink,
    }
}

#[test]
fn worst_fit_takes_the_tallest_gap() {
    let mut page = ColumnarPage::new(1, 3, 100.0).unwrap();
    page.place(0, fixed(9, 1), 0.0, 60.0, 2.0).unwrap();
    page.place(1, fixed(9, 1), 0.0, 10.0, 2.0).unwrap();
    page.place(2, fixed(9, 1), 0.0, 10.0, 2.0).unwrap();
    assert_eq!(worst_fit(&page), Some((1, 10.0, 100.0)));
}

#[test]
fn nearly_filling_article_is_stretched() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("a.tex", 95.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    let mut a = new_article(95.0);

    let out = place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    let f = &page.column(0).fragments()[0];
    assert_eq!((f.start, f.end), (0.0, 100.0));
    let frags = article_fragments(&page, 0);
    assert!(frags[0].stretched);
    assert_eq!(frags[0].height, 95.0);
    assert_eq!(a.splits(), &[95.0]);
}

#[test]
fn short_article_fills_its_gap() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    let mut a = new_article(40.0);

    let out = place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    let f = page.column(0).fragments();
    assert_eq!(f.len(), 1);
    assert_eq!((f[0].start, f[0].end), (0.0, 100.0));
    let frag = &article_fragments(&page, 0)[0];
    assert!(frag.stretched);
    assert_eq!(frag.height, 40.0);
    assert_eq!(a.splits(), &[40.0]);
    // fitting whole needs no remeasure
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn stretch_ratio_keeps_short_articles_short() {
    let settings = settings_with(&[("stretchRatio", "0.9")]);
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    let mut a = new_article(40.0);

    place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    let f = page.column(0).fragments();
    assert_eq!((f[0].start, f[0].end), (0.0, 40.0));
    assert!(f[1].is_empty());
    assert!(!article_fragments(&page, 0)[0].stretched);

    let mut b = Article::new(&article(1, "b.tex"), 50.0, 95.0);
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    place_flowable(&mut page, &mut b, ArticleId(1), 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert!(article_fragments(&page, 0)[0].stretched);
}

#[test]
fn goes_into_the_emptiest_column() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 2, 100.0).unwrap();
    page.place(0, fixed(9, 1), 0.0, 80.0, 2.0).unwrap();
    let mut a = new_article(30.0);

    place_flowable(&mut page, &mut a, ID, 2, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert!(article_fragments(&page, 0).is_empty());
    let f = &page.column(1).fragments()[0];
    assert_eq!((f.start, f.end), (0.0, 100.0));
}

#[test]
fn alley_separates_it_from_what_is_above() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 2, 100.0).unwrap();
    page.place(0, fixed(9, 1), 0.0, 100.0, 2.0).unwrap();
    page.place(1, fixed(8, 1), 0.0, 30.0, 2.0).unwrap();
    let mut a = new_article(50.0);

    let out = place_flowable(&mut page, &mut a, ID, 2, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    let f = page.column(1).fragments();
    assert!(matches!(f[1].occupant, Some(Occupant::Spacer(_))));
    assert_eq!((f[1].start, f[1].end), (30.0, 35.0));
    assert!(matches!(f[2].occupant, Some(Occupant::Article(_))));
    assert_eq!((f[2].start, f[2].end), (35.0, 100.0));
    assert_eq!(article_fragments(&page, 1)[0].height, 50.0);
    assert_tiled(page.column(1));
}

#[test]
fn long_article_runs_across_columns() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("a.tex", 150.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 2, 100.0).unwrap();
    let mut a = new_article(150.0);

    let out = place_flowable(&mut page, &mut a, ID, 2, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    assert_eq!(a.splits(), &[100.0, 50.0]);
    assert_eq!(a.split_count(), 2);
    let second = &page.column(1).fragments()[0];
    assert_eq!((second.start, second.end), (0.0, 50.0));
    // the last slice was remeasured with the first cut known
    let calls = oracle.calls_for("a.tex");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].2, 1);
}

#[test]
fn page_grows_when_columns_run_out() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("a.tex", 150.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    let mut a = new_article(150.0);

    let out = place_flowable(&mut page, &mut a, ID, 2, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    assert_eq!(page.num_cols(), 2);
    assert_eq!(page.extra_cols(), 1);
    assert!(sink.contains("Added column 2"));
}

#[test]
fn rest_overflows_with_room_for_the_note() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("a.tex", 150.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    let mut a = new_article(150.0);
    let notes = Annotations {
        continued_from: 0.0,
        continued_on: 3.0,
    };

    let out = place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, notes, &mut sink)).unwrap();
    let FlowOutcome::Overflow(o) = out else {
        panic!("expected an overflow, got {out:?}");
    };
    assert!((o.remaining - 53.0).abs() < 1e-9);
    assert_eq!(o.split, 1);
    assert_eq!(o.from_page, 1);
    assert_eq!(a.continued_on(0), Some(2));
    assert_eq!(a.splits(), &[97.0]);

    let frag = &article_fragments(&page, 0)[0];
    assert_eq!(frag.height, 97.0);
    assert_eq!(frag.reserved, 3.0);
    // the box itself still fills the column
    assert_eq!(page.column(0).fragments()[0].end, 100.0);
}

#[test]
fn continuation_reserves_room_for_the_from_note() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("a.tex", 150.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(2, 1, 100.0).unwrap();
    let mut a = new_article(150.0);
    a.split(100.0);
    let notes = Annotations {
        continued_from: 4.0,
        continued_on: 3.0,
    };

    let out = place_first_fit(&mut page, &mut a, ID, 50.0, Some(1), 1, &mut cx(&settings, &oracle, notes, &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    let f = &page.column(0).fragments()[0];
    assert_eq!((f.start, f.end), (0.0, 54.0));
    let frag = &article_fragments(&page, 0)[0];
    assert_eq!(frag.split, 1);
    assert_eq!(frag.height, 50.0);
    assert_eq!(frag.reserved, 4.0);
    assert_eq!(frag.continued_from, Some(1));
}

#[test]
fn remeasured_to_nothing_cancels_the_continuation() {
    let settings = small_settings();
    // the text got shorter once the first cut was known
    let oracle = ScriptedOracle::new(&[("a.tex", 30.0)]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(2, 1, 100.0).unwrap();
    let mut a = new_article(50.0);
    a.split(40.0);
    let o = a.create_overflow(ID, 10.0, 1);
    assert_eq!(a.continued_on(0), Some(2));

    let out = place_first_fit(&mut page, &mut a, ID, o.remaining, Some(o.from_page), 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Complete);
    assert!(page.is_empty());
    assert_eq!(a.continued_on(0), None);
    assert!(sink.contains("already fully set"));
}

#[test]
fn full_page_is_reported() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    page.place(0, fixed(9, 1), 0.0, 100.0, 2.0).unwrap();
    let mut a = new_article(10.0);

    let out = place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::PageFull);
    assert!(sink.contains("Exactly filled page!"));
    assert!(a.splits().is_empty());
}

#[test]
fn sliver_gaps_are_unplaced() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[]);
    let mut sink = CapturingSink::default();
    let mut page = ColumnarPage::new(1, 1, 100.0).unwrap();
    page.place(0, fixed(9, 1), 0.0, 97.0, 2.0).unwrap();
    let mut a = new_article(10.0);

    let out = place_flowable(&mut page, &mut a, ID, 1, &mut cx(&settings, &oracle, Annotations::none(), &mut sink)).unwrap();
    assert_eq!(out, FlowOutcome::Unplaced);
    assert!(a.splits().is_empty());
    assert_eq!(a.split_count(), 0);
}

#[test]
fn note_heights_are_measured_at_column_width() {
    let settings = small_settings();
    let oracle = ScriptedOracle::new(&[("continued-from", 7.0), ("continued-on", 9.0)]);
    let notes = Annotations::measure(&settings, &oracle);
    assert_eq!(notes.continued_from, 7.0);
    assert_eq!(notes.continued_on, 9.0);
    assert_eq!(oracle.calls_for("continued-on")[0].1, 50.0);

    let silent = ScriptedOracle::new(&[]);
    assert_eq!(Annotations::measure(&settings, &silent), Annotations::none());
}
