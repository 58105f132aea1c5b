use pasteup::layout::Estimate;
use pasteup::settings::ColumnStrategy;

#[test]
fn balance_spreads_columns_evenly() {
    let e = Estimate::calculate(ColumnStrategy::Balance, 100.0, 10.0, 20);
    assert_eq!(e.total_columns, 10);
    assert_eq!(e.num_pages, 1);
    assert_eq!(e.cols_per_page, 10);
}

#[test]
fn fill_first_uses_full_pages() {
    let e = Estimate::calculate(ColumnStrategy::FillFirst, 100.0, 10.0, 20);
    assert_eq!(e.total_columns, 10);
    assert_eq!(e.num_pages, 1);
    assert_eq!(e.cols_per_page, 20);
}

#[test]
fn partial_column_rounds_up() {
    let e = Estimate::calculate(ColumnStrategy::Balance, 101.0, 10.0, 4);
    assert_eq!(e.total_columns, 11);
    assert_eq!(e.num_pages, 3);
    // 11 / 3 = 3.67
    assert_eq!(e.cols_per_page, 4);
}

#[test]
fn balance_over_several_pages() {
    let e = Estimate::calculate(ColumnStrategy::Balance, 90.0, 10.0, 6);
    assert_eq!(e.total_columns, 9);
    assert_eq!(e.num_pages, 2);
    assert_eq!(e.cols_per_page, 5);
    assert_eq!(e.initial_page_columns(6), vec![5, 4]);
}

#[test]
fn fill_first_leaves_the_rest_for_the_last_page() {
    let e = Estimate::calculate(ColumnStrategy::FillFirst, 90.0, 10.0, 6);
    assert_eq!(e.num_pages, 2);
    assert_eq!(e.initial_page_columns(6), vec![6, 3]);
}

#[test]
fn no_content_still_gets_a_page() {
    let e = Estimate::calculate(ColumnStrategy::Balance, 0.0, 10.0, 5);
    assert_eq!(e.total_columns, 1);
    assert_eq!(e.num_pages, 1);
    assert_eq!(e.cols_per_page, 1);
    assert_eq!(e.initial_page_columns(5), vec![1]);
}

#[test]
fn zero_max_columns_is_treated_as_one() {
    let e = Estimate::calculate(ColumnStrategy::FillFirst, 30.0, 10.0, 0);
    assert_eq!(e.num_pages, 3);
    assert_eq!(e.cols_per_page, 1);
}

#[test]
fn estimate_is_repeatable() {
    for strategy in [ColumnStrategy::Balance, ColumnStrategy::FillFirst] {
        let a = Estimate::calculate(strategy, 1234.5, 97.0, 7);
        let b = Estimate::calculate(strategy, 1234.5, 97.0, 7);
        assert_eq!(a, b);
    }
}

#[test]
fn display_summarises() {
    let e = Estimate::calculate(ColumnStrategy::Balance, 100.0, 10.0, 20);
    assert_eq!(e.to_string(), "10 columns => 1 pages mostly 10 cols");
}
