mod common;

use common::{messy_report, text_row};
use table_probe::{ProbeError, RowIntuiter, SelectiveRows, Value};

#[test]
fn locates_headers_comments_and_data_block() {
    let rows = messy_report();
    let total = rows.len();
    let tail: Vec<Vec<Value>> = rows[total - 10..].to_vec();

    let mut intuiter = RowIntuiter::new();
    intuiter
        .run(&rows, Some(tail.as_slice()), Some(total))
        .expect("row intuition");

    assert_eq!(intuiter.comment_lines, vec![0]);
    assert_eq!(intuiter.header_lines, vec![2, 3]);
    assert_eq!(intuiter.start_line, 4);
    assert_eq!(intuiter.end_line, Some(63));
    assert_eq!(
        intuiter.headers,
        vec!["region", "units_qty", "price_usd", "updated_day"]
    );
    assert!(intuiter.data_pattern_source().is_some());
}

#[test]
fn start_line_is_past_all_recorded_header_and_comment_lines() {
    let rows = messy_report();
    let mut intuiter = RowIntuiter::new();
    intuiter.run(&rows, None, None).expect("row intuition");

    let recorded = intuiter.header_lines.len() + intuiter.comment_lines.len();
    assert!(intuiter.start_line >= recorded);

    let strictly_increasing =
        |lines: &[usize]| lines.windows(2).all(|pair| pair[0] < pair[1]);
    assert!(strictly_increasing(&intuiter.header_lines));
    assert!(strictly_increasing(&intuiter.comment_lines));
    assert!(
        intuiter
            .header_lines
            .iter()
            .all(|line| !intuiter.comment_lines.contains(line))
    );
}

#[test]
fn single_header_line_is_used_verbatim() {
    let mut rows = vec![text_row(&["Name", "Total ($)"])];
    for i in 0..50 {
        rows.push(vec![
            Value::from(format!("item-{i}")),
            Value::from(i.to_string()),
        ]);
    }

    let mut intuiter = RowIntuiter::new();
    intuiter.run(&rows, None, None).expect("row intuition");
    assert_eq!(intuiter.header_lines, vec![0]);
    assert_eq!(intuiter.start_line, 1);
    assert_eq!(intuiter.headers, vec!["Name", "Total ($)"]);
}

#[test]
fn chaotic_streams_fail_pattern_inference() {
    let rows: Vec<Vec<Value>> = (0..80)
        .map(|i| {
            if i % 2 == 0 {
                text_row(&["a", "b", "c", "d", "e"])
            } else {
                vec![Value::Int(1), Value::Int(2)]
            }
        })
        .collect();

    let mut intuiter = RowIntuiter::new();
    let err = intuiter.run(&rows, None, None).unwrap_err();
    assert!(matches!(err, ProbeError::DataPattern { .. }));
}

#[test]
fn selective_rows_coalesce_headers_and_apply_boundaries() {
    let mut rows: Vec<Vec<Value>> = vec![text_row(&["h1"]), text_row(&["h2"])];
    rows.extend((0..10).map(|i| vec![Value::Int(i)]));

    let spec = table_probe::RowSpec {
        headers: Vec::new(),
        header_lines: vec![0, 1],
        start: 5,
        comments: vec![2, 3],
        end: Some(9),
    };

    let filtered: Vec<Vec<Value>> = SelectiveRows::new(rows, spec).collect();
    assert_eq!(filtered[0], vec![Value::from("h1_h2")]);
    let values: Vec<i64> = filtered[1..]
        .iter()
        .map(|row| match row[0] {
            Value::Int(i) => i,
            ref other => panic!("expected integer row, got {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn selective_rows_without_headers_yield_data_only() {
    let rows: Vec<Vec<Value>> = (0..5).map(|i| vec![Value::Int(i)]).collect();
    let spec = table_probe::RowSpec {
        start: 2,
        ..Default::default()
    };
    let filtered: Vec<Vec<Value>> = SelectiveRows::new(rows, spec).collect();
    assert_eq!(
        filtered,
        vec![vec![Value::Int(2)], vec![Value::Int(3)], vec![Value::Int(4)]]
    );
}

#[test]
fn spec_round_trips_through_serde() {
    let rows = messy_report();
    let mut intuiter = RowIntuiter::new();
    intuiter.run(&rows, None, None).expect("row intuition");

    let spec = intuiter.spec();
    let encoded = serde_json::to_string(&spec).expect("serialize spec");
    let decoded: table_probe::RowSpec = serde_json::from_str(&encoded).expect("parse spec");
    assert_eq!(decoded, spec);
}
