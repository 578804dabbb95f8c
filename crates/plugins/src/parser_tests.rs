// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn raw_wraps_line_as_message() {
    let record = LineFormat::Raw.parse("hello world").unwrap();
    assert_eq!(record["message"], "hello world");
}

#[test]
fn json_lines_become_records() {
    let format = LineFormat::new("json", None).unwrap();
    let record = format.parse(r#"{"status": 200, "path": "/x"}"#).unwrap();
    assert_eq!(record["status"], 200);
    assert_eq!(record["path"], "/x");
}

#[test]
fn json_rejects_garbage() {
    let format = LineFormat::new("json", None).unwrap();
    assert!(matches!(format.parse("not json"), Err(ParseError::Line(_))));
}

#[test]
fn ltsv_splits_labeled_fields() {
    let record = LineFormat::Ltsv.parse("host:1.2.3.4\tstatus:200\tpath:/index").unwrap();
    assert_eq!(record["host"], "1.2.3.4");
    assert_eq!(record["status"], "200");
    assert_eq!(record["path"], "/index");
}

#[test]
fn ltsv_rejects_unlabeled_field() {
    assert!(matches!(LineFormat::Ltsv.parse("no-colon-here"), Err(ParseError::Line(_))));
}

#[test]
fn regexp_uses_named_captures() {
    let format =
        LineFormat::new("regexp", Some(r"^(?P<verb>\S+) (?P<path>\S+)$")).unwrap();
    let record = format.parse("GET /index.html").unwrap();
    assert_eq!(record["verb"], "GET");
    assert_eq!(record["path"], "/index.html");
}

#[test]
fn regexp_requires_pattern() {
    assert!(LineFormat::new("regexp", None).is_err());
}

#[parameterized(
    unknown = { "xml" },
    typo = { "jsonl" },
)]
fn unknown_formats_rejected(format: &str) {
    assert!(LineFormat::new(format, None).is_err());
}

#[test]
fn time_parser_reads_utc_when_no_zone() {
    let parser = TimeParser::new("time", "%Y-%m-%d %H:%M:%S", None).unwrap();
    let mut record = Record::new();
    record.insert("time".into(), Value::String("2026-03-01 12:00:00".into()));
    let time = parser.extract(&record).unwrap().unwrap();
    assert_eq!(time.as_secs(), 1_772_366_400);
}

#[test]
fn time_parser_honors_fixed_offset() {
    let utc = TimeParser::new("time", "%Y-%m-%d %H:%M:%S", None).unwrap();
    let tokyo = TimeParser::new("time", "%Y-%m-%d %H:%M:%S", Some("+09:00")).unwrap();
    let mut record = Record::new();
    record.insert("time".into(), Value::String("2026-03-01 12:00:00".into()));

    let utc_time = utc.extract(&record).unwrap().unwrap();
    let tokyo_time = tokyo.extract(&record).unwrap().unwrap();
    assert_eq!(utc_time.as_secs() - tokyo_time.as_secs(), 9 * 3600);
}

#[test]
fn time_parser_uses_embedded_zone() {
    let parser = TimeParser::new("time", "%Y-%m-%dT%H:%M:%S%z", Some("+09:00")).unwrap();
    let mut record = Record::new();
    record.insert("time".into(), Value::String("2026-03-01T12:00:00+0000".into()));
    let time = parser.extract(&record).unwrap().unwrap();
    // The embedded +0000 wins over the configured offset.
    assert_eq!(time.as_secs(), 1_772_366_400);
}

#[test]
fn time_parser_missing_field_is_none() {
    let parser = TimeParser::new("time", "%Y", None).unwrap();
    assert!(parser.extract(&Record::new()).unwrap().is_none());
}

#[test]
fn time_parser_bad_value_is_error() {
    let parser = TimeParser::new("time", "%Y-%m-%d", None).unwrap();
    let mut record = Record::new();
    record.insert("time".into(), Value::String("not a date".into()));
    assert!(matches!(parser.extract(&record), Err(ParseError::Time { .. })));
}
