use std::io::Cursor;
use std::path::Path;

use super::*;
use tempfile::tempdir;

fn example(label: Label, pairs: &[(u32, f64)]) -> LabeledExample {
    LabeledExample {
        label,
        features: pairs.iter().copied().collect(),
    }
}

fn parse(text: &str) -> Result<Dataset, DatasetError> {
    parse_dataset(Cursor::new(text), Path::new("inline.dat"))
}

fn parse_error(text: &str) -> (usize, ParseErrorKind) {
    match parse(text) {
        Err(DatasetError::Parse { line, kind, .. }) => (line, kind),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn write_then_read_preserves_labels_and_pairs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("genfiles").join("features.dat");
    let dataset = Dataset {
        examples: vec![
            example(Label::Positive, &[(1, 0.1), (2, 3.5), (3, 1e-7)]),
            example(Label::Negative, &[(1, -2.25), (4, 0.333_333_333_333)]),
            example(Label::Positive, &[(2, 12345.678)]),
        ],
    };
    let summary = write_dataset(&path, &dataset, Some("training features")).unwrap();
    assert_eq!(summary.written, 3);
    assert_eq!(summary.positives, 2);
    assert_eq!(summary.negatives, 1);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# training features\n"));
    assert!(text.contains("-1 1:-2.25 4:0.333333333333\n"));

    let loaded = read_dataset(&path).unwrap();
    assert_eq!(loaded.len(), dataset.len());
    for (read, written) in loaded.examples.iter().zip(&dataset.examples) {
        assert_eq!(read.label, written.label);
        let read_pairs: Vec<_> = read.features.iter().collect();
        let written_pairs: Vec<_> = written.features.iter().collect();
        assert_eq!(read_pairs.len(), written_pairs.len());
        for ((ri, rv), (wi, wv)) in read_pairs.into_iter().zip(written_pairs) {
            assert_eq!(ri, wi);
            assert!((rv - wv).abs() <= 1e-6 * wv.abs().max(1.0));
        }
    }
}

#[test]
fn dense_features_round_trip_within_tolerance() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.dat");
    let dense = [0.1f32, 0.0, 0.987_654_3, 0.5];
    let mut writer = DatasetWriter::create(&path, None).unwrap();
    assert!(writer.write_features(Label::Negative, &dense).unwrap());
    writer.finish().unwrap();

    let loaded = read_dataset(&path).unwrap();
    let values = loaded.examples[0].features.to_dense(dense.len());
    for (read, written) in values.iter().zip(dense) {
        assert!((read - f64::from(written)).abs() <= 1e-6);
    }
    assert_eq!(loaded.examples[0].features.len(), 4);
}

#[test]
fn empty_feature_vectors_are_silently_omitted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.dat");
    let mut writer = DatasetWriter::create(&path, None).unwrap();
    assert!(!writer.write_features(Label::Positive, &[]).unwrap());
    assert!(writer.write_features(Label::Negative, &[1.0]).unwrap());
    let summary = writer.finish().unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.omitted, 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "-1 1:1\n");
}

#[test]
fn omit_zeros_drops_zero_components() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.dat");
    let mut writer = DatasetWriter::create(&path, None).unwrap().omit_zeros(true);
    writer
        .write_features(Label::Positive, &[0.0, 0.5, 0.0, 2.0])
        .unwrap();
    writer.finish().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "+1 2:0.5 4:2\n");
}

#[test]
fn comments_and_inline_comments_are_ignored() {
    let dataset = parse("# header\n+1 1:0.5 2:1 #sample a\n  # indented\n-1 3:2\n").unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.class_counts(), (1, 1));
    assert_eq!(dataset.max_index(), 3);
}

#[test]
fn rejects_missing_label_with_line_number() {
    assert_eq!(parse_error("+1 1:0.5\n1:0.5 2:0.1\n"), (2, ParseErrorKind::MissingLabel));
    assert_eq!(parse_error("# c\n\n"), (2, ParseErrorKind::MissingLabel));
}

#[test]
fn rejects_non_increasing_indices() {
    assert_eq!(
        parse_error("+1 1:0.5 3:1 3:2\n"),
        (
            1,
            ParseErrorKind::NonIncreasingIndex {
                previous: 3,
                index: 3
            }
        )
    );
    assert_eq!(
        parse_error("-1 2:0.5 1:1\n"),
        (
            1,
            ParseErrorKind::NonIncreasingIndex {
                previous: 2,
                index: 1
            }
        )
    );
}

#[test]
fn rejects_malformed_tokens() {
    assert_eq!(
        parse_error("+1 1:abc\n"),
        (1, ParseErrorKind::InvalidValue("abc".to_string()))
    );
    assert_eq!(
        parse_error("+1 1:NaN\n"),
        (1, ParseErrorKind::InvalidValue("NaN".to_string()))
    );
    assert_eq!(
        parse_error("+1 x:1\n"),
        (1, ParseErrorKind::InvalidIndex("x".to_string()))
    );
    assert_eq!(
        parse_error("+1 0.5\n"),
        (1, ParseErrorKind::MalformedPair("0.5".to_string()))
    );
    assert_eq!(parse_error("+1 0:1\n"), (1, ParseErrorKind::ZeroIndex));
    assert_eq!(
        parse_error("2 1:1\n"),
        (1, ParseErrorKind::InvalidLabel("2".to_string()))
    );
}

#[test]
fn accepts_unsigned_positive_label() {
    let dataset = parse("1 1:0.5\n").unwrap();
    assert_eq!(dataset.examples[0].label, Label::Positive);
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        read_dataset(&dir.path().join("absent.dat")),
        Err(DatasetError::Open { .. })
    ));
}

#[cfg(not(target_os = "windows"))]
#[test]
fn numeric_text_ignores_comma_decimal_locale() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.dat");
    // SAFETY: test-local locale switch with valid NUL-terminated names; the
    // call may fail when the locale is not installed, which still exercises
    // the formatting path below.
    unsafe {
        for name in [c"de_DE.UTF-8", c"de_DE", c"fr_FR.UTF-8"] {
            if !libc::setlocale(libc::LC_NUMERIC, name.as_ptr()).is_null() {
                break;
            }
        }
    }

    let mut writer = DatasetWriter::create(&path, None).unwrap();
    writer.write_features(Label::Positive, &[3.5]).unwrap();
    writer.finish().unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let loaded = read_dataset(&path).unwrap();

    crate::locale::pin_numeric_locale();
    assert_eq!(text, "+1 1:3.5\n");
    assert_eq!(loaded.examples[0].features.get(1), Some(3.5));
}
