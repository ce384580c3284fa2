use crate::conversion::config::{Charset, CsvParsingOptions};
use crate::conversion::errors::CsvParseError;
use crate::conversion::tokenizer::CsvRowReader;

fn reader(data: &str) -> CsvRowReader<'_> {
    CsvRowReader::new(data.as_bytes(), CsvParsingOptions::default())
}

#[test]
fn test_header_and_rows() {
    let mut rows = reader("case,activity,timestamp\n1,Register,2020-01-01\n2,Review,2020-01-02\n");
    assert_eq!(rows.read_header().unwrap(), vec!["case", "activity", "timestamp"]);

    let first = rows.read_next().unwrap().unwrap();
    assert_eq!(first.line, 2);
    assert_eq!(first.fields, vec!["1", "Register", "2020-01-01"]);

    let second = rows.read_next().unwrap().unwrap();
    assert_eq!(second.line, 3);
    assert_eq!(second.fields, vec!["2", "Review", "2020-01-02"]);

    assert!(rows.read_next().unwrap().is_none());
    // Stays at EOF
    assert!(rows.read_next().unwrap().is_none());
}

#[test]
fn test_quoted_fields() {
    let mut rows = reader("a,b\n\"x,y\",\"he said \"\"hi\"\"\"\n\"multi\nline\",plain\n");
    rows.read_header().unwrap();

    let first = rows.read_next().unwrap().unwrap();
    assert_eq!(first.fields, vec!["x,y", "he said \"hi\""]);

    let second = rows.read_next().unwrap().unwrap();
    assert_eq!(second.fields, vec!["multi\nline", "plain"]);
    // The embedded newline counts towards line numbers
    assert_eq!(second.line, 3);
}

#[test]
fn test_custom_separator_and_escape() {
    let options = CsvParsingOptions {
        separator: b';',
        escape: Some(b'\\'),
        ..CsvParsingOptions::default()
    };
    let mut rows = CsvRowReader::new(
        "a;b\n\"quote: \\\" done\";2\n".as_bytes(),
        options,
    );
    rows.read_header().unwrap();
    let row = rows.read_next().unwrap().unwrap();
    assert_eq!(row.fields, vec!["quote: \" done", "2"]);
}

#[test]
fn test_crlf_and_blank_lines() {
    let mut rows = reader("a,b\r\n1,2\r\n\r\n\r\n3,4\r\n");
    rows.read_header().unwrap();
    assert_eq!(rows.read_next().unwrap().unwrap().fields, vec!["1", "2"]);
    // Blank lines are skipped entirely
    assert_eq!(rows.read_next().unwrap().unwrap().fields, vec!["3", "4"]);
    assert!(rows.read_next().unwrap().is_none());
}

#[test]
fn test_bare_carriage_return_line_numbers() {
    // Classic Mac line endings: records end at \r without \n
    let mut rows = reader("a,b\r1,2\r3,4\r");
    rows.read_header().unwrap();

    let first = rows.read_next().unwrap().unwrap();
    assert_eq!(first.line, 2);
    assert_eq!(first.fields, vec!["1", "2"]);

    let second = rows.read_next().unwrap().unwrap();
    assert_eq!(second.line, 3);
    assert_eq!(second.fields, vec!["3", "4"]);

    let mut rows = reader("a,b\r1,2\r3\r");
    rows.read_header().unwrap();
    rows.read_next().unwrap().unwrap();
    let err = rows.read_next().unwrap_err();
    assert!(matches!(err, CsvParseError::FieldCountMismatch { line: 3, .. }));
}

#[test]
fn test_empty_fields_and_trailing_separator() {
    let mut rows = reader("a,b,c\n,,\nx,,z\n");
    rows.read_header().unwrap();
    assert_eq!(rows.read_next().unwrap().unwrap().fields, vec!["", "", ""]);
    assert_eq!(rows.read_next().unwrap().unwrap().fields, vec!["x", "", "z"]);
}

#[test]
fn test_unterminated_quote() {
    let mut rows = reader("a,b\n\"open,2\n");
    rows.read_header().unwrap();
    let err = rows.read_next().unwrap_err();
    assert!(matches!(err, CsvParseError::UnterminatedQuote { line: 2 }));
}

#[test]
fn test_field_count_mismatch() {
    let mut rows = reader("a,b,c\n1,2\n");
    rows.read_header().unwrap();
    let err = rows.read_next().unwrap_err();
    assert!(matches!(
        err,
        CsvParseError::FieldCountMismatch {
            line: 2,
            expected: 3,
            got: 2
        }
    ));
}

#[test]
fn test_empty_input() {
    let mut rows = reader("");
    assert!(matches!(
        rows.read_header().unwrap_err(),
        CsvParseError::EmptyInput
    ));
}

#[test]
fn test_latin1_decoding() {
    let options = CsvParsingOptions {
        charset: Charset::Latin1,
        ..CsvParsingOptions::default()
    };
    // "café" in ISO-8859-1
    let data: &[u8] = b"name\ncaf\xe9\n";
    let mut rows = CsvRowReader::new(data, options);
    rows.read_header().unwrap();
    assert_eq!(rows.read_next().unwrap().unwrap().fields, vec!["caf\u{e9}"]);
}

#[test]
fn test_iterator_interface() {
    let mut rows = reader("a\n1\n2\n3\n");
    rows.read_header().unwrap();
    let collected: Vec<_> = rows.map(|r| r.unwrap().fields).collect();
    assert_eq!(collected, vec![vec!["1"], vec!["2"], vec!["3"]]);
}
