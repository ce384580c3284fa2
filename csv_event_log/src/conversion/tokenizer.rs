//! Streaming row reader for delimited text
//!
//! Turns a byte stream into rows of string fields, given a configurable
//! separator, quote character, escape character and charset. Supports
//! embedded separators and newlines inside quoted fields; embedded quotes are
//! written either by doubling the quote character or via the configured
//! escape character.
//!
//! The first row is always the header and is consumed separately via
//! [`CsvRowReader::read_header`]; every subsequent data row must have the
//! same field count as the header.

use std::io::BufRead;

use super::config::{Charset, CsvParsingOptions};
use super::errors::CsvParseError;

/// One data row: its string fields plus the (1-based) line number on which
/// the record started in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Line number (1-based) on which the record started
    pub line: u64,
    /// Field values, in column order
    pub fields: Vec<String>,
}

enum State {
    FieldStart,
    Unquoted,
    Quoted,
    /// Inside a quoted field, directly after a quote byte (either the closing
    /// quote or the first half of a doubled quote)
    QuoteInQuoted,
    /// Inside a quoted field, directly after the escape byte
    Escaped,
}

///
/// Streaming tokenizer over rows of delimited text
///
/// Reading is lazy: rows are produced one at a time via
/// [`CsvRowReader::read_next`] or the [`Iterator`] implementation. Blank
/// lines between records are skipped.
///
pub struct CsvRowReader<'a> {
    // Send so the external sorter can drive the reader from its worker thread
    reader: Box<dyn BufRead + Send + 'a>,
    options: CsvParsingOptions,
    /// Current line number (1-based); embedded newlines in quoted fields count
    line: u64,
    header_len: Option<usize>,
}

impl std::fmt::Debug for CsvRowReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRowReader")
            .field("options", &self.options)
            .field("line", &self.line)
            .field("header_len", &self.header_len)
            .finish_non_exhaustive()
    }
}

impl<'a> CsvRowReader<'a> {
    /// Create a new row reader over the given byte stream
    pub fn new<R: BufRead + Send + 'a>(reader: R, options: CsvParsingOptions) -> Self {
        Self {
            reader: Box::new(reader),
            options,
            line: 1,
            header_len: None,
        }
    }

    /// Read the header row (must be called before [`CsvRowReader::read_next`])
    ///
    /// The header's field count becomes the required width of every data row.
    /// Fails with [`CsvParseError::EmptyInput`] if the input contains no rows.
    pub fn read_header(&mut self) -> Result<Vec<String>, CsvParseError> {
        let (_, fields) = self.read_record()?.ok_or(CsvParseError::EmptyInput)?;
        self.header_len = Some(fields.len());
        Ok(fields)
    }

    /// Read the next data row, or `None` at the end of the stream
    ///
    /// Fails with [`CsvParseError::FieldCountMismatch`] if the row width
    /// differs from the header width (structural error).
    pub fn read_next(&mut self) -> Result<Option<Row>, CsvParseError> {
        match self.read_record()? {
            None => Ok(None),
            Some((line, fields)) => {
                if let Some(expected) = self.header_len {
                    if fields.len() != expected {
                        return Err(CsvParseError::FieldCountMismatch {
                            line,
                            expected,
                            got: fields.len(),
                        });
                    }
                }
                Ok(Some(Row { line, fields }))
            }
        }
    }

    /// Read the next record, skipping blank lines
    fn read_record(&mut self) -> Result<Option<(u64, Vec<String>)>, CsvParseError> {
        loop {
            match self.read_raw_record()? {
                None => return Ok(None),
                Some((line, fields, saw_quote)) => {
                    // A blank line parses as a single empty unquoted field
                    if fields.len() == 1 && fields[0].is_empty() && !saw_quote {
                        continue;
                    }
                    return Ok(Some((line, fields)));
                }
            }
        }
    }

    fn read_raw_record(&mut self) -> Result<Option<(u64, Vec<String>, bool)>, CsvParseError> {
        let record_line = self.line;
        let mut fields: Vec<String> = Vec::new();
        let mut field: Vec<u8> = Vec::new();
        let mut saw_quote = false;
        let mut consumed_any = false;
        let mut state = State::FieldStart;

        let separator = self.options.separator;
        let quote = self.options.quote;
        // An escape byte equal to the quote byte is the same as quote doubling
        let escape = self.options.escape.filter(|e| *e != quote);

        loop {
            let Some(b) = self.next_byte()? else {
                // End of stream
                if !consumed_any {
                    return Ok(None);
                }
                if matches!(state, State::Quoted | State::Escaped) {
                    return Err(CsvParseError::UnterminatedQuote { line: record_line });
                }
                fields.push(self.decode(std::mem::take(&mut field)));
                return Ok(Some((record_line, fields, saw_quote)));
            };
            consumed_any = true;

            match state {
                State::FieldStart => {
                    if b == quote {
                        saw_quote = true;
                        state = State::Quoted;
                    } else if b == separator {
                        fields.push(String::new());
                    } else if b == b'\r' || b == b'\n' {
                        self.consume_crlf(b)?;
                        fields.push(self.decode(std::mem::take(&mut field)));
                        return Ok(Some((record_line, fields, saw_quote)));
                    } else {
                        field.push(b);
                        state = State::Unquoted;
                    }
                }
                State::Unquoted => {
                    if b == separator {
                        fields.push(self.decode(std::mem::take(&mut field)));
                        state = State::FieldStart;
                    } else if b == b'\r' || b == b'\n' {
                        self.consume_crlf(b)?;
                        fields.push(self.decode(std::mem::take(&mut field)));
                        return Ok(Some((record_line, fields, saw_quote)));
                    } else {
                        field.push(b);
                    }
                }
                State::Quoted => {
                    if b == quote {
                        state = State::QuoteInQuoted;
                    } else if escape == Some(b) {
                        state = State::Escaped;
                    } else {
                        field.push(b);
                    }
                }
                State::Escaped => {
                    field.push(b);
                    state = State::Quoted;
                }
                State::QuoteInQuoted => {
                    if b == quote {
                        // Doubled quote: one literal quote byte
                        field.push(quote);
                        state = State::Quoted;
                    } else if b == separator {
                        fields.push(self.decode(std::mem::take(&mut field)));
                        state = State::FieldStart;
                    } else if b == b'\r' || b == b'\n' {
                        self.consume_crlf(b)?;
                        fields.push(self.decode(std::mem::take(&mut field)));
                        return Ok(Some((record_line, fields, saw_quote)));
                    } else {
                        // Text after the closing quote continues the field
                        field.push(b);
                        state = State::Unquoted;
                    }
                }
            }
        }
    }

    /// Consume the `\n` of a `\r\n` pair, given the already-read terminator byte
    ///
    /// A bare `\r` terminator (classic Mac line endings) still counts towards
    /// the line numbers used in error reporting.
    fn consume_crlf(&mut self, terminator: u8) -> Result<(), CsvParseError> {
        if terminator == b'\r' {
            if self.peek_byte()? == Some(b'\n') {
                self.next_byte()?;
            } else {
                self.line += 1;
            }
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>, CsvParseError> {
        let buf = self.reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        let b = buf[0];
        self.reader.consume(1);
        if b == b'\n' {
            self.line += 1;
        }
        Ok(Some(b))
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, CsvParseError> {
        let buf = self.reader.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn decode(&self, bytes: Vec<u8>) -> String {
        match self.options.charset {
            Charset::Utf8 => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            },
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl Iterator for CsvRowReader<'_> {
    type Item = Result<Row, CsvParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}
