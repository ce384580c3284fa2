//! External merge sort over the row stream
//!
//! Classic two-phase external sort with bounded memory:
//!
//! 1. **Partition**: rows are accumulated in memory up to the configured
//!    budget, sorted with the composite-key comparator and flushed as
//!    gz-compressed temporary segment files. Each segment is fully sorted
//!    internally.
//! 2. **Merge**: segments are k-way merged (bounded fan-in, multiple rounds
//!    if necessary) until one fully sorted segment remains, which is exposed
//!    as a lazy iterator of [`KeyedRow`]s.
//!
//! The whole pipeline runs on a background worker while the calling thread
//! polls at a short fixed interval, forwarding progress messages and
//! propagating cancellation requests. All temporary segments live in a fresh
//! directory owned by this sort instance and are removed on every exit path:
//! merged inputs are deleted as soon as a round no longer needs them, and the
//! directory itself is removed when the sorted iterator is dropped, or
//! immediately on error or cancellation.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::slice::ParallelSliceMut;
use tempfile::TempDir;

use super::config::{CsvConversionConfig, ResolvedColumns};
use super::errors::{ConversionError, SortError};
use super::progress::ConversionProgress;
use super::sort_key::{compare_rows, extract_key, KeyedRow};
use super::tokenizer::CsvRowReader;

/// Cancellation is also checked inside large partitions and merges, not only
/// at segment boundaries
const CANCEL_CHECK_ROWS: usize = 4096;

#[derive(Debug)]
enum SortOutcome {
    /// Path of the single fully sorted segment; `None` when the input had no
    /// data rows
    Sorted(Option<PathBuf>),
    Cancelled,
}

///
/// Sort all data rows of the given reader by their composite sort key
///
/// Runs the partition/merge pipeline on a background worker and polls for
/// completion; returns the lazily read, fully sorted row sequence. Returns
/// [`ConversionError::Cancelled`] (with all temporary files removed) when the
/// progress reporter signals cancellation.
///
pub(crate) fn sort_rows(
    reader: &mut CsvRowReader<'_>,
    columns: &ResolvedColumns,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<SortedRows, ConversionError> {
    let temp_dir = match &config.sort.temp_dir {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            tempfile::tempdir_in(parent)?
        }
        None => tempfile::tempdir()?,
    };
    let cancel_flag = AtomicBool::new(progress.is_cancelled());
    let (tx, rx) = mpsc::channel::<String>();
    let poll_interval = Duration::from_millis(config.sort.poll_interval_ms.max(1));

    let outcome: Result<SortOutcome, SortError> = thread::scope(|scope| {
        let cancel = &cancel_flag;
        let segment_dir = temp_dir.path();
        let worker = scope
            .spawn(move || run_sort_pipeline(reader, segment_dir, columns, config, cancel, &tx));

        while !worker.is_finished() {
            for message in rx.try_iter() {
                progress.log(&message);
            }
            if progress.is_cancelled() {
                cancel_flag.store(true, AtomicOrdering::Relaxed);
            }
            thread::sleep(poll_interval);
        }
        let joined = match worker.join() {
            Ok(result) => result,
            Err(_) => Err(SortError::WorkerPanic),
        };
        for message in rx.try_iter() {
            progress.log(&message);
        }
        joined
    });

    match outcome? {
        SortOutcome::Cancelled => {
            // Dropping the TempDir removes all remaining segments
            drop(temp_dir);
            progress.log("Sort cancelled, temporary segments removed");
            Err(ConversionError::Cancelled)
        }
        SortOutcome::Sorted(final_segment) => Ok(SortedRows::open(temp_dir, final_segment)?),
    }
}

/// Partition and merge phases, run on the background worker
fn run_sort_pipeline(
    reader: &mut CsvRowReader<'_>,
    segment_dir: &Path,
    columns: &ResolvedColumns,
    config: &CsvConversionConfig,
    cancel: &AtomicBool,
    messages: &Sender<String>,
) -> Result<SortOutcome, SortError> {
    if cancel.load(AtomicOrdering::Relaxed) {
        return Ok(SortOutcome::Cancelled);
    }
    let max_rows = config.sort.max_rows_in_memory.max(1);
    let mut segments: Vec<PathBuf> = Vec::new();
    let mut batch: Vec<KeyedRow> = Vec::new();

    // Partition phase
    while let Some(row) = reader.read_next()? {
        batch.push(extract_key(row, columns, config)?);
        if batch.len() % CANCEL_CHECK_ROWS == 0 && cancel.load(AtomicOrdering::Relaxed) {
            return Ok(SortOutcome::Cancelled);
        }
        if batch.len() >= max_rows {
            segments.push(flush_segment(segment_dir, segments.len(), &mut batch, messages)?);
        }
    }
    if !batch.is_empty() {
        segments.push(flush_segment(segment_dir, segments.len(), &mut batch, messages)?);
    }
    let _ = messages.send(format!(
        "Partition phase done: {} sorted segment(s)",
        segments.len()
    ));

    // Merge phase: k-way merge groups of segments until one remains
    let fan_in = config.sort.max_merge_fan_in.max(2);
    let mut round = 0usize;
    let mut next_id = segments.len();
    while segments.len() > 1 {
        round += 1;
        let _ = messages.send(format!(
            "Merge round {round}: {} segments, fan-in {fan_in}",
            segments.len()
        ));
        let mut merged: Vec<PathBuf> = Vec::with_capacity(segments.len().div_ceil(fan_in));
        for group in segments.chunks(fan_in) {
            let output = segment_path(segment_dir, next_id);
            next_id += 1;
            if !merge_segments(group, &output, cancel)? {
                return Ok(SortOutcome::Cancelled);
            }
            // Merged inputs are no longer needed
            for path in group {
                std::fs::remove_file(path)?;
            }
            merged.push(output);
        }
        segments = merged;
    }
    Ok(SortOutcome::Sorted(segments.pop()))
}

fn segment_path(dir: &Path, id: usize) -> PathBuf {
    dir.join(format!("segment-{id}.gz"))
}

/// Sort the in-memory batch and write it as a new compressed segment
fn flush_segment(
    dir: &Path,
    id: usize,
    batch: &mut Vec<KeyedRow>,
    messages: &Sender<String>,
) -> Result<PathBuf, SortError> {
    batch.par_sort_unstable_by(|a, b| compare_rows(a, b));
    let path = segment_path(dir, id);
    write_segment(&path, batch)?;
    let _ = messages.send(format!("Wrote sorted segment {id} ({} rows)", batch.len()));
    batch.clear();
    Ok(path)
}

/// Segment encoding: gz-compressed JSON lines of [`KeyedRow`]s
///
/// Implementation-defined, never part of the public contract.
fn write_segment(path: &Path, rows: &[KeyedRow]) -> Result<(), SortError> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
    for row in rows {
        serde_json::to_writer(&mut encoder, row)?;
        encoder.write_all(b"\n")?;
    }
    encoder.finish()?.flush()?;
    Ok(())
}

#[derive(Debug)]
struct SegmentReader {
    reader: BufReader<GzDecoder<BufReader<File>>>,
    buf: String,
}

impl SegmentReader {
    fn open(path: &Path) -> Result<Self, SortError> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(GzDecoder::new(BufReader::new(file))),
            buf: String::new(),
        })
    }

    fn next_row(&mut self) -> Result<Option<KeyedRow>, SortError> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(self.buf.trim_end())?))
    }
}

#[derive(Debug)]
struct HeapEntry {
    row: KeyedRow,
    source: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_rows(&self.row, &other.row).then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// K-way merge of sorted input segments into one sorted output segment
///
/// The final merge round covers the whole dataset, so cancellation is polled
/// every [`CANCEL_CHECK_ROWS`] emitted rows; returns `false` when the merge
/// was cancelled mid-way (the partial output is removed with the segment
/// directory).
fn merge_segments(
    inputs: &[PathBuf],
    output: &Path,
    cancel: &AtomicBool,
) -> Result<bool, SortError> {
    let mut readers = inputs
        .iter()
        .map(|path| SegmentReader::open(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(row) = reader.next_row()? {
            heap.push(Reverse(HeapEntry { row, source }));
        }
    }

    let file = File::create(output)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
    let mut emitted = 0usize;
    while let Some(Reverse(entry)) = heap.pop() {
        if emitted % CANCEL_CHECK_ROWS == 0 && cancel.load(AtomicOrdering::Relaxed) {
            return Ok(false);
        }
        emitted += 1;
        serde_json::to_writer(&mut encoder, &entry.row)?;
        encoder.write_all(b"\n")?;
        if let Some(row) = readers[entry.source].next_row()? {
            heap.push(Reverse(HeapEntry {
                row,
                source: entry.source,
            }));
        }
    }
    encoder.finish()?.flush()?;
    Ok(true)
}

///
/// Lazily read, fully sorted sequence of [`KeyedRow`]s
///
/// Owns the temporary segment directory; it is removed when the iterator is
/// exhausted or dropped.
///
#[derive(Debug)]
pub(crate) struct SortedRows {
    _temp_dir: Option<TempDir>,
    reader: Option<SegmentReader>,
    failed: bool,
}

impl SortedRows {
    fn open(temp_dir: TempDir, final_segment: Option<PathBuf>) -> Result<Self, SortError> {
        match final_segment {
            Some(path) => Ok(Self {
                reader: Some(SegmentReader::open(&path)?),
                _temp_dir: Some(temp_dir),
                failed: false,
            }),
            // No data rows: the TempDir is dropped (and removed) right away
            None => Ok(Self {
                reader: None,
                _temp_dir: None,
                failed: false,
            }),
        }
    }
}

impl Iterator for SortedRows {
    type Item = Result<KeyedRow, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let reader = self.reader.as_mut()?;
        match reader.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                // Exhausted: release the final segment eagerly
                self.reader = None;
                self._temp_dir = None;
                None
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
