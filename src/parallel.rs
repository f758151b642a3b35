//! Page processing and the parallel strategies for running it over a dump.
//!
//! Strategies use only std threads and channels:
//! - Batch-parallel (std::thread on batches of pages)
//! - Channel-pipeline (producer-consumer with mpsc channels)
//!
//! Both write pages in dump order, so their output is identical to a
//! sequential run.

use crate::dump::{parse_page_xml, scan_pages, RawPage};
use crate::entries::extract_entries;
use crate::thesaurus::extract_thesaurus_page;
use crate::vocab::Vocabulary;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufWriter, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which pages are read and what is extracted from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Relation records from thesaurus-namespace pages
    Thesaurus,
    /// Word entries (senses, linkages, translations, pronunciations) from main-namespace pages
    Entries,
}

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use
    pub num_threads: usize,
    /// Batch size for batch-parallel processing
    pub batch_size: usize,
    /// Channel buffer size for pipeline processing
    pub channel_buffer: usize,
    /// Number of worker threads for pipeline
    pub num_workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cpus = thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self {
            num_threads: cpus,
            batch_size: 1000,
            channel_buffer: 10000,
            num_workers: cpus.saturating_sub(1).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Walked; may still have produced no output
    Walked,
    /// Title or body rejected by the extractor
    Rejected,
    Redirect,
    OtherNamespace,
    /// `<page>` element without a title
    Unreadable,
}

/// Result of page processing: JSON lines ready to be written.
#[derive(Debug)]
pub struct ProcessedPage {
    pub seq: usize,
    pub outcome: PageOutcome,
    pub lines: Vec<String>,
}

impl ProcessedPage {
    fn empty(seq: usize, outcome: PageOutcome) -> Self {
        ProcessedPage {
            seq,
            outcome,
            lines: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub pages_scanned: usize,
    pub pages_walked: usize,
    pub rejected: usize,
    pub redirects: usize,
    pub other_namespace: usize,
    pub unreadable: usize,
    pub records_written: usize,
    pub elapsed: Duration,
}

impl Stats {
    pub fn count_page(&mut self, outcome: PageOutcome) {
        self.pages_scanned += 1;
        match outcome {
            PageOutcome::Walked => self.pages_walked += 1,
            PageOutcome::Rejected => self.rejected += 1,
            PageOutcome::Redirect => self.redirects += 1,
            PageOutcome::OtherNamespace => self.other_namespace += 1,
            PageOutcome::Unreadable => self.unreadable += 1,
        }
    }
}

impl Mode {
    fn wants(self, raw: &RawPage, vocab: &Vocabulary) -> bool {
        match self {
            Mode::Thesaurus => match raw.namespace {
                Some(ns) => i64::from(ns) == i64::from(vocab.thesaurus_namespace_id()),
                None => vocab
                    .thesaurus_prefixes()
                    .iter()
                    .any(|prefix| raw.title.starts_with(prefix.as_str())),
            },
            Mode::Entries => raw.namespace.unwrap_or(0) == 0,
        }
    }
}

/// Process one page: namespace and redirect filtering, then extraction.
pub fn process_raw_page(raw: RawPage, mode: Mode, vocab: &Vocabulary) -> ProcessedPage {
    if raw.redirect {
        return ProcessedPage::empty(raw.seq, PageOutcome::Redirect);
    }
    if !mode.wants(&raw, vocab) {
        return ProcessedPage::empty(raw.seq, PageOutcome::OtherNamespace);
    }
    let Some(text) = raw.text.as_deref() else {
        debug!(title = %raw.title, "page has no text");
        return ProcessedPage::empty(raw.seq, PageOutcome::Rejected);
    };

    let lines = match mode {
        Mode::Thesaurus => extract_thesaurus_page(&raw.title, text, vocab).map(|r| to_json_lines(&r)),
        Mode::Entries => extract_entries(&raw.title, text, vocab).map(|e| to_json_lines(&e)),
    };
    match lines {
        Some(lines) => ProcessedPage {
            seq: raw.seq,
            outcome: PageOutcome::Walked,
            lines,
        },
        None => ProcessedPage::empty(raw.seq, PageOutcome::Rejected),
    }
}

/// Parse and process the XML of one `<page>` element.
pub fn process_page_xml(xml: &str, seq: usize, mode: Mode, vocab: &Vocabulary) -> ProcessedPage {
    match parse_page_xml(xml, seq) {
        Some(raw) => process_raw_page(raw, mode, vocab),
        None => ProcessedPage::empty(seq, PageOutcome::Unreadable),
    }
}

fn to_json_lines<T: Serialize>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match serde_json::to_string(item) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(%err, "failed to serialize record");
                None
            }
        })
        .collect()
}

/// Write a processed page and count it. Returns true once `limit` records
/// have been written.
pub fn write_page<W: Write>(
    page: ProcessedPage,
    stats: &mut Stats,
    writer: &mut W,
    limit: Option<usize>,
) -> std::io::Result<bool> {
    stats.count_page(page.outcome);
    for line in page.lines {
        writeln!(writer, "{}", line)?;
        stats.records_written += 1;
        if limit.is_some_and(|l| stats.records_written >= l) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Strategy 1: Batch-Parallel Processing using std::thread
/// Collects pages into batches, then processes each batch using a thread pool
pub fn process_batch_parallel<W: Write>(
    reader: impl BufRead,
    writer: &mut BufWriter<W>,
    config: &ParallelConfig,
    mode: Mode,
    vocab: Arc<Vocabulary>,
    page_limit: Option<usize>,
) -> std::io::Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();
    let mut batch: Vec<String> = Vec::with_capacity(config.batch_size);
    let mut next_seq: usize = 0;
    let mut write_error = None;

    let mut flush_batch =
        |batch: Vec<String>, base_seq: usize, stats: &mut Stats| -> std::io::Result<()> {
            let results = process_batch_threaded(batch, base_seq, config.num_threads, mode, &vocab);
            for result in results {
                write_page(result, stats, writer, None)?;
            }
            Ok(())
        };

    scan_pages(reader, |page_xml| {
        batch.push(page_xml);
        next_seq += 1;
        let at_limit = page_limit.is_some_and(|l| next_seq >= l);

        if batch.len() >= config.batch_size || at_limit {
            let base_seq = next_seq - batch.len();
            let full = std::mem::replace(&mut batch, Vec::with_capacity(config.batch_size));
            if let Err(err) = flush_batch(full, base_seq, &mut stats) {
                write_error = Some(err);
                return false;
            }
        }
        !at_limit
    })?;
    if let Some(err) = write_error {
        return Err(err);
    }

    // Process remaining batch
    if !batch.is_empty() {
        let base_seq = next_seq - batch.len();
        flush_batch(batch, base_seq, &mut stats)?;
    }

    writer.flush()?;
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

/// Process a batch of pages using multiple threads
fn process_batch_threaded(
    batch: Vec<String>,
    base_seq: usize,
    num_threads: usize,
    mode: Mode,
    vocab: &Arc<Vocabulary>,
) -> Vec<ProcessedPage> {
    if batch.is_empty() {
        return vec![];
    }

    let num_threads = num_threads.min(batch.len()).max(1);
    let chunk_size = batch.len().div_ceil(num_threads);

    // Split batch into chunks for each thread
    let mut chunks: Vec<Vec<(usize, String)>> = Vec::with_capacity(num_threads);
    for (i, xml) in batch.into_iter().enumerate() {
        if i % chunk_size == 0 {
            chunks.push(Vec::with_capacity(chunk_size));
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.push((base_seq + i, xml));
        }
    }

    // Process chunks in parallel
    let handles: Vec<JoinHandle<Vec<ProcessedPage>>> = chunks
        .into_iter()
        .map(|chunk| {
            let vocab = Arc::clone(vocab);
            thread::spawn(move || {
                chunk
                    .into_iter()
                    .map(|(seq, xml)| process_page_xml(&xml, seq, mode, &vocab))
                    .collect()
            })
        })
        .collect();

    // Collect results; chunks are joined in order so pages stay in dump order
    let mut results = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(chunk_results) => results.extend(chunk_results),
            Err(_) => warn!(base_seq, "worker thread panicked; its pages are lost"),
        }
    }

    results
}

/// Strategy 2: Channel-Pipeline Processing using std::sync::mpsc
/// Producer thread reads XML, worker threads process pages, writer collects results
/// Results are buffered and sorted by sequence number to ensure deterministic output order
pub fn process_channel_pipeline<W: Write>(
    reader: impl BufRead + Send + 'static,
    writer: W,
    config: &ParallelConfig,
    mode: Mode,
    vocab: Arc<Vocabulary>,
    page_limit: Option<usize>,
) -> std::io::Result<Stats> {
    let (page_tx, page_rx): (SyncSender<(usize, String)>, Receiver<(usize, String)>) =
        sync_channel(config.channel_buffer);
    let (result_tx, result_rx): (SyncSender<ProcessedPage>, Receiver<ProcessedPage>) =
        sync_channel(config.channel_buffer);

    let start_time = Instant::now();

    let reader_handle = thread::spawn(move || read_pages_to_channel(reader, page_tx, page_limit));

    let page_rx = Arc::new(Mutex::new(page_rx));
    let worker_handles: Vec<JoinHandle<()>> = (0..config.num_workers.max(1))
        .map(|_| {
            let rx = Arc::clone(&page_rx);
            let tx = result_tx.clone();
            let vocab = Arc::clone(&vocab);
            thread::spawn(move || process_pages_worker(rx, tx, mode, &vocab))
        })
        .collect();

    // Drop extra sender so channel closes when workers finish
    drop(result_tx);

    let written = write_results_sorted(result_rx, writer);

    for handle in worker_handles {
        if handle.join().is_err() {
            warn!("pipeline worker panicked");
        }
    }
    let read = reader_handle
        .join()
        .map_err(|_| std::io::Error::other("dump reader thread panicked"))?;

    let mut stats = written?;
    let pages_read = read?;
    if pages_read != stats.pages_scanned {
        warn!(pages_read, pages_written = stats.pages_scanned, "not every page reached the writer");
    }
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn read_pages_to_channel(
    reader: impl BufRead,
    tx: SyncSender<(usize, String)>,
    page_limit: Option<usize>,
) -> std::io::Result<usize> {
    let mut seq: usize = 0;
    scan_pages(reader, |page_xml| {
        if tx.send((seq, page_xml)).is_err() {
            return false;
        }
        seq += 1;
        !page_limit.is_some_and(|l| seq >= l)
    })?;
    Ok(seq)
}

fn process_pages_worker(
    rx: Arc<Mutex<Receiver<(usize, String)>>>,
    tx: SyncSender<ProcessedPage>,
    mode: Mode,
    vocab: &Vocabulary,
) {
    loop {
        // Try to get next page from shared receiver
        let item = {
            let lock = rx.lock().ok();
            lock.and_then(|guard| guard.recv().ok())
        };

        match item {
            Some((seq, xml)) => {
                let result = process_page_xml(&xml, seq, mode, vocab);
                if tx.send(result).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
}

/// Write results in deterministic order using a streaming reorder buffer.
///
/// Every page sends exactly one result, so a page is written as soon as all
/// its predecessors have been; only results that overtake an earlier page are
/// held in the buffer.
fn write_results_sorted<W: Write>(rx: Receiver<ProcessedPage>, writer: W) -> std::io::Result<Stats> {
    let mut writer = BufWriter::with_capacity(256 * 1024, writer);
    let mut stats = Stats::default();

    let mut pending: BTreeMap<usize, ProcessedPage> = BTreeMap::new();
    let mut next_expected: usize = 0;
    let mut max_pending: usize = 0;

    for result in rx {
        if result.seq != next_expected {
            pending.insert(result.seq, result);
            max_pending = max_pending.max(pending.len());
            continue;
        }

        write_page(result, &mut stats, &mut writer, None)?;
        next_expected += 1;
        while let Some(buffered) = pending.remove(&next_expected) {
            write_page(buffered, &mut stats, &mut writer, None)?;
            next_expected += 1;
        }
    }

    // Only non-empty if a worker died mid-page
    if !pending.is_empty() {
        warn!(missing = next_expected, buffered = pending.len(), "gap in page sequence");
    }
    for (_, result) in std::mem::take(&mut pending) {
        write_page(result, &mut stats, &mut writer, None)?;
    }

    debug!(max_pending, "reorder buffer high-water mark");
    writer.flush()?;
    Ok(stats)
}
