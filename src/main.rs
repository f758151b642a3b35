use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wiktionary_thesaurus::dump::{open_input, scan_pages};
use wiktionary_thesaurus::parallel::{
    process_batch_parallel, process_channel_pipeline, process_page_xml, write_page,
};
use wiktionary_thesaurus::{ConfigError, Mode, ParallelConfig, Stats, Vocabulary};

const OUTPUT_BUFFER: usize = 256 * 1024;

/// Processing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// One page at a time; the only strategy that honours --limit
    Sequential,
    /// Batch-parallel processing with thread pool
    BatchParallel,
    /// Channel-based pipeline processing
    ChannelPipeline,
}

#[derive(Parser)]
#[command(name = "wiktionary-thesaurus-rust")]
#[command(about = "Extract thesaurus relations from a Wiktionary XML dump - outputs one record per term")]
struct Args {
    /// Input XML file (.xml or .xml.bz2)
    input: PathBuf,

    /// Output JSONL file
    output: PathBuf,

    /// What to extract
    #[arg(short, long, value_enum, default_value_t = Mode::Thesaurus)]
    mode: Mode,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::ChannelPipeline)]
    strategy: Strategy,

    /// Number of threads (4 = default, 0 = auto-detect)
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Batch size for batch-parallel strategy
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Channel buffer size for channel-pipeline strategy
    #[arg(long, default_value_t = 10000)]
    channel_buffer: usize,

    /// Limit number of records to write (for testing)
    #[arg(long)]
    limit: Option<usize>,

    /// Limit number of pages to scan (for testing with raw dumps)
    #[arg(long)]
    page_limit: Option<usize>,

    /// Vocabulary YAML merged over the built-in tables (default: schema/thesaurus.yaml if present)
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn find_schema_file(filename: &str) -> Option<PathBuf> {
    [
        PathBuf::from("schema").join(filename),
        PathBuf::from("../../schema").join(filename),
    ]
    .into_iter()
    .find(|p| p.exists())
}

fn load_vocabulary(explicit: Option<&Path>) -> Result<Vocabulary, ConfigError> {
    match explicit.map(Path::to_path_buf).or_else(|| find_schema_file("thesaurus.yaml")) {
        Some(path) => {
            info!(path = %path.display(), "loading vocabulary");
            Vocabulary::load(&path)
        }
        None => Ok(Vocabulary::builtin().clone()),
    }
}

/// Run sequential processing
fn run_sequential(
    reader: impl BufRead,
    writer: &mut BufWriter<File>,
    mode: Mode,
    vocab: &Vocabulary,
    limit: Option<usize>,
    page_limit: Option<usize>,
    quiet: bool,
) -> std::io::Result<Stats> {
    let start_time = Instant::now();
    let mut stats = Stats::default();

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb
    };

    let mut seq = 0;
    let mut limit_reached = false;
    let mut write_error = None;

    scan_pages(reader, |page_xml| {
        let result = process_page_xml(&page_xml, seq, mode, vocab);
        seq += 1;

        match write_page(result, &mut stats, writer, limit) {
            Ok(true) => {
                limit_reached = true;
                return false;
            }
            Ok(false) => {}
            Err(err) => {
                write_error = Some(err);
                return false;
            }
        }

        if stats.pages_scanned % 1000 == 0 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = stats.pages_scanned as f64 / elapsed;
            pb.set_message(format!(
                "Pages: {} | Walked: {} | Records: {} | Rate: {:.0} pg/s",
                stats.pages_scanned, stats.pages_walked, stats.records_written, rate
            ));
        }

        !page_limit.is_some_and(|l| seq >= l)
    })?;
    if let Some(err) = write_error {
        return Err(err);
    }

    writer.flush()?;

    match limit {
        Some(l) if limit_reached => pb.finish_with_message(format!("Reached limit of {} records", l)),
        _ => pb.finish_and_clear(),
    }

    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

fn print_stats(stats: &Stats, strategy_name: &str) {
    println!();
    println!("============================================================");
    println!("Strategy: {}", strategy_name);
    println!("Pages scanned: {}", stats.pages_scanned);
    println!("Pages walked: {}", stats.pages_walked);
    println!("Records written: {}", stats.records_written);
    println!(
        "Avg records/page: {:.2}",
        stats.records_written as f64 / stats.pages_walked.max(1) as f64
    );
    println!("------------------------------------------------------------");
    println!("Rejected pages: {}", stats.rejected);
    println!("Redirects: {}", stats.redirects);
    println!("Other namespaces: {}", stats.other_namespace);
    println!("Unreadable pages: {}", stats.unreadable);
    println!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    println!(
        "Rate: {:.0} pages/sec",
        stats.pages_scanned as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let vocab = match load_vocabulary(args.vocab.as_deref()) {
        Ok(vocab) => Arc::new(vocab),
        Err(err) => {
            error!(%err, "could not load vocabulary");
            std::process::exit(1);
        }
    };

    // Validate: --limit requires sequential mode for efficient early termination
    if args.limit.is_some() && args.strategy != Strategy::Sequential {
        eprintln!(
            "Error: --limit requires --strategy sequential for efficient early termination.\n\
             Parallel strategies must process pages out of order and reorder results,\n\
             which means they cannot stop early when the limit is reached."
        );
        std::process::exit(1);
    }

    // Build parallel config
    let mut config = ParallelConfig::default();
    if args.threads > 0 {
        config.num_threads = args.threads;
        config.num_workers = args.threads.saturating_sub(1).max(1);
    }
    config.batch_size = args.batch_size.max(1);
    config.channel_buffer = args.channel_buffer;

    if !args.quiet {
        println!("Parsing: {}", args.input.display());
        println!("Output: {}", args.output.display());
        println!("Mode: {:?}", args.mode);
        println!("Strategy: {:?}", args.strategy);
        if args.strategy != Strategy::Sequential {
            println!("Threads: {}", config.num_threads);
        }
        if let Some(limit) = args.limit {
            println!("Limit: {} records", limit);
        }
        if let Some(limit) = args.page_limit {
            println!("Page limit: {}", limit);
        }
        println!();
    }
    info!(mode = ?args.mode, strategy = ?args.strategy, "starting scan");

    let reader = open_input(&args.input)?;
    let output = File::create(&args.output)?;

    let stats = match args.strategy {
        Strategy::Sequential => {
            let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER, output);
            run_sequential(
                reader,
                &mut writer,
                args.mode,
                &vocab,
                args.limit,
                args.page_limit,
                args.quiet,
            )?
        }
        Strategy::BatchParallel => {
            let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER, output);
            process_batch_parallel(reader, &mut writer, &config, args.mode, vocab, args.page_limit)?
        }
        Strategy::ChannelPipeline => {
            process_channel_pipeline(reader, output, &config, args.mode, vocab, args.page_limit)?
        }
    };

    info!(
        pages = stats.pages_scanned,
        records = stats.records_written,
        "scan finished"
    );
    if !args.quiet {
        print_stats(&stats, &format!("{:?}", args.strategy));
    }

    Ok(())
}
