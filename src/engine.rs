use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use crate::database::Database;
use crate::error::IngestError;
use crate::processor;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Totals across every file in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub files_processed: u64,
    pub files_with_errors: u64,
    pub total_lines: u64,
    pub parsed_lines: u64,
    pub failed_lines: u64,
}

/// Written by workers with fetch-add, sampled by the coordinator. SeqCst
/// keeps every progress sample a clean snapshot.
#[derive(Default)]
struct Counters {
    files_complete: AtomicU64,
    files_with_errors: AtomicU64,
    total_lines: AtomicU64,
    parsed_lines: AtomicU64,
    failed_lines: AtomicU64,
    workers_done: AtomicUsize,
}

/// Ingest `paths` with a fixed pool of `worker_count` threads sharing the
/// coordinator's database instance.
///
/// Worker `w` statically owns files `w, w + n, w + 2n, ...` and amortises
/// one append session over all of them. File-level failures (missing file,
/// permission, oversized line) are counted into the stats and skipped;
/// anything else stored in a worker's error slot is critical and returned
/// after all workers have joined.
pub fn process_files_parallel(
    db: &Database,
    paths: &[PathBuf],
    worker_count: usize,
) -> Result<AggregateStats, IngestError> {
    if paths.is_empty() {
        return Ok(AggregateStats::default());
    }
    let workers = worker_count.clamp(1, paths.len());

    // Connections are opened up front so a connect failure surfaces as a
    // critical error before any thread starts.
    let mut connections = Vec::with_capacity(workers);
    for _ in 0..workers {
        connections.push(db.add_connection()?);
    }

    let counters = Counters::default();
    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) | {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    let start = Instant::now();

    let result = crossbeam::thread::scope(|scope| {
        let counters = &counters;
        let mut handles = Vec::with_capacity(workers);
        for (index, conn) in connections.into_iter().enumerate() {
            handles.push(scope.spawn(move |_| {
                let slot = run_worker(conn, paths, index, workers, counters);
                counters.workers_done.fetch_add(1, Ordering::SeqCst);
                slot
            }));
        }

        loop {
            thread::sleep(PROGRESS_INTERVAL);
            render(&progress, counters, start);
            let done = counters.files_complete.load(Ordering::SeqCst)
                + counters.files_with_errors.load(Ordering::SeqCst);
            // A worker that lost its append session exits without touching
            // the per-file counters, so also stop once every worker is out.
            if done >= paths.len() as u64
                || counters.workers_done.load(Ordering::SeqCst) >= workers
            {
                break;
            }
        }

        // Join everything before surfacing a critical error; one failing
        // worker does not pre-empt the others.
        let mut critical = None;
        for handle in handles {
            match handle.join() {
                Ok(Some(err)) if !err.is_file_level() && critical.is_none() => {
                    critical = Some(err);
                }
                Ok(_) => {}
                Err(_) => {
                    if critical.is_none() {
                        critical = Some(IngestError::WorkerPanicked);
                    }
                }
            }
        }

        render(&progress, counters, start);
        progress.finish_with_message("done");

        match critical {
            Some(err) => Err(err),
            None => Ok(AggregateStats {
                files_processed: counters.files_complete.load(Ordering::SeqCst),
                files_with_errors: counters.files_with_errors.load(Ordering::SeqCst),
                total_lines: counters.total_lines.load(Ordering::SeqCst),
                parsed_lines: counters.parsed_lines.load(Ordering::SeqCst),
                failed_lines: counters.failed_lines.load(Ordering::SeqCst),
            }),
        }
    });

    result.map_err(|_| IngestError::WorkerPanicked)?
}

/// Round-robin worker: processes its assigned files inside one append
/// session and returns the last error it observed (last-write-wins slot,
/// classified by the coordinator after the join).
fn run_worker(
    db: Database,
    paths: &[PathBuf],
    index: usize,
    stride: usize,
    counters: &Counters,
) -> Option<IngestError> {
    let mut session = match db.begin_append() {
        Ok(session) => session,
        Err(e) => return Some(e.into()),
    };
    let mut last_error = None;

    let mut i = index;
    while i < paths.len() {
        let path = &paths[i];
        match processor::process_file(&mut session, path) {
            Ok(stats) => {
                counters
                    .total_lines
                    .fetch_add(stats.total_lines, Ordering::SeqCst);
                counters
                    .parsed_lines
                    .fetch_add(stats.parsed_lines, Ordering::SeqCst);
                counters
                    .failed_lines
                    .fetch_add(stats.failed_lines, Ordering::SeqCst);
                counters.files_complete.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                counters.files_with_errors.fetch_add(1, Ordering::SeqCst);
                last_error = Some(e);
            }
        }
        i += stride;
    }

    if let Err(e) = session.finish() {
        return Some(e.into());
    }
    last_error
}

fn render(progress: &ProgressBar, counters: &Counters, start: Instant) {
    let complete = counters.files_complete.load(Ordering::SeqCst);
    let errors = counters.files_with_errors.load(Ordering::SeqCst);
    let total_lines = counters.total_lines.load(Ordering::SeqCst);
    let elapsed = start.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        total_lines as f64 / elapsed
    } else {
        0.0
    };
    progress.set_position(complete + errors);
    progress.set_message(format!(
        "{:.1}K lines/sec | {} errors",
        rate / 1000.0,
        errors
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;

    /// 20 valid lines with unique return values per file.
    fn write_trace_file(dir: &Path, name: &str, base: i64) -> PathBuf {
        let mut content = String::new();
        for i in 0..20 {
            writeln!(
                content,
                "22:21:{:02}.{:06} write(1, \"x\", 1) = {} <0.000004>",
                i % 60,
                i,
                base + i
            )
            .expect("format line");
        }
        let path = dir.join(name);
        fs::write(&path, content).expect("write trace");
        path
    }

    #[test]
    fn test_empty_input_returns_zero_stats() {
        let db = Database::open(":memory:").expect("open database");
        let stats = process_files_parallel(&db, &[], 4).expect("empty run");
        assert_eq!(stats, AggregateStats::default());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                write_trace_file(
                    dir.path(),
                    &format!("trace.{}", 101 + i),
                    (i as i64) * 1000,
                )
            })
            .collect();

        let sequential_db = Database::open(":memory:").expect("open database");
        let sequential = process_files_parallel(&sequential_db, &paths, 1).expect("sequential");

        let parallel_db = Database::open(":memory:").expect("open database");
        let parallel = process_files_parallel(&parallel_db, &paths, 2).expect("parallel");

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.files_processed, 5);
        assert_eq!(parallel.total_lines, 100);
        assert_eq!(parallel.parsed_lines, 100);

        let summary = parallel_db.summary().expect("summary");
        assert_eq!(summary, sequential_db.summary().expect("summary"));
        assert_eq!(summary.total_rows, 100);
        assert_eq!(summary.distinct_syscalls, 1);
        assert_eq!(summary.distinct_pids, 5);
    }

    #[test]
    fn test_missing_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = vec![
            write_trace_file(dir.path(), "trace.1", 0),
            dir.path().join("trace.does-not-exist"),
            write_trace_file(dir.path(), "trace.2", 1000),
        ];

        let db = Database::open(":memory:").expect("open database");
        let stats = process_files_parallel(&db, &paths, 2).expect("run survives missing file");

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_with_errors, 1);
        assert_eq!(stats.parsed_lines, 40);
        assert_eq!(db.summary().expect("summary").total_rows, 40);
    }

    #[test]
    fn test_more_workers_than_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = vec![
            write_trace_file(dir.path(), "trace.1", 0),
            write_trace_file(dir.path(), "trace.2", 1000),
        ];

        let db = Database::open(":memory:").expect("open database");
        let stats = process_files_parallel(&db, &paths, 16).expect("clamped pool");

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.total_lines, 40);
    }
}
