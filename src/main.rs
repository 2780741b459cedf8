use strace_to_duckdb::{database::Database, engine};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "strace-to-duckdb")]
#[command(about = "Parse strace output files and load into DuckDB", long_about = None)]
struct Args {
    /// Output database path
    #[arg(short, long, default_value = "strace.db")]
    output: PathBuf,

    /// Worker threads (default: logical CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Input trace files
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    if args.files.is_empty() {
        eprintln!("Error: No input files specified");
        std::process::exit(1);
    }

    // A previous run's database would otherwise accumulate rows.
    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to delete existing database")?;
    }

    let db = Database::open(&args.output)
        .with_context(|| format!("Failed to open database at {}", args.output.display()))?;

    let workers = args
        .threads
        .unwrap_or_else(num_cpus::get)
        .clamp(1, args.files.len());

    println!(
        "Processing {} file(s) with {} worker(s)...",
        args.files.len(),
        workers
    );

    let start = std::time::Instant::now();
    let stats = engine::process_files_parallel(&db, &args.files, workers)
        .context("Processing failed")?;
    let elapsed = start.elapsed();

    println!("\n=== Summary ===");
    println!("Files:        {} processed, {} with errors", stats.files_processed, stats.files_with_errors);
    println!("Total lines:  {}", stats.total_lines);
    println!("Parsed:       {}", stats.parsed_lines);
    println!("Failed:       {}", stats.failed_lines);
    println!("Time:         {:.2}s", elapsed.as_secs_f64());
    println!(
        "Throughput:   {:.1}K lines/sec",
        stats.total_lines as f64 / elapsed.as_secs_f64() / 1000.0
    );

    let summary = db.summary().context("Failed to query summary statistics")?;
    println!("\n=== Database ===");
    println!("Path:             {}", args.output.display());
    println!("Rows:             {}", summary.total_rows);
    println!("Distinct syscalls: {}", summary.distinct_syscalls);
    println!("Distinct PIDs:    {}", summary.distinct_pids);
    println!("Failed syscalls:  {}", summary.failed_syscalls);

    Ok(())
}
