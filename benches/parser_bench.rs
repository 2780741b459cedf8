use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strace_to_duckdb::parser::parse_line;

fn benchmark_complete_lines(c: &mut Criterion) {
    let samples = vec![
        (
            "simple",
            "22:21:11.524449 brk(NULL) = 0x55edad95f000 <0.000004>",
        ),
        (
            "with_error",
            "22:21:11.524519 access(\"/etc/ld-nix.so.preload\", R_OK) = -1 ENOENT (No such file or directory) <0.000030>",
        ),
        (
            "nested_args",
            "10:23:45.123456 fstat(3, {st_mode=S_IFCHR|0600, st_rdev=makedev(0x88, 0), ...}) = 0 <0.000015>",
        ),
        (
            "execve",
            "22:21:11.524157 execve(\"/etc/profiles/per-user/omegaice/bin/zoom\", [\"zoom\"], 0x7ffeec7c3190 /* 166 vars */) = 0 <0.000200>",
        ),
        (
            "annotated",
            "10:23:45.123456 poll([{fd=3, events=POLLIN}], 1, -1) = 1 ([{fd=3, revents=POLLIN}]) <0.000100>",
        ),
    ];

    let mut group = c.benchmark_group("parse_complete");
    for (name, sample) in samples.iter() {
        group.throughput(Throughput::Bytes(sample.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), sample, |b, s| {
            b.iter(|| {
                black_box(parse_line(s));
            });
        });
    }
    group.finish();
}

fn benchmark_suspended_lines(c: &mut Criterion) {
    let samples = vec![
        (
            "unfinished_poll",
            "22:21:24.927885 poll([{fd=8, events=POLLIN}, {fd=7, events=POLLIN}], 2, -1 <unfinished ...>) = ?",
        ),
        (
            "unfinished_wait4",
            "22:21:24.927885 wait4(1387721 <unfinished ...>) = ?",
        ),
        (
            "resumed_read",
            "10:23:45.123458 <... read resumed>\"data\", 100) = 4 <0.000042>",
        ),
    ];

    let mut group = c.benchmark_group("parse_suspended");
    for (name, sample) in samples.iter() {
        group.throughput(Throughput::Bytes(sample.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), sample, |b, s| {
            b.iter(|| {
                black_box(parse_line(s));
            });
        });
    }
    group.finish();
}

fn benchmark_batch_parsing(c: &mut Criterion) {
    // A realistic mix of line shapes.
    let lines = vec![
        "22:21:11.524449 brk(NULL) = 0x55edad95f000 <0.000004>",
        "22:21:11.524519 access(\"/etc/ld-nix.so.preload\", R_OK) = -1 ENOENT (No such file or directory) <0.000030>",
        "22:21:11.524791 newfstatat(AT_FDCWD, \"/nix/store/path\", {st_mode=S_IFDIR|0555}, 0) = 0 <0.000006>",
        "22:21:24.927885 poll([{fd=8, events=POLLIN}], 2, -1 <unfinished ...>) = ?",
        "10:23:45.123458 <... poll resumed>) = 1 ([{fd=8, revents=POLLIN}]) <0.000042>",
        "22:21:11.524157 execve(\"/bin/zoom\", [\"zoom\"], 0x7ffeec7c3190 /* 166 vars */) = 0 <0.000200>",
    ];

    let total_bytes: usize = lines.iter().map(|s| s.len()).sum();

    let mut group = c.benchmark_group("batch_parsing");
    group.throughput(Throughput::Bytes((total_bytes * 20) as u64));

    group.bench_function("batch_120_lines", |b| {
        b.iter(|| {
            for _ in 0..20 {
                for line in &lines {
                    black_box(parse_line(line));
                }
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_complete_lines,
    benchmark_suspended_lines,
    benchmark_batch_parsing
);
criterion_main!(benches);
