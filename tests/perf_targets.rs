use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use writeback::{
    DeferredWriter, Document, DocumentError, DocumentExt, DocumentStore, InMemoryDocumentStore,
    Palette16, Rgb, Serializable, WriterConfig,
};

fn p99(durations: &mut [Duration]) -> Duration {
    durations.sort_unstable();
    if durations.is_empty() {
        return Duration::from_nanos(0);
    }
    let idx = ((durations.len() as f64) * 0.99).ceil() as usize;
    let idx = idx.saturating_sub(1).min(durations.len() - 1);
    durations[idx]
}

fn ops_per_sec(ops: usize, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return f64::INFINITY;
    }
    (ops as f64) / elapsed.as_secs_f64()
}

struct Scene(Palette16);

impl Serializable for Scene {
    fn serialize(&self, doc: &mut Document) -> Result<(), DocumentError> {
        doc.put("palette", &self.0)
    }
}

/// Flag latency targets are only meaningful in release builds.
///
/// Run manually:
/// - `cargo test --release --test perf_targets -- --ignored --nocapture`
///
/// To enforce thresholds (may be machine-dependent):
/// - `WRITEBACK_ENFORCE_PERF=1 cargo test --release --test perf_targets -- --ignored --nocapture`
#[test]
#[ignore]
fn flag_perf_targets_report() {
    assert!(
        !cfg!(debug_assertions),
        "perf targets must be measured in --release"
    );

    let store = Arc::new(InMemoryDocumentStore::new());
    let saves = Arc::new(AtomicU64::new(0));
    let writer = DeferredWriter::new(WriterConfig::default()).unwrap();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let store = Arc::clone(&store);
            let saves = Arc::clone(&saves);
            let scene = Scene(Palette16::gradient(Rgb::BLACK, Rgb::new(i, i, i)));
            writer.register(move || {
                store.save(&format!("scene-{i}"), &scene)?;
                saves.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        })
        .collect();

    // -----------------
    // FLAG latency
    // -----------------
    for handle in &handles {
        writer.flag(*handle);
    }

    let iterations = 200_000usize;
    let mut latencies = Vec::with_capacity(iterations);
    let start_all = Instant::now();
    for i in 0..iterations {
        let t0 = Instant::now();
        writer.flag(handles[i % handles.len()]);
        latencies.push(t0.elapsed());
    }
    let total = start_all.elapsed();

    let p99_flag = p99(&mut latencies);
    let flag_rps = ops_per_sec(iterations, total);

    println!("perf_targets: flag p99={p99_flag:?} rps={flag_rps:.0}");

    // ---------------------
    // Coalescing under load
    // ---------------------
    drop(writer);
    let runs = saves.load(Ordering::Relaxed);
    let ratio = (iterations as f64) / (runs.max(1) as f64);
    println!("perf_targets: {iterations} flags -> {runs} saves (coalescing {ratio:.1}x)");

    // Optional enforcement (machine-dependent).
    if std::env::var("WRITEBACK_ENFORCE_PERF").ok().as_deref() == Some("1") {
        let max_p99 = Duration::from_micros(5);
        let min_flag_rps = 1_000_000.0;

        assert!(
            p99_flag <= max_p99,
            "perf fail: flag p99={p99_flag:?} > {max_p99:?}"
        );
        assert!(
            flag_rps >= min_flag_rps,
            "perf fail: flag rps={flag_rps:.0} < {min_flag_rps:.0}"
        );
    }
}
