use std::error::Error;

use peakmatch::{IndexHandle, PeakId, PeakmatchConfig, TrackId, build_from_extractor};
use tracing_subscriber::EnvFilter;

/// Synthetic catalog: tracks 0..4 share a common core of peaks with a
/// growing number of substitutions; track 5 has no decodable audio.
fn demo_peaks(track: TrackId) -> Result<Vec<PeakId>, String> {
    if track == 5 {
        return Err("unsupported container".to_string());
    }
    let core = 0..(60 - 10 * track as PeakId);
    let extra = (0..(10 * track as PeakId)).map(|p| 1_000 * (track as PeakId + 1) + p);
    Ok(core.chain(extra).collect())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PeakmatchConfig::from_file(path)?,
        None => PeakmatchConfig::default(),
    };
    let cfg = config.index_config();

    let report = build_from_extractor(&demo_peaks, 6, &cfg)?;
    for failure in &report.failures {
        println!("skipped track {}: {}", failure.track, failure.reason);
    }
    println!("index: {:?}", report.index.stats());

    let handle = IndexHandle::new(report.index);
    let query = demo_peaks(0)?;
    let opts = config.query_options();
    for hit in handle.query(&query, &opts)? {
        println!("track {:>3}  similarity {:.3}", hit.track, hit.similarity);
    }

    Ok(())
}
