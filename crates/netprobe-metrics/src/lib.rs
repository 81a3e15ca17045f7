//! Throughput calculation and classification over timing records.

use netprobe_types::{
    config::Thresholds,
    probe::NetworkType,
    timing::{SpeedInfo, TimingRecord},
};

/// Round half-up to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive throughput from one timing record.
///
/// Returns `None` when the record carries no usable signal: a non-positive
/// download window, or a zero transfer size (opaque cross-origin responses
/// report zero rather than the real size).
pub fn compute_speed(record: &TimingRecord) -> Option<SpeedInfo> {
    let download_time = record.download_time_ms();
    if download_time.is_nan() || download_time <= 0.0 || record.transfer_size == 0 {
        return None;
    }

    let bytes = record.transfer_size as f64;
    Some(SpeedInfo {
        name: record.name.clone(),
        speed_mbps: round2(bytes * 8.0 / download_time / 1000.0),
        speed_kbps: round2(bytes / download_time),
        download_time_ms: round2(download_time),
        transfer_size: record.transfer_size,
    })
}

/// Map a bitrate onto a coarse category.
pub fn classify(speed_mbps: f64, thresholds: &Thresholds) -> NetworkType {
    if speed_mbps >= thresholds.fast_mbps {
        NetworkType::Fast
    } else if speed_mbps >= thresholds.medium_mbps {
        NetworkType::Medium
    } else if speed_mbps > 0.0 {
        NetworkType::Slow
    } else {
        NetworkType::Unknown
    }
}

/// Speeds for every record that carries a usable signal, in input order.
pub fn usable_speeds<'a, I>(records: I) -> Vec<SpeedInfo>
where
    I: IntoIterator<Item = &'a TimingRecord>,
{
    records
        .into_iter()
        .filter(|record| record.transfer_size > 0)
        .filter_map(compute_speed)
        .collect()
}
