use std::time::Instant;

use crate::services::planner::PlanTotals;

/// Overall progress for one install attempt. Weighted by bytes when every queued
/// size is known, otherwise each file counts as an equal step.
#[derive(Clone, Debug)]
pub struct ProgressModel {
    totals: PlanTotals,
    bytes_done: u64,
    files_completed: usize,
}

impl ProgressModel {
    pub fn new(totals: PlanTotals) -> Self {
        Self {
            totals,
            bytes_done: 0,
            files_completed: 0,
        }
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    pub fn files_completed(&self) -> usize {
        self.files_completed
    }

    pub fn fraction(&self, file_size: u64, file_bytes: u64) -> f32 {
        let value = if self.totals.sizes_known_for_all && self.totals.bytes > 0 && file_size > 0 {
            (self.bytes_done.saturating_add(file_bytes)) as f64 / self.totals.bytes as f64
        } else {
            let per_file = 1.0 / self.totals.files.max(1) as f64;
            let current = if file_size > 0 {
                (file_bytes as f64 / file_size as f64).clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.files_completed as f64 * per_file + per_file * current
        };
        value.clamp(0.0, 1.0) as f32
    }

    pub fn complete_file(&mut self, file_size: u64) {
        self.files_completed += 1;
        if file_size > 0 {
            self.bytes_done = self.bytes_done.saturating_add(file_size);
        }
    }
}

/// Per-file counters for the "downloading" status line.
#[derive(Clone, Debug)]
pub struct FileProgress {
    pub name: String,
    pub size: u64,
    pub downloaded: u64,
    started: Instant,
}

impl FileProgress {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            downloaded: 0,
            started: Instant::now(),
        }
    }

    pub fn speed_bps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.1 {
            self.downloaded as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn detail(&self) -> String {
        describe_transfer(self.downloaded, self.size, self.speed_bps())
    }
}

pub fn describe_transfer(downloaded: u64, size: u64, speed_bps: f64) -> String {
    if size == 0 {
        return format!("{} downloaded", format_bytes(downloaded));
    }
    let percent = downloaded as f64 / size as f64 * 100.0;
    format!(
        "{} / {} ({:.1}%) - {}",
        format_bytes(downloaded),
        format_bytes(size),
        percent,
        format_rate(speed_bps)
    )
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let value = bytes as f64;
    if value >= TB {
        format!("{:.2} TB", value / TB)
    } else if value >= GB {
        format!("{:.2} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_rate(bytes_per_second: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
    let mut speed = bytes_per_second.max(0.0);
    let mut unit = 0;
    while speed >= 1024.0 && unit < UNITS.len() - 1 {
        speed /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", speed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(files: usize, bytes: u64, known: bool) -> PlanTotals {
        PlanTotals {
            files,
            bytes,
            sizes_known_for_all: known,
        }
    }

    #[test]
    fn byte_weighted_when_all_sizes_known() {
        let mut model = ProgressModel::new(totals(2, 1_000, true));
        assert!((model.fraction(250, 125) - 0.125).abs() < 1e-6);
        model.complete_file(250);
        assert!((model.fraction(750, 375) - 0.625).abs() < 1e-6);
        assert!((model.fraction(750, 750) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn per_file_steps_when_a_size_is_unknown() {
        let mut model = ProgressModel::new(totals(4, 300, false));
        assert!((model.fraction(100, 50) - 0.125).abs() < 1e-6);
        model.complete_file(100);
        assert!((model.fraction(0, 9_999) - 0.25).abs() < 1e-6);
        model.complete_file(0);
        assert_eq!(model.files_completed(), 2);
        assert_eq!(model.bytes_done(), 100);
        assert!((model.fraction(0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fraction_never_exceeds_one() {
        let model = ProgressModel::new(totals(1, 10, true));
        assert_eq!(model.fraction(10, 50), 1.0);
    }

    #[test]
    fn formats_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn formats_rates() {
        assert_eq!(format_rate(0.0), "0.0 B/s");
        assert_eq!(format_rate(2048.0), "2.0 KB/s");
        assert_eq!(format_rate(1.5 * 1024.0 * 1024.0), "1.5 MB/s");
    }

    #[test]
    fn describes_known_and_unknown_sizes() {
        assert_eq!(describe_transfer(1024, 0, 0.0), "1.0 KB downloaded");
        assert_eq!(
            describe_transfer(512, 1024, 256.0),
            "512 B / 1.0 KB (50.0%) - 256.0 B/s"
        );
    }
}
