//! FFmpeg progress parsing.
//!
//! With `-progress pipe:2` FFmpeg writes blocks of `key=value` lines, each
//! terminated by `progress=continue` or `progress=end`.

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Output time in microseconds
    pub out_time_us: i64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of `total_secs` encoded so far, clamped to `[0, 1]`.
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_secs <= 0.0 || self.out_time_us <= 0 {
            return 0.0;
        }
        (self.out_time_us as f64 / 1_000_000.0 / total_secs).clamp(0.0, 1.0)
    }
}

/// Fold one line of `-progress` output into `current`.
///
/// Returns a snapshot at the end of each block.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    let value = value.trim();

    match key {
        // out_time_ms is also microseconds, despite its name
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                if us >= 0 {
                    current.out_time_us = us;
                }
            }
        }
        "out_time" => {
            if let Some(us) = parse_timestamp_us(value) {
                current.out_time_us = us;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line belongs to the `-progress` stream rather than diagnostics.
pub fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, value)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                && !value.contains(' ')
        }
        None => false,
    }
}

/// Parse `HH:MM:SS.ffffff` into microseconds.
fn parse_timestamp_us(value: &str) -> Option<i64> {
    let mut parts = value.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if hours < 0 || minutes < 0 || seconds < 0.0 {
        return None;
    }
    Some((hours * 3600 + minutes * 60) * 1_000_000 + (seconds * 1_000_000.0).round() as i64)
}
