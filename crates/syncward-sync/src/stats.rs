//! Parsing of rsync `--stats` output
//!
//! Only two figures are extracted, for logging. With `--human-readable`
//! rsync prints thousands separators and unit suffixes (K, M, G, T in
//! powers of 1000), so both forms are accepted.

use serde::Serialize;

/// Transfer figures reported by `rsync --stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub files_transferred: Option<u64>,
    /// Total transferred file size as printed by rsync
    pub total_transferred: Option<String>,
    pub total_transferred_bytes: Option<u64>,
}

impl TransferStats {
    /// Parses `stdout`; missing or malformed figures are left as `None`
    pub fn parse(stdout: &str) -> Self {
        let mut stats = TransferStats::default();

        for line in stdout.lines() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let label = label.trim();
            let value = value.trim();

            // rsync >= 3.1 says "regular files", older versions just "files"
            if label == "Number of regular files transferred" || label == "Number of files transferred" {
                stats.files_transferred = parse_count(value);
            } else if label == "Total transferred file size" {
                let raw = value.strip_suffix("bytes").unwrap_or(value).trim();
                stats.total_transferred = Some(raw.to_string());
                stats.total_transferred_bytes = parse_size(raw);
            }
        }

        stats
    }
}

fn parse_count(value: &str) -> Option<u64> {
    value.replace(',', "").parse().ok()
}

fn parse_size(value: &str) -> Option<u64> {
    let value = value.replace(',', "");
    let (number, multiplier) = match value.chars().last()? {
        'K' => (&value[..value.len() - 1], 1e3),
        'M' => (&value[..value.len() - 1], 1e6),
        'G' => (&value[..value.len() - 1], 1e9),
        'T' => (&value[..value.len() - 1], 1e12),
        _ => (value.as_str(), 1.0),
    };
    let n: f64 = number.trim().parse().ok()?;
    if n < 0.0 {
        return None;
    }
    Some((n * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
sending incremental file list
a.txt
b.txt

Number of files: 5 (reg: 4, dir: 1)
Number of created files: 2 (reg: 2)
Number of deleted files: 0
Number of regular files transferred: 2
Total file size: 1.21M bytes
Total transferred file size: 12.34K bytes
Literal data: 12.34K bytes

sent 12.60K bytes  received 54 bytes  25.31K bytes/sec
total size is 1.21M  speedup is 95.72
";

    #[test]
    fn test_parse_human_readable_stats() {
        let stats = TransferStats::parse(OUTPUT);
        assert_eq!(stats.files_transferred, Some(2));
        assert_eq!(stats.total_transferred.as_deref(), Some("12.34K"));
        assert_eq!(stats.total_transferred_bytes, Some(12_340));
    }

    #[test]
    fn test_parse_plain_numbers_with_separators() {
        let stats = TransferStats::parse(
            "Number of files transferred: 1,024\nTotal transferred file size: 2,048 bytes\n",
        );
        assert_eq!(stats.files_transferred, Some(1024));
        assert_eq!(stats.total_transferred_bytes, Some(2048));
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert_eq!(TransferStats::parse("nothing to see"), TransferStats::default());
        let stats = TransferStats::parse("Number of regular files transferred: many");
        assert_eq!(stats.files_transferred, None);
    }
}
