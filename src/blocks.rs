//! Splitting `bhosts -l` output into one block of lines per host.

use once_cell::sync::Lazy;
use regex::Regex;

/// The standalone word `HOST` and the whitespace after it open every host section.
static HOST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)HOST\s+").expect("host marker pattern is valid"));

/// Splits raw scheduler stdout into per-host blocks.
///
/// Text before the first marker is discarded, so output without any marker
/// yields no blocks. Whitespace-only blocks are dropped. Each remaining block
/// is trimmed and split into its non-empty lines.
pub fn split_host_blocks(stdout: &str) -> Vec<Vec<&str>> {
    HOST_MARKER
        .split(stdout)
        .skip(1)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| block.split('\n').filter(|line| !line.is_empty()).collect())
        .collect()
}
