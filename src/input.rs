//! Turns CLI input into (URL, destination) jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use url::Url;

/// Jobs parsed from input, plus the lines that could not be used.
#[derive(Debug, Default)]
pub struct ParsedJobs {
    pub jobs: Vec<(String, PathBuf)>,
    pub skipped: Vec<String>,
}

/// Parses one job per line: `URL [DEST]`.
///
/// Blank lines and `#` comments are ignored. Lines with an unparsable URL or
/// more than two fields are reported in `skipped`. A missing DEST becomes
/// `output_dir/<last path segment>`, or `output_dir/download-<n>` when the URL
/// path has no usable segment. Derived names never repeat a destination
/// already used in the batch: `img.png`, then `img_1.png`, `img_2.png`, ...
pub fn parse_jobs(text: &str, output_dir: &Path) -> ParsedJobs {
    let mut parsed = ParsedJobs::default();
    let mut taken: HashSet<PathBuf> = HashSet::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(raw_url), dest, None) = (fields.next(), fields.next(), fields.next()) else {
            parsed.skipped.push(line.to_string());
            continue;
        };
        let Ok(url) = Url::parse(raw_url) else {
            parsed.skipped.push(line.to_string());
            continue;
        };

        let destination = match dest {
            Some(dest) => PathBuf::from(dest),
            None => unique_path(
                output_dir,
                &file_name_for(&url, parsed.jobs.len()),
                &taken,
            ),
        };
        taken.insert(destination.clone());
        parsed.jobs.push((raw_url.to_string(), destination));
    }

    parsed
}

fn file_name_for(url: &Url, index: usize) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map_or_else(|| format!("download-{index}"), ToString::to_string)
}

/// `dir/filename`, or the first `dir/<stem>_<n><ext>` not in `taken`.
fn unique_path(dir: &Path, filename: &str, taken: &HashSet<PathBuf>) -> PathBuf {
    let base = dir.join(filename);
    if !taken.contains(&base) {
        return base;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };
    (1..)
        .map(|i| dir.join(format!("{stem}_{i}{ext}")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}
