use std::cmp::Ordering;

/// Only tags starting with this character are release candidates.
pub const VERSION_TAG_PREFIX: char = 'v';

/// Parse a tag as a semantic version, accepting loosely formatted input.
///
/// Surrounding whitespace and a single leading `v` are dropped, leading zeros
/// are stripped from each numeric component, and a missing minor or patch
/// component defaults to `0` (`v1` -> `1.0.0`, `v1.2` -> `1.2.0`).
/// A shortened version cannot carry pre-release or build metadata.
///
/// # Example
/// ```ignore
/// assert_eq!(parse_tolerant("v1.2").unwrap(), semver::Version::new(1, 2, 0));
/// assert_eq!(parse_tolerant(" v01.002.3 ").unwrap(), semver::Version::new(1, 2, 3));
/// assert!(parse_tolerant("v1.2-rc.1").is_err());
/// ```
pub fn parse_tolerant(tag: &str) -> Result<semver::Version, semver::Error> {
    let trimmed = tag.trim();
    let trimmed = trimmed.strip_prefix(VERSION_TAG_PREFIX).unwrap_or(trimmed);

    // The third part keeps the patch together with any pre-release/build suffix.
    let mut parts: Vec<String> = trimmed.splitn(3, '.').map(strip_leading_zeros).collect();

    if parts.len() < 3 {
        let last = parts.last().map(String::as_str).unwrap_or_default();
        if last.contains(['+', '-']) {
            // Let the strict parser produce the error for the unpadded text.
            return semver::Version::parse(trimmed);
        }
        parts.resize(3, "0".to_string());
    }

    semver::Version::parse(&parts.join("."))
}

fn strip_leading_zeros(part: &str) -> String {
    if part.len() <= 1 {
        return part.to_string();
    }
    let stripped = part.trim_start_matches('0');
    match stripped.chars().next() {
        Some(c) if c.is_ascii_digit() => stripped.to_string(),
        _ => format!("0{}", stripped),
    }
}

/// Order two tags by semantic version precedence.
///
/// When either side fails [`parse_tolerant`], that single comparison falls back
/// to plain string ordering. Mixing parseable and unparseable tags therefore
/// yields an ordering that is not guaranteed to be total; the winner of
/// [`select_latest`] can then depend on input order.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    match (parse_tolerant(a), parse_tolerant(b)) {
        (Ok(va), Ok(vb)) => va.cmp_precedence(&vb),
        _ => a.cmp(b),
    }
}

/// Pick the highest version tag out of an unordered tag listing.
///
/// Tags not starting with `v` are ignored. Returns `None` when nothing is
/// left to compare, which callers treat as "no update" rather than an error.
///
/// The maximum is found with a single pass over the candidates using
/// [`compare_tags`], so an inconsistent comparison can never abort the
/// selection. Among tags of equal precedence the last one listed wins, as it
/// would after a stable ascending sort.
///
/// # Example
/// ```ignore
/// let tags = vec!["v1.2.0".to_string(), "v1.10.0".to_string(), "latest".to_string()];
/// assert_eq!(select_latest(&tags).as_deref(), Some("v1.10.0"));
/// ```
pub fn select_latest<S: AsRef<str>>(tags: &[S]) -> Option<String> {
    tags.iter()
        .map(AsRef::as_ref)
        .filter(|tag| tag.starts_with(VERSION_TAG_PREFIX))
        .fold(None, |best: Option<&str>, candidate| match best {
            Some(current) if compare_tags(current, candidate) == Ordering::Greater => Some(current),
            _ => Some(candidate),
        })
        .map(str::to_string)
}
