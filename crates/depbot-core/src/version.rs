//! Version normalization and upgrade classification.
//!
//! Versions are reduced to a `(major, minor, patch)` triple: leading range
//! operators and a `v`/`@` prefix are stripped, pre-release/build suffixes are
//! dropped, and missing components are padded with zero (`"4"` → `4.0.0`).
//!
//! The two public predicates fail in different directions on unparsable
//! input: [`classify`] falls back to [`UpdateType::Patch`], while
//! [`is_upgrade`] falls back to `false`. An unparsable pair is never treated
//! as an upgrade, so a downgrade cannot slip through on a parse error.

use std::cmp::Ordering;
use std::fmt;

use crate::domain::{ClassificationError, UpdateType};

/// Version markers that float instead of pinning a release.
pub const DYNAMIC_MARKERS: [&str; 6] = ["latest", "*", "main", "master", "develop", "dev"];

const RANGE_OPERATORS: [&str; 7] = [">=", "<=", "^", "~", "<", ">", "="];

/// A normalized three-component version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Strip range operators and a literal `@`/`v` prefix, keeping the rest intact.
pub fn strip_prefix(raw: &str) -> &str {
    let mut s = raw.trim();
    loop {
        let before = s.len();
        for op in RANGE_OPERATORS {
            if let Some(rest) = s.strip_prefix(op) {
                s = rest.trim_start();
            }
        }
        if s.len() == before {
            break;
        }
    }
    let s = s.strip_prefix('@').unwrap_or(s);
    s.strip_prefix(['v', 'V']).unwrap_or(s)
}

/// Parse a version string into a padded triple.
pub fn parse(raw: &str) -> Result<Version, ClassificationError> {
    let stripped = strip_prefix(raw);
    let core = stripped
        .split(['-', '+'])
        .next()
        .unwrap_or_default()
        .trim();
    if core.is_empty() {
        return Err(ClassificationError::Empty);
    }

    let mut parts = [0u64; 3];
    for (idx, component) in core.split('.').take(3).enumerate() {
        if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClassificationError::InvalidComponent {
                version: raw.to_string(),
                component: component.to_string(),
            });
        }
        parts[idx] = component
            .parse()
            .map_err(|_| ClassificationError::InvalidComponent {
                version: raw.to_string(),
                component: component.to_string(),
            })?;
    }

    Ok(Version::new(parts[0], parts[1], parts[2]))
}

/// Compare two version strings. `None` when either side is unparsable.
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    let a = parse(a).ok()?;
    let b = parse(b).ok()?;
    Some(a.cmp(&b))
}

/// Classify the move from `current` to `latest`.
///
/// Anything that is not strictly newer (including unparsable input) is
/// reported as a patch so it is never promoted to a more severe group.
pub fn classify(current: &str, latest: &str) -> UpdateType {
    let (Ok(cur), Ok(new)) = (parse(current), parse(latest)) else {
        return UpdateType::Patch;
    };
    if new <= cur {
        return UpdateType::Patch;
    }
    if new.major != cur.major {
        UpdateType::Major
    } else if new.minor != cur.minor {
        UpdateType::Minor
    } else {
        UpdateType::Patch
    }
}

/// True only when `latest` is strictly newer than `current` and both parse.
pub fn is_upgrade(current: &str, latest: &str) -> bool {
    matches!(compare(current, latest), Some(Ordering::Less))
}

/// Whether a version string is a floating marker such as `latest` or `*`.
pub fn is_dynamic(raw: &str) -> bool {
    let trimmed = raw.trim();
    DYNAMIC_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}
