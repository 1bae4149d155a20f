//! Snapshot text codec
//!
//! Wire format: `xmin:xmax:xip1,xip2,...`
//!
//! - `xmin` and `xmax` are required decimal ids with `xmin <= xmax`
//! - the third segment is optional; when present it is an unordered
//!   comma-separated list of ids in `[xmin, xmax)`
//! - an omitted or empty third segment means no in-progress ids
//!
//! Parsing sorts the in-progress list and rejects duplicates. The synthetic
//! snapshot builder relies on a sorted, duplicate-free list for the
//! binary-search visibility test.

use crate::error::{AsOfError, Result};
use crate::snapshot::VisibilitySnapshot;
use crate::types::TxnId;
use std::fmt;
use std::str::FromStr;

/// Default upper bound on the number of in-progress ids accepted.
pub const DEFAULT_MAX_IN_PROGRESS: usize = 65_536;

/// Parsed, validated snapshot bounds.
///
/// Invariants, established by parsing and never broken afterwards since no
/// field is mutable:
/// - `xmin <= xmax`
/// - every id in `xip` satisfies `xmin <= id < xmax`
/// - `xip` is strictly increasing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotDescriptor {
    xmin: TxnId,
    xmax: TxnId,
    xip: Vec<TxnId>,
}

impl SnapshotDescriptor {
    /// Parse snapshot text with the default in-progress limit.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_bounded(text, DEFAULT_MAX_IN_PROGRESS)
    }

    /// Parse snapshot text, rejecting more than `max_in_progress` ids.
    pub fn parse_bounded(text: &str, max_in_progress: usize) -> Result<Self> {
        if text.is_empty() {
            return Err(AsOfError::malformed("snapshot text is empty"));
        }

        let segments: Vec<&str> = text.split(':').collect();
        if segments.len() > 3 {
            return Err(AsOfError::malformed(format!(
                "expected at most 3 ':'-separated segments, found {}",
                segments.len()
            )));
        }

        let xmin = parse_id(segments[0], "xmin")?;
        let xmax = match segments.get(1) {
            Some(seg) => parse_id(seg, "xmax")?,
            None => return Err(AsOfError::malformed("missing xmax")),
        };
        if xmin > xmax {
            return Err(AsOfError::malformed(format!(
                "xmin {} is greater than xmax {}",
                xmin, xmax
            )));
        }

        let mut xip = Vec::new();
        if let Some(list) = segments.get(2).filter(|s| !s.is_empty()) {
            for token in list.split(',') {
                if xip.len() >= max_in_progress {
                    return Err(AsOfError::malformed(format!(
                        "more than {} in-progress ids",
                        max_in_progress
                    )));
                }
                let id = parse_id(token, "in-progress id")?;
                if id < xmin || id >= xmax {
                    return Err(AsOfError::malformed(format!(
                        "in-progress id {} is outside [{}, {})",
                        id, xmin, xmax
                    )));
                }
                xip.push(id);
            }
        }

        xip.sort_unstable();
        if let Some(pair) = xip.windows(2).find(|w| w[0] == w[1]) {
            return Err(AsOfError::malformed(format!(
                "duplicate in-progress id {}",
                pair[0]
            )));
        }

        Ok(SnapshotDescriptor { xmin, xmax, xip })
    }

    /// Describe a host snapshot, the way a snapshot is exported as text.
    ///
    /// Subtransaction ids are not part of the format and are dropped. Fails
    /// if the snapshot's in-progress ids fall outside its own bounds.
    pub fn from_snapshot(snapshot: &VisibilitySnapshot) -> Result<Self> {
        let candidate = SnapshotDescriptor {
            xmin: snapshot.xmin,
            xmax: snapshot.xmax,
            xip: snapshot.xip.clone(),
        };
        Self::parse_bounded(&candidate.to_string(), usize::MAX)
    }

    /// Lower visibility bound
    pub fn xmin(&self) -> TxnId {
        self.xmin
    }

    /// Upper visibility bound
    pub fn xmax(&self) -> TxnId {
        self.xmax
    }

    /// In-progress ids, strictly increasing
    pub fn xip(&self) -> &[TxnId] {
        &self.xip
    }
}

/// Parse one id token: non-empty ASCII digits that fit in 64 bits.
fn parse_id(token: &str, what: &str) -> Result<TxnId> {
    if token.is_empty() {
        return Err(AsOfError::malformed(format!("{} is empty", what)));
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AsOfError::malformed(format!(
            "{} '{}' is not an unsigned integer",
            what, token
        )));
    }
    token
        .parse::<u64>()
        .map(TxnId::new)
        .map_err(|_| AsOfError::malformed(format!("{} '{}' is out of range", what, token)))
}

impl FromStr for SnapshotDescriptor {
    type Err = AsOfError;

    fn from_str(s: &str) -> Result<Self> {
        SnapshotDescriptor::parse(s)
    }
}

impl fmt::Display for SnapshotDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.xmin, self.xmax)?;
        for (i, id) in self.xip.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}
