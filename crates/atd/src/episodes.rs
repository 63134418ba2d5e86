//! Episode selection expressions such as `"2 5 3-7"`.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::DownloadError;

/// A set of 1-based episode ordinals. An empty selector selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeSelector {
    // Sorted, non-overlapping, non-adjacent.
    ranges: Vec<RangeInclusive<usize>>,
}

impl EpisodeSelector {
    /// Selector that matches every episode.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse whitespace-separated `N` and `A-B` tokens into their union.
    ///
    /// Any malformed token rejects the whole expression; nothing is
    /// partially interpreted.
    pub fn parse(expr: &str) -> Result<Self, DownloadError> {
        let mut ranges = expr
            .split_whitespace()
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()?;

        ranges.sort_by_key(|r| *r.start());
        let mut merged: Vec<RangeInclusive<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if *range.start() <= last.end().saturating_add(1) => {
                    let end = (*last.end()).max(*range.end());
                    *last = *last.start()..=end;
                }
                _ => merged.push(range),
            }
        }
        Ok(Self { ranges: merged })
    }

    pub fn is_all(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.is_all() || self.ranges.iter().any(|r| r.contains(&ordinal))
    }

    /// Highest selected ordinal, `None` when everything is selected.
    pub fn max_ordinal(&self) -> Option<usize> {
        self.ranges.last().map(|r| *r.end())
    }

    /// Expand into the explicit ordinal set. Empty for [`EpisodeSelector::all`].
    pub fn ordinals(&self) -> BTreeSet<usize> {
        self.ranges.iter().flat_map(|r| r.clone()).collect()
    }
}

fn parse_token(token: &str) -> Result<RangeInclusive<usize>, DownloadError> {
    match token.split_once('-') {
        None => {
            let n = parse_ordinal(token, token)?;
            Ok(n..=n)
        }
        Some((start, end)) => {
            let start = parse_ordinal(start, token)?;
            let end = parse_ordinal(end, token)?;
            if start > end {
                return Err(DownloadError::validation(format!(
                    "range `{token}` is reversed; write it as `{end}-{start}`"
                )));
            }
            Ok(start..=end)
        }
    }
}

fn parse_ordinal(part: &str, token: &str) -> Result<usize, DownloadError> {
    // `usize::from_str` accepts a leading `+`, which is not part of the syntax.
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DownloadError::validation(format!(
            "malformed token `{token}`: expected `N` or `A-B`"
        )));
    }
    let n: usize = part.parse().map_err(|_| {
        DownloadError::validation(format!("episode number `{part}` in `{token}` is too large"))
    })?;
    if n == 0 {
        return Err(DownloadError::validation(format!(
            "episode numbers start at 1 (got `{token}`)"
        )));
    }
    Ok(n)
}

impl FromStr for EpisodeSelector {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EpisodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if range.start() == range.end() {
                write!(f, "{}", range.start())?;
            } else {
                write!(f, "{}-{}", range.start(), range.end())?;
            }
        }
        Ok(())
    }
}
