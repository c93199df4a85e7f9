//! Run-length encoded sector sets.
//!
//! A [`SectorSet`] is stored the way Filecoin nodes exchange bitfields over JSON: a list of
//! alternating run lengths, starting with a run of unset bits (which may be empty), e.g. the set
//! `{3, 5}` is `[3, 1, 1, 1]`. Sets decoded from JSON are not validated up front, malformed runs
//! are reported when the set is iterated.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::sector::SectorNumber;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorSet {
    runs: Vec<u64>,
}

impl SectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps raw run lengths without validating them.
    pub fn from_runs(runs: Vec<u64>) -> Self {
        Self { runs }
    }

    pub fn runs(&self) -> &[u64] {
        &self.runs
    }

    /// The number of sector numbers in the set.
    pub fn len(&self) -> usize {
        self.runs
            .iter()
            .skip(1)
            .step_by(2)
            .fold(0usize, |acc, &run| acc.saturating_add(run as usize))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, sector_number: SectorNumber) -> bool {
        let mut pos = 0u64;
        for (i, &run) in self.runs.iter().enumerate() {
            let end = match pos.checked_add(run) {
                Some(end) => end,
                None => return false,
            };
            if sector_number < end {
                return i % 2 == 1;
            }
            pos = end;
        }
        false
    }

    /// Calls `f` for every sector number in ascending order.
    ///
    /// Stops at the first error returned by `f`. Fails with [`Error::InvalidBitField`] if the
    /// runs are malformed, in which case `f` may already have been called for the sector numbers
    /// preceding the bad run.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(SectorNumber) -> Result<()>,
    {
        let mut pos = 0u64;
        for (i, &run) in self.runs.iter().enumerate() {
            if run == 0 && i > 0 {
                bail!(Error::InvalidBitField(format!(
                    "zero length run at index {}",
                    i
                )));
            }
            let end = match pos.checked_add(run) {
                Some(end) => end,
                None => bail!(Error::InvalidBitField(format!(
                    "run at index {} overflows the sector number space",
                    i
                ))),
            };
            if i % 2 == 1 {
                for sector_number in pos..end {
                    f(sector_number)?;
                }
            }
            pos = end;
        }
        Ok(())
    }

    /// Collects the set into an ascending vector.
    pub fn to_vec(&self) -> Result<Vec<SectorNumber>> {
        let mut sector_numbers = Vec::with_capacity(self.len());
        self.for_each(|sector_number| {
            sector_numbers.push(sector_number);
            Ok(())
        })?;
        Ok(sector_numbers)
    }
}

impl FromIterator<SectorNumber> for SectorSet {
    fn from_iter<I: IntoIterator<Item = SectorNumber>>(iter: I) -> Self {
        let sorted: BTreeSet<SectorNumber> = iter.into_iter().collect();

        let mut runs: Vec<u64> = Vec::new();
        // One past the last sector number covered by `runs`.
        let mut end = 0u64;
        for sector_number in sorted {
            match runs.last_mut() {
                Some(last) if sector_number == end => *last += 1,
                _ => {
                    runs.push(sector_number - end);
                    runs.push(1);
                }
            }
            end = sector_number.saturating_add(1);
        }

        Self { runs }
    }
}
