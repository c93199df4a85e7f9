//! Turns a requested sector set into the positional proof inputs for Window PoSt.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};

use crate::bitfield::SectorSet;
use crate::error::Error;
use crate::sector::{SectorInfo, SectorNumber};

/// Resolves every sector number of `requested` against the miner's on-chain sectors.
///
/// The result has one entry per requested sector number, in ascending sector number order. A
/// requested number that is not part of `authoritative` is filled with a copy of
/// `authoritative[0]`, so the proof inputs stay aligned with the requested positions. The proof
/// for such a slot is only valid for the placeholder sector, which is fine for benchmarking but
/// would not pass verification for the requested one.
///
/// If `authoritative` is empty there is nothing to substitute with and an empty list is
/// returned. Should `authoritative` contain a sector number twice, the later entry wins.
pub fn resolve(authoritative: &[SectorInfo], requested: &SectorSet) -> Result<Vec<SectorInfo>> {
    let substitute = match authoritative.first() {
        Some(first) => first,
        None => return Ok(Vec::new()),
    };

    let sector_by_number: HashMap<SectorNumber, &SectorInfo> = authoritative
        .iter()
        .map(|info| (info.sector_number, info))
        .collect();

    let mut proof_sectors = Vec::with_capacity(requested.len());
    requested
        .for_each(|sector_number| {
            let info = sector_by_number
                .get(&sector_number)
                .copied()
                .unwrap_or(substitute);
            proof_sectors.push(info.clone());
            Ok(())
        })
        .context(Error::Iteration)?;

    Ok(proof_sectors)
}

/// Returns the requested sector numbers that [`resolve`] fills with the placeholder.
pub fn substituted(
    authoritative: &[SectorInfo],
    requested: &SectorSet,
) -> Result<Vec<SectorNumber>> {
    if authoritative.is_empty() {
        return Ok(Vec::new());
    }

    let known: HashSet<SectorNumber> = authoritative
        .iter()
        .map(|info| info.sector_number)
        .collect();
    let mut missing = Vec::new();
    requested
        .for_each(|sector_number| {
            if !known.contains(&sector_number) {
                missing.push(sector_number);
            }
            Ok(())
        })
        .context(Error::Iteration)?;

    Ok(missing)
}
