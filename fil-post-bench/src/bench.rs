//! The benchmark pipeline: sector numbers in, one Window PoSt out.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use cpu_time::ProcessTime;
use log::{info, warn};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::api::{ChainApi, FullNodeClient, MinerApi, MinerClient, TipSetKey};
use crate::bitfield::SectorSet;
use crate::error::Error;
use crate::prover::{FileProver, WindowPoStProver};
use crate::resolve::{resolve, substituted};
use crate::sector::{ActorId, SectorInfo, SectorNumber, MAX_SECTOR_NUMBER};
use crate::settings::{QueryFilter, Settings};
use crate::store::SectorStore;

/// Reads one sector number per line. Blank lines are skipped.
pub fn read_sector_numbers<P: AsRef<Path>>(path: P) -> Result<Vec<SectorNumber>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| Error::Io(path.to_path_buf()))?;

    let mut reader = BufReader::new(file);
    let mut sector_numbers = Vec::new();
    let mut buf = Vec::new();
    for index in 0.. {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| Error::Io(path.to_path_buf()))?;
        if read == 0 {
            break;
        }

        let parse_error = |content: &str, reason: String| Error::Parse {
            line: index + 1,
            content: content.to_string(),
            reason,
        };
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(err) => {
                let lossy = String::from_utf8_lossy(&buf);
                return Err(parse_error(lossy.trim(), err.to_string()).into());
            }
        };
        let content = line.trim();
        if content.is_empty() {
            continue;
        }

        let sector_number = content
            .parse::<SectorNumber>()
            .map_err(|err| parse_error(content, err.to_string()))?;
        if sector_number > MAX_SECTOR_NUMBER {
            return Err(parse_error(content, format!("larger than {}", MAX_SECTOR_NUMBER)).into());
        }
        sector_numbers.push(sector_number);
    }

    Ok(sector_numbers)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchParams {
    /// File with the sector numbers to prove.
    pub sector_file: PathBuf,
    /// Root of the sealed sector data.
    pub data_dir: PathBuf,
    /// Miner address, falls back to the configured one and then to the miner node's.
    pub actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchReport {
    pub actor_id: ActorId,
    /// Number of proof inputs, one per requested sector.
    pub sectors: usize,
    /// Requested sectors that are not on chain and were replaced by the placeholder.
    pub substituted: usize,
    pub proof_len: usize,
    pub wall_time_ms: u64,
    pub cpu_time_ms: u64,
}

/// Runs the benchmark against the nodes configured in `settings`.
pub fn run(params: &BenchParams, settings: &Settings) -> Result<BenchReport> {
    let sectors: SectorSet = read_sector_numbers(&params.sector_file)?
        .into_iter()
        .collect();
    info!("bench {} sectors", sectors.len());

    let miner = MinerClient::connect(settings)?;
    let chain = FullNodeClient::connect(settings)?;

    Benchmark::new(&miner, &chain, settings).run(
        params.actor.as_deref(),
        &sectors,
        || Ok(FileProver::new(SectorStore::new(&params.data_dir)?)),
        &mut OsRng,
    )
}

pub struct Benchmark<'a, M, C> {
    miner: &'a M,
    chain: &'a C,
    settings: &'a Settings,
}

impl<'a, M: MinerApi, C: ChainApi> Benchmark<'a, M, C> {
    pub fn new(miner: &'a M, chain: &'a C, settings: &'a Settings) -> Self {
        Benchmark {
            miner,
            chain,
            settings,
        }
    }

    /// Picks the miner from `actor`, the settings or, failing both, the miner node.
    pub fn actor_address(&self, actor: Option<&str>) -> Result<Address> {
        match actor.or(self.settings.actor.as_deref()) {
            Some(actor) => actor.parse(),
            None => self
                .miner
                .actor_address()
                .context(Error::Address("miner node did not report one".to_string())),
        }
    }

    /// Fetches the miner's sectors and resolves `sectors` against them.
    ///
    /// Also returns the requested sector numbers that were substituted.
    pub fn proof_inputs(
        &self,
        miner: &Address,
        sectors: &SectorSet,
    ) -> Result<(Vec<SectorInfo>, Vec<SectorNumber>)> {
        let filter = match self.settings.query_filter {
            QueryFilter::All => None,
            QueryFilter::Requested => Some(sectors),
        };
        let authoritative = self
            .chain
            .miner_sectors(miner, filter, &TipSetKey::head())
            .with_context(|| Error::Query(miner.to_string()))?;
        info!("miner {} has {} sectors on chain", miner, authoritative.len());

        let proof_sectors = resolve(&authoritative, sectors)?;
        let missing = substituted(&authoritative, sectors)?;
        if let Some(placeholder) = authoritative.first().filter(|_| !missing.is_empty()) {
            warn!(
                "{} requested sectors are not on chain, using sector {} in their place: {:?}",
                missing.len(),
                placeholder.sector_number,
                missing
            );
        }

        Ok((proof_sectors, missing))
    }

    pub fn run<P, F, R>(
        &self,
        actor: Option<&str>,
        sectors: &SectorSet,
        prover: F,
        rng: &mut R,
    ) -> Result<BenchReport>
    where
        P: WindowPoStProver,
        F: FnOnce() -> Result<P>,
        R: RngCore + CryptoRng,
    {
        let miner = self.actor_address(actor)?;
        let actor_id = miner.id()?;
        info!("proving for miner {} (actor {})", miner, actor_id);

        let (proof_sectors, missing) = self.proof_inputs(&miner, sectors)?;
        let prover = prover()?;

        let mut randomness = [0u8; 32];
        rng.fill_bytes(&mut randomness);

        let wall_start = Instant::now();
        let cpu_start = ProcessTime::now();
        let proof = prover.generate_window_post(actor_id, &proof_sectors, &randomness)?;
        let cpu_time = cpu_start.elapsed();
        let wall_time = wall_start.elapsed();
        info!(
            "window post over {} sectors took {:?} (cpu {:?})",
            proof_sectors.len(),
            wall_time,
            cpu_time
        );

        Ok(BenchReport {
            actor_id,
            sectors: proof_sectors.len(),
            substituted: missing.len(),
            proof_len: proof.len(),
            wall_time_ms: wall_time.as_millis() as u64,
            cpu_time_ms: cpu_time.as_millis() as u64,
        })
    }
}
