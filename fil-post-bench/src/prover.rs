use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use filecoin_proofs::{
    generate_window_post, with_shape, ChallengeSeed, Commitment, PoStConfig, PoStType,
    PrivateReplicaInfo, ProverId, SectorSize, SnarkProof, WINDOW_POST_CHALLENGE_COUNT,
    WINDOW_POST_SECTOR_COUNT,
};
use log::{info, warn};
use storage_proofs_core::{merkle::MerkleTreeTrait, sector::SectorId};

use crate::address::prover_id;
use crate::error::Error;
use crate::sector::{ActorId, SectorInfo, SectorNumber};
use crate::store::SectorStore;

/// Generates Window PoSt proofs over a positional list of sectors.
pub trait WindowPoStProver {
    fn generate_window_post(
        &self,
        actor_id: ActorId,
        sectors: &[SectorInfo],
        randomness: &ChallengeSeed,
    ) -> Result<SnarkProof>;
}

/// Proves sectors sealed into a [`SectorStore`].
#[derive(Debug)]
pub struct FileProver {
    store: SectorStore,
}

struct Replica {
    sector_id: SectorId,
    replica_path: PathBuf,
    comm_r: Commitment,
    cache_dir: PathBuf,
}

impl FileProver {
    pub fn new(store: SectorStore) -> Self {
        FileProver { store }
    }

    pub fn store(&self) -> &SectorStore {
        &self.store
    }
}

impl WindowPoStProver for FileProver {
    fn generate_window_post(
        &self,
        actor_id: ActorId,
        sectors: &[SectorInfo],
        randomness: &ChallengeSeed,
    ) -> Result<SnarkProof> {
        let first = match sectors.first() {
            Some(first) => first,
            None => {
                warn!("no sectors to prove, skipping window post");
                return Ok(Vec::new());
            }
        };
        let sector_size = first
            .seal_proof
            .sector_size()
            .context(Error::Proof(format!("sector {}", first.sector_number)))?;
        let api_version = first
            .seal_proof
            .api_version()
            .context(Error::Proof(format!("sector {}", first.sector_number)))?;

        // Substituted positions repeat a sector, the prover takes every sector once.
        let mut unique: BTreeMap<SectorNumber, &SectorInfo> = BTreeMap::new();
        for sector in sectors {
            let size = sector
                .seal_proof
                .sector_size()
                .context(Error::Proof(format!("sector {}", sector.sector_number)))?;
            if size != sector_size {
                bail!(Error::Proof(format!(
                    "sector {} has sector size {}, expected {}",
                    sector.sector_number, size, sector_size
                )));
            }
            let version = sector
                .seal_proof
                .api_version()
                .context(Error::Proof(format!("sector {}", sector.sector_number)))?;
            if version != api_version {
                bail!(Error::Proof(format!(
                    "sector {} uses proofs version {}, expected {}",
                    sector.sector_number, version, api_version
                )));
            }
            unique.insert(sector.sector_number, sector);
        }

        let faulty: Vec<SectorNumber> = unique
            .keys()
            .copied()
            .filter(|sector_number| !self.store.has_sector(actor_id, *sector_number))
            .collect();
        if !faulty.is_empty() {
            bail!(Error::Proof(format!(
                "missing sealed data for sectors {:?}",
                faulty
            )));
        }

        let replicas = unique
            .values()
            .map(|sector| {
                Ok(Replica {
                    sector_id: SectorId::from(sector.sector_number),
                    replica_path: self.store.sealed_path(actor_id, sector.sector_number),
                    comm_r: sector.comm_r()?,
                    cache_dir: self.store.cache_path(actor_id, sector.sector_number),
                })
            })
            .collect::<Result<Vec<_>>>()
            .context(Error::Proof("invalid sealed CID".to_string()))?;

        let sector_count = *WINDOW_POST_SECTOR_COUNT
            .read()
            .map_err(|_| anyhow!("WINDOW_POST_SECTOR_COUNT poisoned"))?
            .get(&sector_size)
            .ok_or_else(|| {
                Error::Proof(format!("unsupported sector size {}", sector_size))
            })?;
        let config = PoStConfig {
            sector_size: SectorSize(sector_size),
            challenge_count: WINDOW_POST_CHALLENGE_COUNT,
            sector_count,
            typ: PoStType::Window,
            priority: false,
            api_version,
        };

        // The randomness has to be a valid field element.
        let mut randomness = *randomness;
        randomness[31] &= 0x3f;

        info!(
            "generating window post for {} sectors ({} unique) of size {}",
            sectors.len(),
            replicas.len(),
            sector_size
        );
        with_shape!(
            sector_size,
            window_post,
            &config,
            &randomness,
            replicas,
            prover_id(actor_id),
        )
        .context(Error::Proof(format!("miner {}", actor_id)))
    }
}

fn window_post<Tree: 'static + MerkleTreeTrait>(
    config: &PoStConfig,
    randomness: &ChallengeSeed,
    replicas: Vec<Replica>,
    prover_id: ProverId,
) -> Result<SnarkProof> {
    let mut priv_replicas = BTreeMap::new();
    for replica in replicas {
        let info = PrivateReplicaInfo::<Tree>::new(
            replica.replica_path,
            replica.comm_r,
            replica.cache_dir,
        )
        .with_context(|| format!("invalid replica for sector {:?}", replica.sector_id))?;
        priv_replicas.insert(replica.sector_id, info);
    }

    generate_window_post::<Tree>(config, randomness, &priv_replicas, prover_id)
}
