use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::error::Error;
use crate::sector::{ActorId, SectorNumber};

/// Sealed sector data on local disk.
///
/// Sectors are stored as `<root>/sealed/s-t0<actor>-<number>` (the replica) and
/// `<root>/cache/s-t0<actor>-<number>` (the directory holding the trees and `p_aux`).
#[derive(Clone, Debug)]
pub struct SectorStore {
    root: PathBuf,
}

impl SectorStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let metadata = root
            .metadata()
            .with_context(|| Error::Io(root.to_path_buf()))?;
        if !metadata.is_dir() {
            return Err(anyhow!("not a directory").context(Error::Io(root.to_path_buf())));
        }
        Ok(SectorStore {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sector_name(miner: ActorId, sector_number: SectorNumber) -> String {
        format!("s-t0{}-{}", miner, sector_number)
    }

    pub fn sealed_path(&self, miner: ActorId, sector_number: SectorNumber) -> PathBuf {
        self.root
            .join("sealed")
            .join(Self::sector_name(miner, sector_number))
    }

    pub fn cache_path(&self, miner: ActorId, sector_number: SectorNumber) -> PathBuf {
        self.root
            .join("cache")
            .join(Self::sector_name(miner, sector_number))
    }

    /// Whether both the replica and the cache directory of a sector exist.
    pub fn has_sector(&self, miner: ActorId, sector_number: SectorNumber) -> bool {
        self.sealed_path(miner, sector_number).is_file()
            && self.cache_path(miner, sector_number).is_dir()
    }
}
