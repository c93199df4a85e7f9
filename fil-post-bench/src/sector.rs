use anyhow::{ensure, Context, Result};
use cid::{multihash::MultihashGeneric, Cid};
use filecoin_proofs::{
    Commitment, SECTOR_SIZE_2_KIB, SECTOR_SIZE_32_GIB, SECTOR_SIZE_512_MIB, SECTOR_SIZE_64_GIB,
    SECTOR_SIZE_8_MIB,
};
use serde::{Deserialize, Serialize};
use storage_proofs_core::api_version::ApiVersion;

/// Sector numbers are relative to a miner.
pub type SectorNumber = u64;

/// Sector numbers are limited to the positive range of an `i64` on chain.
pub const MAX_SECTOR_NUMBER: SectorNumber = i64::MAX as u64;

/// The numeric part of an ID address.
pub type ActorId = u64;

/// Multicodec of sealed sector commitments.
pub const FIL_COMMITMENT_SEALED: u64 = 0xf102;
/// Multihash code of comm_r digests.
pub const POSEIDON_BLS12_381_A2_FC1: u64 = 0xb401;

const SECTOR_SIZES: [u64; 5] = [
    SECTOR_SIZE_2_KIB,
    SECTOR_SIZE_8_MIB,
    SECTOR_SIZE_512_MIB,
    SECTOR_SIZE_32_GIB,
    SECTOR_SIZE_64_GIB,
];

/// The seal proof a sector was sealed with, as the integer the chain stores.
///
/// Values come in groups of five sector sizes (2KiB, 8MiB, 512MiB, 32GiB, 64GiB): `0..=4` are the
/// V1 proofs, `5..=9` V1_1, `10..=14` V1_1 with synthetic PoRep and `15..=19` non-interactive
/// PoRep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisteredSealProof(pub i64);

impl RegisteredSealProof {
    fn index(&self) -> Result<usize> {
        ensure!(
            (0..20).contains(&self.0),
            "unsupported seal proof type {}",
            self.0
        );
        Ok(self.0 as usize)
    }

    pub fn sector_size(&self) -> Result<u64> {
        Ok(SECTOR_SIZES[self.index()? % SECTOR_SIZES.len()])
    }

    pub fn api_version(&self) -> Result<ApiVersion> {
        let version = match self.index()? / SECTOR_SIZES.len() {
            0 => ApiVersion::V1_0_0,
            1 => ApiVersion::V1_1_0,
            _ => ApiVersion::V1_2_0,
        };
        Ok(version)
    }
}

/// The on-chain metadata needed to prove a sector.
///
/// This is the subset of the sector on-chain info returned by `Filecoin.StateMinerSectors`,
/// other fields are ignored when decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectorInfo {
    pub sector_number: SectorNumber,
    pub seal_proof: RegisteredSealProof,
    #[serde(rename = "SealedCID", with = "cid_json")]
    pub sealed_cid: Cid,
}

impl SectorInfo {
    /// Extracts comm_r from the sealed CID.
    pub fn comm_r(&self) -> Result<Commitment> {
        ensure!(
            self.sealed_cid.codec() == FIL_COMMITMENT_SEALED,
            "sector {}: sealed CID {} has codec {:#x}, expected {:#x}",
            self.sector_number,
            self.sealed_cid,
            self.sealed_cid.codec(),
            FIL_COMMITMENT_SEALED
        );
        let hash = self.sealed_cid.hash();
        ensure!(
            hash.code() == POSEIDON_BLS12_381_A2_FC1,
            "sector {}: sealed CID {} has hash function {:#x}, expected {:#x}",
            self.sector_number,
            self.sealed_cid,
            hash.code(),
            POSEIDON_BLS12_381_A2_FC1
        );
        let comm_r = Commitment::try_from(hash.digest()).with_context(|| {
            format!(
                "sector {}: sealed CID digest must be 32 bytes, got {}",
                self.sector_number,
                hash.digest().len()
            )
        })?;
        Ok(comm_r)
    }
}

/// Builds the sealed CID for a comm_r.
pub fn sealed_cid(comm_r: &Commitment) -> Result<Cid> {
    let hash = MultihashGeneric::<64>::wrap(POSEIDON_BLS12_381_A2_FC1, comm_r)?;
    Ok(Cid::new_v1(FIL_COMMITMENT_SEALED, hash))
}

/// CIDs as the Lotus JSON API writes them: `{"/": "<cid>"}`.
pub mod cid_json {
    use cid::Cid;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct CidJson {
        #[serde(rename = "/")]
        cid: String,
    }

    pub fn serialize<S>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        CidJson {
            cid: cid.to_string(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Cid, D::Error>
    where
        D: Deserializer<'de>,
    {
        let CidJson { cid } = CidJson::deserialize(deserializer)?;
        Cid::try_from(cid.as_str()).map_err(de::Error::custom)
    }
}
