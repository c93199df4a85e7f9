//! Filecoin address strings, as far as the benchmark needs them.
//!
//! Addresses are validated syntactically (network, protocol and payload shape) and otherwise
//! passed on to the node verbatim. Only ID addresses can be turned into an actor ID.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use filecoin_proofs::ProverId;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::sector::ActorId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Id,
    Secp256k1,
    Actor,
    Bls,
    Delegated,
}

impl Protocol {
    fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Protocol::Id),
            '1' => Some(Protocol::Secp256k1),
            '2' => Some(Protocol::Actor),
            '3' => Some(Protocol::Bls),
            '4' => Some(Protocol::Delegated),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    raw: String,
    protocol: Protocol,
    id: Option<ActorId>,
}

impl Address {
    pub fn new_id(network: char, id: ActorId) -> Self {
        Address {
            raw: format!("{}0{}", network, id),
            protocol: Protocol::Id,
            id: Some(id),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The actor ID of an ID address.
    pub fn id(&self) -> Result<ActorId> {
        match self.id {
            Some(id) => Ok(id),
            None => bail!(Error::Address(format!(
                "{} is not an ID address",
                self.raw
            ))),
        }
    }

    /// The prover ID used for proofs of this miner: the LEB128 encoded actor ID, zero padded.
    pub fn prover_id(&self) -> Result<ProverId> {
        Ok(prover_id(self.id()?))
    }
}

pub fn prover_id(actor_id: ActorId) -> ProverId {
    let mut prover_id = [0u8; 32];
    let mut value = actor_id;
    for byte in prover_id.iter_mut() {
        *byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
        *byte |= 0x80;
    }
    prover_id
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Address(format!("{:?}: {}", s, reason));

        let mut chars = s.chars();
        match chars.next() {
            Some('f') | Some('t') => {}
            _ => bail!(invalid("unknown network")),
        }
        let protocol = match chars.next().and_then(Protocol::from_digit) {
            Some(protocol) => protocol,
            None => bail!(invalid("unknown protocol")),
        };
        let payload = chars.as_str();
        if payload.is_empty() {
            bail!(invalid("missing payload"));
        }

        let id = match protocol {
            Protocol::Id => {
                if !payload.bytes().all(|b| b.is_ascii_digit()) {
                    bail!(invalid("ID must be decimal"));
                }
                match payload.parse::<ActorId>() {
                    Ok(id) => Some(id),
                    Err(_) => bail!(invalid("ID out of range")),
                }
            }
            Protocol::Secp256k1 | Protocol::Actor => {
                // 20 byte hash plus 4 byte checksum in unpadded base32.
                check_base32(payload, 39).map_err(invalid)?;
                None
            }
            Protocol::Bls => {
                // 48 byte public key plus 4 byte checksum in unpadded base32.
                check_base32(payload, 84).map_err(invalid)?;
                None
            }
            Protocol::Delegated => {
                // <namespace>f<base32 subaddress and checksum>
                match payload.split_once('f') {
                    Some((namespace, rest))
                        if !namespace.is_empty()
                            && namespace.bytes().all(|b| b.is_ascii_digit())
                            && !rest.is_empty()
                            && rest.bytes().all(is_base32) => {}
                    _ => bail!(invalid("malformed delegated address")),
                }
                None
            }
        };

        Ok(Address {
            raw: s.to_string(),
            protocol,
            id,
        })
    }
}

fn is_base32(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'2'..=b'7')
}

fn check_base32(payload: &str, len: usize) -> std::result::Result<(), &'static str> {
    if payload.len() != len {
        return Err("payload has the wrong length");
    }
    if !payload.bytes().all(is_base32) {
        return Err("payload is not base32");
    }
    Ok(())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: anyhow::Error| de::Error::custom(e))
    }
}
