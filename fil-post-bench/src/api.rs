//! Blocking JSON-RPC clients for the Lotus miner and full node APIs.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use cid::Cid;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

use crate::address::Address;
use crate::bitfield::SectorSet;
use crate::error::Error;
use crate::sector::{cid_json, SectorInfo};
use crate::settings::Settings;

/// The storage miner side of the node.
pub trait MinerApi {
    /// The address of the miner actor this node operates.
    fn actor_address(&self) -> Result<Address>;
}

/// Chain state queries.
pub trait ChainApi {
    /// On-chain info of the miner's sectors at `tsk`.
    ///
    /// `filter` restricts the result to the given sector numbers, `None` returns all sectors.
    fn miner_sectors(
        &self,
        miner: &Address,
        filter: Option<&SectorSet>,
        tsk: &TipSetKey,
    ) -> Result<Vec<SectorInfo>>;
}

/// Identifies a tipset, the empty key refers to the current head.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipSetKey {
    cids: Vec<Cid>,
}

impl TipSetKey {
    pub fn new(cids: Vec<Cid>) -> Self {
        TipSetKey { cids }
    }

    pub fn head() -> Self {
        TipSetKey::default()
    }
}

impl Serialize for TipSetKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct CidRef<'a>(&'a Cid);

        impl Serialize for CidRef<'_> {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                cid_json::serialize(self.0, serializer)
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.cids.len()))?;
        for cid in &self.cids {
            seq.serialize_element(&CidRef(cid))?;
        }
        seq.end()
    }
}

/// Where an API is reachable, parsed from a Lotus style `[TOKEN:]MULTIADDR` string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiInfo {
    pub url: String,
    pub token: Option<String>,
}

impl FromStr for ApiInfo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (token, addr) = match s.split_once(':') {
            Some((token, addr)) if !s.starts_with('/') && !s.contains("://") => {
                (Some(token.to_string()), addr)
            }
            _ => (None, s),
        };

        if addr.starts_with("http://") || addr.starts_with("https://") {
            return Ok(ApiInfo {
                url: addr.to_string(),
                token,
            });
        }

        let parts: Vec<&str> = addr.split('/').collect();
        ensure!(
            parts.len() >= 5 && parts[0].is_empty(),
            "malformed multiaddr {:?}",
            addr
        );
        let host = match parts[1] {
            "ip4" | "dns" | "dns4" | "dns6" => parts[2].to_string(),
            "ip6" => format!("[{}]", parts[2]),
            other => bail!("unsupported address protocol {:?} in {:?}", other, addr),
        };
        ensure!(parts[3] == "tcp", "multiaddr {:?} is not a tcp address", addr);
        let port: u16 = parts[4]
            .parse()
            .with_context(|| format!("invalid port in multiaddr {:?}", addr))?;
        let scheme = match parts.get(5).copied() {
            None | Some("http") | Some("ws") => "http",
            Some("https") | Some("wss") => "https",
            Some(other) => bail!("unsupported transport {:?} in {:?}", other, addr),
        };

        Ok(ApiInfo {
            url: format!("{}://{}:{}/rpc/v0", scheme, host, port),
            token,
        })
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Version {
    version: String,
}

fn decode_response<R: DeserializeOwned>(body: &[u8]) -> Result<R> {
    let response: Response =
        serde_json::from_slice(body).context("malformed JSON-RPC response")?;
    if let Some(ResponseError { code, message }) = response.error {
        bail!(Error::Rpc { code, message });
    }
    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result).context("unexpected JSON-RPC result")
}

/// A connection to one node API. The connection is released on drop.
#[derive(Debug)]
pub struct RpcClient {
    api: &'static str,
    info: ApiInfo,
    client: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Connects to `info` and checks the node answers.
    pub fn connect(api: &'static str, info: &str, timeout: Option<Duration>) -> Result<Self> {
        let connection_error = |endpoint: &str| Error::Connection {
            api,
            endpoint: endpoint.to_string(),
        };

        let info: ApiInfo = info.parse().with_context(|| connection_error(info))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| connection_error(&info.url))?;
        let rpc = RpcClient {
            api,
            info,
            client,
            next_id: AtomicU64::new(0),
        };

        let version: Version = rpc
            .call("Filecoin.Version", json!([]))
            .with_context(|| connection_error(&rpc.info.url))?;
        info!(
            "connected to {} API at {} (version {})",
            api, rpc.info.url, version.version
        );

        Ok(rpc)
    }

    pub fn url(&self) -> &str {
        &self.info.url
    }

    pub fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!("{} API request: {}", self.api, method);

        let mut builder = self.client.post(&self.info.url).json(&request);
        if let Some(token) = &self.info.token {
            builder = builder.bearer_auth(token);
        }
        let body = builder
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .with_context(|| format!("{} request to {} failed", method, self.info.url))?;

        decode_response(&body).with_context(|| format!("{} failed", method))
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        debug!("closing {} API connection to {}", self.api, self.info.url);
    }
}

pub struct MinerClient {
    rpc: RpcClient,
}

impl MinerClient {
    pub fn connect(settings: &Settings) -> Result<Self> {
        let rpc = RpcClient::connect(
            "miner",
            &settings.miner_api_info,
            settings.rpc_timeout_secs.map(Duration::from_secs),
        )?;
        Ok(MinerClient { rpc })
    }
}

impl MinerApi for MinerClient {
    fn actor_address(&self) -> Result<Address> {
        self.rpc.call("Filecoin.ActorAddress", json!([]))
    }
}

pub struct FullNodeClient {
    rpc: RpcClient,
}

impl FullNodeClient {
    pub fn connect(settings: &Settings) -> Result<Self> {
        let rpc = RpcClient::connect(
            "full node",
            &settings.fullnode_api_info,
            settings.rpc_timeout_secs.map(Duration::from_secs),
        )?;
        Ok(FullNodeClient { rpc })
    }
}

impl ChainApi for FullNodeClient {
    fn miner_sectors(
        &self,
        miner: &Address,
        filter: Option<&SectorSet>,
        tsk: &TipSetKey,
    ) -> Result<Vec<SectorInfo>> {
        let sectors: Option<Vec<SectorInfo>> = self
            .rpc
            .call("Filecoin.StateMinerSectors", json!([miner, filter, tsk]))?;
        Ok(sectors.unwrap_or_default())
    }
}
