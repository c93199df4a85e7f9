use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use anyhow::{bail, Result};
use fil_post_bench::address::Address;
use fil_post_bench::api::{ChainApi, MinerApi, TipSetKey};
use fil_post_bench::prover::WindowPoStProver;
use fil_post_bench::sector::{sealed_cid, ActorId, RegisteredSealProof};
use fil_post_bench::settings::QueryFilter;
use fil_post_bench::{
    run, BenchParams, Benchmark, Error, SectorInfo, SectorNumber, SectorSet, Settings,
};
use filecoin_proofs::{ChallengeSeed, SnarkProof};
use pretty_assertions::assert_eq;
use rand::rngs::OsRng;

fn sector(sector_number: SectorNumber, seed: u8) -> SectorInfo {
    SectorInfo {
        sector_number,
        seal_proof: RegisteredSealProof(8),
        sealed_cid: sealed_cid(&[seed; 32]).expect("valid cid"),
    }
}

struct FakeMiner {
    address: Option<&'static str>,
}

impl MinerApi for FakeMiner {
    fn actor_address(&self) -> Result<Address> {
        match self.address {
            Some(address) => address.parse(),
            None => bail!("connection reset by peer"),
        }
    }
}

#[derive(Default)]
struct FakeChain {
    sectors: Vec<SectorInfo>,
    fail: bool,
    filters: RefCell<Vec<Option<SectorSet>>>,
}

impl ChainApi for FakeChain {
    fn miner_sectors(
        &self,
        _miner: &Address,
        filter: Option<&SectorSet>,
        tsk: &TipSetKey,
    ) -> Result<Vec<SectorInfo>> {
        assert_eq!(tsk, &TipSetKey::head());
        self.filters.borrow_mut().push(filter.cloned());
        if self.fail {
            bail!("actor not found");
        }
        Ok(self.sectors.clone())
    }
}

type Calls = Rc<RefCell<Vec<(ActorId, Vec<SectorInfo>, ChallengeSeed)>>>;

struct FakeProver {
    calls: Calls,
    fail: bool,
}

impl WindowPoStProver for FakeProver {
    fn generate_window_post(
        &self,
        actor_id: ActorId,
        sectors: &[SectorInfo],
        randomness: &ChallengeSeed,
    ) -> Result<SnarkProof> {
        self.calls
            .borrow_mut()
            .push((actor_id, sectors.to_vec(), *randomness));
        if self.fail {
            bail!(Error::Proof("no parameters found".to_string()));
        }
        Ok(vec![0u8; 192])
    }
}

fn prover(calls: &Calls, fail: bool) -> impl FnOnce() -> Result<FakeProver> {
    let calls = calls.clone();
    move || Ok(FakeProver { calls, fail })
}

fn requested(numbers: &[SectorNumber]) -> SectorSet {
    numbers.iter().copied().collect()
}

#[test]
fn proves_resolved_sectors() {
    let a = sector(5, 1);
    let b = sector(7, 2);
    let miner = FakeMiner { address: None };
    let chain = FakeChain {
        sectors: vec![a.clone(), b.clone()],
        ..Default::default()
    };
    let settings = Settings::default();
    let calls = Calls::default();

    let report = Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f01000"),
            &requested(&[6, 7, 5]),
            prover(&calls, false),
            &mut OsRng,
        )
        .unwrap();

    assert_eq!(report.actor_id, 1000);
    assert_eq!(report.sectors, 3);
    assert_eq!(report.substituted, 1);
    assert_eq!(report.proof_len, 192);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 1000);
    assert_eq!(calls[0].1, vec![a.clone(), a, b]);

    // All sectors are queried by default.
    assert_eq!(chain.filters.borrow().as_slice(), &[None]);
}

#[test]
fn actor_falls_back_to_settings_then_miner() {
    let chain = FakeChain {
        sectors: vec![sector(1, 1)],
        ..Default::default()
    };
    let calls = Calls::default();

    let miner = FakeMiner {
        address: Some("f02000"),
    };
    let settings = Settings {
        actor: Some("f03000".to_string()),
        ..Default::default()
    };
    let report = Benchmark::new(&miner, &chain, &settings)
        .run(None, &requested(&[1]), prover(&calls, false), &mut OsRng)
        .unwrap();
    assert_eq!(report.actor_id, 3000);

    let settings = Settings::default();
    let report = Benchmark::new(&miner, &chain, &settings)
        .run(None, &requested(&[1]), prover(&calls, false), &mut OsRng)
        .unwrap();
    assert_eq!(report.actor_id, 2000);
}

#[test]
fn unresolvable_actor_is_an_address_error() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain::default();
    let settings = Settings::default();
    let calls = Calls::default();

    let err = Benchmark::new(&miner, &chain, &settings)
        .run(None, &requested(&[1]), prover(&calls, false), &mut OsRng)
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Address(_))));
    assert!(chain.filters.borrow().is_empty());
    assert!(calls.borrow().is_empty());
}

#[test]
fn non_id_address_is_rejected() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain::default();
    let settings = Settings::default();
    let calls = Calls::default();

    let err = Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f2kzpcyp5ff6fqqfpsl2s2gkhgw7i5iv4hlxdwsqa"),
            &requested(&[1]),
            prover(&calls, false),
            &mut OsRng,
        )
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Address(_))));
    assert!(chain.filters.borrow().is_empty());
}

#[test]
fn query_failure_is_annotated() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain {
        fail: true,
        ..Default::default()
    };
    let settings = Settings::default();
    let calls = Calls::default();

    let err = Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f01000"),
            &requested(&[1]),
            prover(&calls, false),
            &mut OsRng,
        )
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Query(_))));
    assert!(format!("{:#}", err).ends_with("actor not found"));
    assert!(calls.borrow().is_empty());
}

#[test]
fn requested_filter_is_passed_to_the_chain() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain {
        sectors: vec![sector(3, 1)],
        ..Default::default()
    };
    let settings = Settings {
        query_filter: QueryFilter::Requested,
        ..Default::default()
    };
    let calls = Calls::default();

    Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f01000"),
            &requested(&[3, 4]),
            prover(&calls, false),
            &mut OsRng,
        )
        .unwrap();
    assert_eq!(
        chain.filters.borrow().as_slice(),
        &[Some(requested(&[3, 4]))]
    );
}

#[test]
fn empty_provider_proves_nothing() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain::default();
    let settings = Settings::default();
    let calls = Calls::default();

    let report = Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f01000"),
            &requested(&[1, 2, 3]),
            prover(&calls, false),
            &mut OsRng,
        )
        .unwrap();
    assert_eq!(report.sectors, 0);
    assert_eq!(report.substituted, 0);
    assert!(calls.borrow()[0].1.is_empty());
}

#[test]
fn prover_errors_are_returned_verbatim() {
    let miner = FakeMiner { address: None };
    let chain = FakeChain {
        sectors: vec![sector(1, 1)],
        ..Default::default()
    };
    let settings = Settings::default();
    let calls = Calls::default();

    let err = Benchmark::new(&miner, &chain, &settings)
        .run(
            Some("f01000"),
            &requested(&[1]),
            prover(&calls, true),
            &mut OsRng,
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "window post generation failed: no parameters found"
    );
    assert_eq!(calls.borrow().len(), 1);
}

fn unreachable_settings() -> Settings {
    Settings {
        miner_api_info: "/ip4/127.0.0.1/tcp/1/http".to_string(),
        fullnode_api_info: "/ip4/127.0.0.1/tcp/1/http".to_string(),
        rpc_timeout_secs: Some(5),
        ..Default::default()
    }
}

#[test]
fn malformed_file_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let sector_file = dir.path().join("sectors.txt");
    fs::write(&sector_file, "3\nabc\n").unwrap();

    let params = BenchParams {
        sector_file,
        data_dir: dir.path().to_path_buf(),
        actor: Some("f01000".to_string()),
    };
    let err = run(&params, &unreachable_settings()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::Parse { line: 2, .. })
    ));
}

#[test]
fn unreachable_node_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let sector_file = dir.path().join("sectors.txt");
    fs::write(&sector_file, "3\n5\n").unwrap();

    let params = BenchParams {
        sector_file,
        data_dir: dir.path().to_path_buf(),
        actor: Some("f01000".to_string()),
    };
    let err = run(&params, &unreachable_settings()).unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::Connection { api, endpoint }) => {
            assert_eq!(*api, "miner");
            assert_eq!(endpoint, "http://127.0.0.1:1/rpc/v0");
        }
        other => panic!("unexpected error {:?}", other),
    }
}
