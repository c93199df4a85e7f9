#![deny(clippy::all, clippy::perf, clippy::correctness, rust_2018_idioms)]
#![warn(clippy::unwrap_used)]

pub mod address;
pub mod api;
pub mod bench;
pub mod bitfield;
pub mod cli;
pub mod error;
pub mod prover;
pub mod resolve;
pub mod sector;
pub mod settings;
pub mod store;

pub use crate::bench::{run, BenchParams, BenchReport, Benchmark};
pub use crate::bitfield::SectorSet;
pub use crate::error::{Error, Result};
pub use crate::resolve::resolve;
pub use crate::sector::{SectorInfo, SectorNumber};
pub use crate::settings::Settings;
