//! Provisioning harness for the BeachBar / Mixologist lending stack.
//!
//! [`provision::Provisioner`] deploys and wires a complete WETH/USDC
//! lending market on any [`tapioca_ledger::Ledger`] and returns a
//! [`fixture::Fixture`] with typed handles and bound utilities for
//! scenario tests. [`deploy::deploy_beach_bar`] is the standalone
//! controller deployment used against shared networks.

pub mod artifacts;
pub mod bindings;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod deploy;
pub mod dispatch;
pub mod error;
pub mod fixture;
pub mod liquidation_queue;
pub mod liquidity;
pub mod modules;
pub mod provision;

#[cfg(any(test, feature = "test-support"))]
pub mod simulated;


pub use config::setup_tracing;
