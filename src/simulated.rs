//! In-process [`Ledger`] that emulates the protocol contracts.
//!
//! `SimulatedLedger` keeps a small world state (accounts, contract
//! storage, clock) behind a mutex and implements the subset of contract
//! behavior the fixture and its utilities exercise: mock tokens and
//! oracle, YieldBox share accounting, BeachBar administration, UniswapV2
//! pools, Mixologist markets with module dispatch, and the liquidation
//! queue. Contracts without observable behavior are deployed as inert
//! code that rejects every call.
//!
//! Transactions are atomic: a revert anywhere restores the state from
//! before the transaction. Reverts surface as [`LedgerError::Reverted`]
//! with the contract's revert string, the way an RPC node reports them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, B256, Bytes, Log, LogData, TxHash, U256, keccak256};
use alloy::sol_types::{SolEvent, SolValue};
use async_trait::async_trait;
use chrono::Utc;
use tapioca_ledger::artifact::ArtifactStoreError;
use tapioca_ledger::{Confirmation, Deployed, Ledger, LedgerError};
use tracing::debug;

use crate::contracts::ContractKind;
use crate::modules::{ModuleId, ModuleRegistry};

mod beach_bar;
mod market;
mod tokens;
mod uniswap;
mod yield_box;

use beach_bar::BeachBar;
use market::{LiquidationQueue, Market};
use tokens::{Oracle, Token};
use uniswap::{Factory, Pair, Router};
use yield_box::YieldBox;

const SIGNER_COUNT: u8 = 10;
const SIGNER_FUNDING_ETHER: u64 = 10_000;
const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Revert(String);

type Exec<T> = Result<T, Revert>;

fn revert<T>(reason: impl Into<String>) -> Exec<T> {
    Err(Revert(reason.into()))
}

fn require(condition: bool, reason: &str) -> Exec<()> {
    if condition { Ok(()) } else { revert(reason) }
}

fn bad_args(kind: ContractKind) -> impl FnOnce(alloy::sol_types::Error) -> Revert {
    move |err| Revert(format!("{kind}: invalid constructor arguments: {err}"))
}

#[derive(Debug, Clone)]
enum Contract {
    Oracle(Oracle),
    Token(Token),
    YieldBox(YieldBox),
    BeachBar(BeachBar),
    Factory(Factory),
    Router(Router),
    Pair(Pair),
    MasterMixologist,
    Market(Market),
    Module(ModuleId),
    LiquidationQueue(LiquidationQueue),
    Inert(ContractKind),
}

#[derive(Debug, Clone, Default)]
struct World {
    contracts: HashMap<Address, Contract>,
    nonces: HashMap<Address, u64>,
    ether: HashMap<Address, U256>,
    timestamp: u64,
    transactions: u64,
    logs: Vec<Log>,
    modules: ModuleRegistry,
}

impl World {
    fn genesis(signers: &[Address]) -> Self {
        let funding = U256::from(SIGNER_FUNDING_ETHER) * U256::from(WEI_PER_ETHER);

        Self {
            ether: signers.iter().map(|signer| (*signer, funding)).collect(),
            timestamp: u64::try_from(Utc::now().timestamp()).unwrap_or_default(),
            ..Self::default()
        }
    }

    fn next_create_address(&mut self, deployer: Address) -> Address {
        let nonce = self.nonces.entry(deployer).or_default();
        let address = deployer.create(*nonce);
        *nonce += 1;
        address
    }

    fn emit(&mut self, emitter: Address, data: LogData) {
        self.logs.push(Log {
            address: emitter,
            data,
        });
    }

    fn emit_event<E: SolEvent>(&mut self, emitter: Address, event: &E) {
        self.emit(emitter, event.encode_log_data());
    }

    fn deploy(&mut self, from: Address, kind: ContractKind, args: &[u8]) -> Exec<Address> {
        let contract = match kind {
            ContractKind::OracleMock => Contract::Oracle(Oracle::default()),
            ContractKind::ERC20Mock => {
                let (initial_supply,) = <(U256,)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Token(Token::with_supply(from, initial_supply))
            }
            ContractKind::WETH9Mock => Contract::Token(Token::default()),
            ContractKind::YieldBox => {
                let (_wrapped_native, _uri_builder) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::YieldBox(YieldBox::default())
            }
            ContractKind::BeachBar => {
                let (yield_box, _tap) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                require(
                    matches!(self.contracts.get(&yield_box), Some(Contract::YieldBox(_))),
                    "BeachBar: yieldBox is not a contract",
                )?;
                Contract::BeachBar(BeachBar::new(from, yield_box))
            }
            ContractKind::UniswapV2Factory => {
                let (_fee_to_setter,) =
                    <(Address,)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Factory(Factory::default())
            }
            ContractKind::UniswapV2Router02 => {
                let (factory, _weth) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                require(
                    matches!(self.contracts.get(&factory), Some(Contract::Factory(_))),
                    "UniswapV2Router: factory is not a contract",
                )?;
                Contract::Router(Router { factory })
            }
            ContractKind::MultiSwapper => {
                let (_factory, _bar, _pair_code_hash) =
                    <(Address, Address, B256)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Inert(kind)
            }
            ContractKind::BaseMixologist => Contract::MasterMixologist,
            ContractKind::MixologistLendingBorrowing => {
                Contract::Module(ModuleId::LendingBorrowing)
            }
            ContractKind::MixologistLiquidation => Contract::Module(ModuleId::Liquidation),
            ContractKind::MixologistSetter => Contract::Module(ModuleId::Setter),
            ContractKind::LiquidationQueue => {
                Contract::LiquidationQueue(LiquidationQueue::default())
            }
            ContractKind::UniUsdoToWethBidder => {
                let (_swapper, _market) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Inert(kind)
            }
            ContractKind::CurvePoolMock => {
                let (_usdo, _stable) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Inert(kind)
            }
            ContractKind::CurveSwapper => {
                let (_pool, _bar) =
                    <(Address, Address)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Inert(kind)
            }
            ContractKind::CurveStableToUsdoBidder => {
                let (_swapper, _market, _coins) =
                    <(Address, Address, U256)>::abi_decode_params(args).map_err(bad_args(kind))?;
                Contract::Inert(kind)
            }
            ContractKind::YieldBoxURIBuilder
            | ContractKind::UniswapV2Pair
            | ContractKind::MixologistHelper => Contract::Inert(kind),
        };

        let address = self.next_create_address(from);
        self.contracts.insert(address, contract);
        Ok(address)
    }

    /// Executes a message call from `sender` to `target`.
    fn execute(&mut self, sender: Address, target: Address, data: &[u8]) -> Exec<Bytes> {
        match self.contracts.get(&target) {
            None => revert(format!("call to non-contract account {target}")),
            Some(Contract::Oracle(_)) => self.oracle_call(target, data),
            Some(Contract::Token(_)) => self.token_call(sender, target, data),
            Some(Contract::YieldBox(_)) => self.yield_box_call(sender, target, data),
            Some(Contract::BeachBar(_)) => self.beach_bar_call(sender, target, data),
            Some(Contract::Factory(_)) => self.factory_call(target, data),
            Some(Contract::Router(_)) => self.router_call(sender, target, data),
            Some(Contract::Pair(_)) => self.pair_call(target, data),
            Some(Contract::Market(_)) => self.market_call(sender, target, data),
            Some(Contract::LiquidationQueue(_)) => {
                self.liquidation_queue_call(sender, target, data)
            }
            Some(Contract::MasterMixologist | Contract::Module(_) | Contract::Inert(_)) => {
                revert("function selector was not recognized")
            }
        }
    }

    /// Like [`Self::execute`], but a revert only undoes this call's own
    /// effects and is reported instead of propagated.
    fn try_execute(&mut self, sender: Address, target: Address, data: &[u8]) -> Exec<Bytes> {
        let snapshot = self.clone();
        let outcome = self.execute(sender, target, data);

        if outcome.is_err() {
            *self = snapshot;
        }

        outcome
    }

    /// Runs `step` atomically, collecting the logs it emits.
    fn transact<T>(
        &mut self,
        note: &str,
        step: impl FnOnce(&mut Self) -> Exec<T>,
    ) -> Result<(T, TxHash, Vec<Log>), LedgerError> {
        let snapshot = self.clone();
        self.logs.clear();

        match step(self) {
            Ok(output) => {
                self.transactions += 1;
                let tx_hash = keccak256(self.transactions.to_be_bytes());
                Ok((output, tx_hash, std::mem::take(&mut self.logs)))
            }
            Err(Revert(reason)) => {
                *self = snapshot;
                Err(LedgerError::Reverted {
                    note: note.to_string(),
                    reason,
                })
            }
        }
    }
}

macro_rules! accessors {
    ($($variant:ident => $name:ident, $name_mut:ident: $ty:ty, $what:literal;)*) => {
        impl World {
            $(
                fn $name(&self, at: Address) -> Exec<&$ty> {
                    match self.contracts.get(&at) {
                        Some(Contract::$variant(state)) => Ok(state),
                        _ => revert(format!("{at} is not {}", $what)),
                    }
                }

                fn $name_mut(&mut self, at: Address) -> Exec<&mut $ty> {
                    match self.contracts.get_mut(&at) {
                        Some(Contract::$variant(state)) => Ok(state),
                        _ => revert(format!("{at} is not {}", $what)),
                    }
                }
            )*
        }
    };
}

accessors! {
    Oracle => oracle, oracle_mut: Oracle, "an oracle";
    Token => token, token_mut: Token, "an ERC20 token";
    YieldBox => yield_box, yield_box_mut: YieldBox, "a YieldBox";
    BeachBar => beach_bar, beach_bar_mut: BeachBar, "a BeachBar";
    Factory => factory, factory_mut: Factory, "a UniswapV2 factory";
    Pair => pair, pair_mut: Pair, "a UniswapV2 pair";
    Market => market, market_mut: Market, "a Mixologist market";
    LiquidationQueue => liquidation_queue, liquidation_queue_mut: LiquidationQueue, "a liquidation queue";
}

/// Ledger emulating the protocol contracts in memory.
pub struct SimulatedLedger {
    signers: Vec<Address>,
    world: Mutex<World>,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        let signers: Vec<_> = (1..=SIGNER_COUNT).map(Address::with_last_byte).collect();
        let world = Mutex::new(World::genesis(&signers));

        Self { signers, world }
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current block timestamp.
    pub fn timestamp(&self) -> u64 {
        self.world().timestamp
    }

    pub fn ether_balance(&self, account: Address) -> U256 {
        self.world()
            .ether
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Number of accounts holding code.
    pub fn contract_count(&self) -> usize {
        self.world().contracts.len()
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    async fn signers(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.signers.clone())
    }

    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<Deployed, LedgerError> {
        let kind: ContractKind = contract.parse().map_err(|_| {
            LedgerError::Artifact(ArtifactStoreError::UnknownContract(contract.to_string()))
        })?;

        let note = format!("deploy {contract}");
        let (address, tx_hash, _) = self
            .world()
            .transact(&note, |world| world.deploy(from, kind, &constructor_args))?;

        debug!(%address, contract, "Simulated deployment confirmed");

        Ok(Deployed { address, tx_hash })
    }

    async fn call(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
    ) -> Result<Bytes, LedgerError> {
        let mut scratch = self.world().clone();

        scratch
            .execute(from, contract, &calldata)
            .map_err(|Revert(reason)| LedgerError::Reverted {
                note: "view call".to_string(),
                reason,
            })
    }

    async fn send(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
        note: &str,
    ) -> Result<Confirmation, LedgerError> {
        let (_, tx_hash, logs) = self.world().transact(note, |world| {
            *world.nonces.entry(from).or_default() += 1;
            world.execute(from, contract, &calldata)
        })?;

        debug!(%from, %contract, note, %tx_hash, "Simulated transaction confirmed");

        Ok(Confirmation { tx_hash, logs })
    }

    async fn reset(&self) -> Result<(), LedgerError> {
        *self.world() = World::genesis(&self.signers);
        Ok(())
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), LedgerError> {
        self.world().ether.insert(account, amount);
        Ok(())
    }

    async fn advance_time(&self, seconds: u64) -> Result<(), LedgerError> {
        let mut world = self.world();
        world.timestamp = world.timestamp.saturating_add(seconds);
        Ok(())
    }

    async fn latest_timestamp(&self) -> Result<u64, LedgerError> {
        Ok(self.timestamp())
    }
}
