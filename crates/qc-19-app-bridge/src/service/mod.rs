//! Consensus Bridge - the six-phase block lifecycle.
//!
//! # Architecture
//! - Lifecycle calls arrive strictly in sequence and take `&mut self`
//! - CheckTx is served by a [`MempoolConnection`] that only reads committed views
//! - The relational transaction opened at BeginBlock is the only native write
//!   path of the block and follows the engine's commit outcome at Commit
//!
//! # Commit ordering
//! 1. Signal shutdown if a retirement succeeded
//! 2. Clear the mempool validation cache
//! 3. Commit the execution engine
//! 4. Commit (or roll back) the relational transaction
//! 5. Flush params when dirty or at height 1
//! 6. Reset the gas fee accumulators
//! 7. Commit the native store and compute the composite hash

pub mod mempool;
pub mod shutdown;


pub use mempool::{BlockClock, MempoolConnection};
pub use shutdown::ShutdownSignal;

use std::sync::Arc;

use parking_lot::RwLock;
use qc_18_staking::{
    with_autocommit, BlockTransaction, ExecutionContext, GenesisValidator, KeyValueStore,
    RelationalStore, StakeModule, StakeResult, StoreError,
};
use shared_types::{
    Address, AppHash, Hash, Params, ParamsStore, Transaction, ValidatorUpdate, PARAM_KEY, U256,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::adapters::EngineLedger;
use crate::config::BridgeConfig;
use crate::domain::{
    BlockHeader, CompositeHasher, DigestSchedule, Lifecycle, NativeStore, Phase, RequestEndBlock,
    RequestInitChain, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInfo, ResponseInitChain, TxResponse,
};
use crate::error::{BridgeResult, TxError};
use crate::ports::{ExecutionEngine, GovernanceGateway, RetirementStatus, StateView, VoteResult};
use crate::router::{route, RoutedTx};

pub struct ConsensusBridge<E, S: RelationalStore, G> {
    chain_id: Arc<str>,
    app_version: String,
    genesis_validators: Vec<GenesisValidator>,

    engine: Arc<E>,
    store: Arc<S>,
    governance: Arc<G>,
    stake: Arc<StakeModule>,
    mempool: MempoolConnection<E, S, G>,

    native: NativeStore,
    params: ParamsStore,
    schedule: DigestSchedule,
    lifecycle: Lifecycle,
    block_tx: Option<BlockTransaction<S>>,

    block_height: u64,
    block_time: i64,
    proposer: Address,
    /// Fees of native transactions delivered in this block.
    total_used_gas_fee: U256,
    /// Engine fees plus native fees, folded in at EndBlock.
    block_gas_fee: U256,

    retiring_proposal: Option<u64>,
    to_be_shutdown: bool,
    shutdown: ShutdownSignal,

    last_height: u64,
    last_app_hash: AppHash,
}

impl<E, S, G> ConsensusBridge<E, S, G>
where
    E: ExecutionEngine,
    S: RelationalStore,
    G: GovernanceGateway,
{
    /// Build the bridge over its collaborators. Persisted params in `native`
    /// take precedence over the configured ones.
    pub fn new(
        config: BridgeConfig,
        engine: Arc<E>,
        store: Arc<S>,
        governance: Arc<G>,
        native: NativeStore,
    ) -> BridgeResult<Self> {
        let params = match native.get(PARAM_KEY) {
            Some(bytes) => ParamsStore::load(config.params.clone(), &bytes)?,
            None => ParamsStore::new(config.params.clone()),
        };
        let last_height = engine.info().last_height;
        let chain_id: Arc<str> = Arc::from(config.chain_id.as_str());
        let stake = Arc::new(StakeModule::new());

        let mempool = MempoolConnection {
            chain_id: Arc::clone(&chain_id),
            engine: Arc::clone(&engine),
            store: Arc::clone(&store),
            governance: Arc::clone(&governance),
            stake: Arc::clone(&stake),
            params: Arc::new(RwLock::new(params.get().clone())),
            clock: Arc::new(RwLock::new(BlockClock {
                height: last_height + 1,
                time: 0,
            })),
            cache: Default::default(),
        };

        info!(
            chain_id = %config.chain_id,
            version = %config.app_version,
            last_height,
            "consensus bridge initialized"
        );

        Ok(Self {
            chain_id,
            app_version: config.app_version,
            genesis_validators: config.genesis_validators,
            engine,
            store,
            governance,
            stake,
            mempool,
            native,
            params,
            schedule: DigestSchedule::with_legacy_heights(&config.legacy_digest_heights),
            lifecycle: Lifecycle::default(),
            block_tx: None,
            block_height: last_height + 1,
            block_time: 0,
            proposer: [0u8; 20],
            total_used_gas_fee: U256::zero(),
            block_gas_fee: U256::zero(),
            retiring_proposal: None,
            to_be_shutdown: false,
            shutdown: ShutdownSignal::new(),
            last_height,
            last_app_hash: [0u8; 20],
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Last committed height and composite hash.
    ///
    /// Also evaluates the retirement proposal of the running version: signals
    /// shutdown once it has executed, arms it when it expires next block, and
    /// otherwise asks governance to re-check one block before expiry.
    pub fn info(&mut self) -> BridgeResult<ResponseInfo> {
        let engine_info = self.engine.info();
        let last_height = engine_info.last_height;
        if last_height == 0 {
            return Ok(ResponseInfo {
                last_block_height: 0,
                last_block_app_hash: engine_info.app_hash.to_vec(),
                version: self.app_version.clone(),
            });
        }

        if let Some(proposal) = self.governance.retiring_proposal(&self.app_version) {
            if proposal.expire_height <= last_height {
                let status = self
                    .governance
                    .proposal(proposal.id)
                    .and_then(|p| p.status);
                if status == Some(RetirementStatus::Success) {
                    warn!(proposal = proposal.id, "running version retired, signalling shutdown");
                    self.shutdown.trigger();
                }
            } else if proposal.expire_height == last_height + 1 {
                if proposal.result == VoteResult::Approved {
                    info!(proposal = proposal.id, "retirement armed for next block");
                    self.retiring_proposal = Some(proposal.id);
                }
            } else {
                self.governance
                    .schedule_pending(proposal.id, proposal.expire_height - 1);
            }
        }

        // Relaunch right after a retirement: reproduce the old version's hash
        if self.governance.latest_retired_height() == last_height {
            self.schedule.mark_legacy(last_height);
        }

        let app_hash = self.composite_hash(&engine_info.app_hash, last_height)?;
        self.last_height = last_height;
        self.last_app_hash = app_hash;
        self.block_height = last_height + 1;
        self.mempool.clock.write().height = last_height + 1;

        Ok(ResponseInfo {
            last_block_height: last_height,
            last_block_app_hash: app_hash.to_vec(),
            version: self.app_version.clone(),
        })
    }

    /// Register genesis validators and optional genesis params.
    pub fn init_chain(&mut self, req: &RequestInitChain) -> BridgeResult<ResponseInitChain> {
        self.lifecycle.require(Phase::Idle, "init_chain")?;

        if let Some(params) = &req.params {
            self.params.replace(params.clone());
            *self.mempool.params.write() = params.clone();
        }

        let validators = if req.validators.is_empty() {
            self.genesis_validators.clone()
        } else {
            req.validators.clone()
        };
        let stake = &self.stake;
        with_autocommit(&*self.store, |tx| {
            validators
                .iter()
                .map(|genesis| stake.set_genesis_validator(tx, genesis, 0))
                .collect::<StakeResult<Vec<_>>>()
        })?;

        info!(validators = validators.len(), chain_id = %req.chain_id, "chain initialized");
        Ok(ResponseInitChain {
            validators: validators
                .iter()
                .map(|v| ValidatorUpdate::new(v.pub_key, v.power))
                .collect(),
        })
    }

    pub fn check_tx(&self, bytes: &[u8]) -> BridgeResult<ResponseCheckTx> {
        self.mempool.check_tx(bytes)
    }

    pub fn begin_block(&mut self, header: &BlockHeader) -> BridgeResult<()> {
        self.lifecycle.require(Phase::Idle, "begin_block")?;

        self.block_height = header.height;
        self.block_time = header.time;
        self.proposer = header.proposer;
        *self.mempool.clock.write() = BlockClock {
            height: header.height,
            time: header.time,
        };

        self.block_tx = Some(BlockTransaction::open(&*self.store, header.height)?);
        self.lifecycle.begin_block()?;
        self.engine.begin_block(header);

        debug!(height = header.height, time = header.time, "block opened");
        Ok(())
    }

    pub fn deliver_tx(&mut self, bytes: &[u8]) -> BridgeResult<ResponseDeliverTx> {
        self.lifecycle.require(Phase::BlockOpen, "deliver_tx")?;

        let tx = match Transaction::decode(bytes) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "DeliverTx: invalid transaction encoding");
                return Ok(TxError::Decode(e.to_string()).into());
            }
        };

        if !tx.is_native() {
            return Ok(self.deliver_engine_tx(tx));
        }

        match self.deliver_native(&tx)? {
            Ok(resp) => Ok(resp),
            Err(err) => {
                warn!(code = err.code(), error = %err, "DeliverTx: native transaction rejected");
                Ok(err.into())
            }
        }
    }

    /// Close the block: fold fees, run a due retirement, else reconcile the
    /// validator set.
    pub fn end_block(&mut self, req: &RequestEndBlock) -> BridgeResult<ResponseEndBlock> {
        self.lifecycle.require(Phase::BlockOpen, "end_block")?;

        let engine_fee = self.engine.end_block(req.height);
        self.block_gas_fee = engine_fee.saturating_add(self.total_used_gas_fee);

        let block = self
            .block_tx
            .as_mut()
            .ok_or(StoreError::NoBlockTransaction)?;
        let mut validator_updates = Vec::new();

        if let Some(id) = self.retiring_proposal.take() {
            match self.governance.proposal(id) {
                Some(proposal) => {
                    let plan = self
                        .stake
                        .retire(block.writer(), &proposal.preserved_validators)?;
                    if plan.succeeds() {
                        info!(proposal = id, survivors = plan.survivors, "retirement executed");
                        validator_updates = plan.updates;
                        self.to_be_shutdown = true;
                        self.governance
                            .update_retirement_status(id, RetirementStatus::Success);
                    } else {
                        warn!(proposal = id, "retirement rejected: no preserved validator");
                        self.governance
                            .update_retirement_status(id, RetirementStatus::Rejected);
                    }
                }
                None => error!(proposal = id, "armed retirement proposal not found"),
            }
        }

        // A retiring node must not update the validator set twice
        if !self.to_be_shutdown {
            validator_updates = self
                .stake
                .update_validator_set(block.writer(), &mut self.native)?;
        }

        debug!(
            height = req.height,
            updates = validator_updates.len(),
            block_gas_fee = %self.block_gas_fee,
            "block closed"
        );
        Ok(ResponseEndBlock { validator_updates })
    }

    pub fn commit(&mut self) -> BridgeResult<ResponseCommit> {
        self.lifecycle.start_commit()?;

        if self.to_be_shutdown {
            warn!(height = self.block_height, "shutdown flagged, signalling");
            self.shutdown.trigger();
        }
        self.mempool.clear_cache();

        let height = self.block_height;
        let block = self.block_tx.take().ok_or(StoreError::NoBlockTransaction)?;
        let engine_hash = match self.engine.commit() {
            Ok(hash) => {
                block.finalize(true)?;
                hash
            }
            Err(rejection) => {
                error!(height, code = %rejection.code, log = %rejection.log, "execution engine commit failed");
                block.finalize(false)?;
                self.native.discard();
                self.engine.info().app_hash
            }
        };

        let dirty = self.params.take_dirty();
        if dirty || height == 1 {
            self.native.set(PARAM_KEY, self.params.to_bytes()?);
            *self.mempool.params.write() = self.params.get().clone();
            debug!(height, "params flushed");
        }

        self.total_used_gas_fee = U256::zero();
        self.block_gas_fee = U256::zero();

        self.native.commit();
        let app_hash = self.composite_hash(&engine_hash, height)?;

        self.last_height = height;
        self.last_app_hash = app_hash;
        self.block_height = height + 1;
        self.mempool.clock.write().height = height + 1;
        self.lifecycle.finish_commit();

        info!(height, app_hash = %hex::encode(app_hash), "block committed");
        Ok(ResponseCommit {
            data: app_hash.to_vec(),
        })
    }

    // =========================================================================
    // Governance seam
    // =========================================================================

    /// Change a parameter by name. Deliver sees it at once, CheckTx after the
    /// next commit.
    pub fn set_param(&mut self, name: &str, value: &str) -> BridgeResult<()> {
        self.params.set(name, value)?;
        info!(name, value, "param changed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// A cloneable CheckTx handle for mempool threads.
    pub fn mempool(&self) -> MempoolConnection<E, S, G> {
        self.mempool.clone()
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn params(&self) -> &Params {
        self.params.get()
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn last_height(&self) -> u64 {
        self.last_height
    }

    pub fn last_app_hash(&self) -> AppHash {
        self.last_app_hash
    }

    pub fn block_gas_fee(&self) -> U256 {
        self.block_gas_fee
    }

    pub fn proposer(&self) -> Address {
        self.proposer
    }

    pub fn native_store(&self) -> &NativeStore {
        &self.native
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn deliver_engine_tx(&self, tx: Transaction) -> ResponseDeliverTx {
        let tx = match self.mempool.cached(&tx.hash()) {
            Some(cached) => cached,
            None => {
                // Never validated by this node's CheckTx
                if let Err(rejection) = self.engine.recover_sender(&tx) {
                    warn!(code = %rejection.code, "DeliverTx: unrecoverable engine tx sender");
                    return TxError::Validation(rejection.log).into();
                }
                tx
            }
        };
        let resp = self.engine.deliver_tx(&tx);
        debug!(code = resp.code, gas_used = resp.gas_used, "DeliverTx: engine response");
        resp
    }

    fn deliver_native(&mut self, tx: &Transaction) -> BridgeResult<Result<TxResponse, TxError>> {
        let basic = match self.engine.basic_check(StateView::Deliver, tx) {
            Ok(basic) => basic,
            Err(rejection) => return Ok(Err(TxError::Validation(rejection.log))),
        };
        let routed = match route(&tx.data) {
            Ok(routed) => routed,
            Err(err) => return Ok(Err(err)),
        };
        let ctx = ExecutionContext::new(&*self.chain_id, self.block_height, self.block_time)
            .with_signer(basic.sender, basic.nonce);

        let resp = match &routed {
            RoutedTx::Stake(stake_tx) => {
                let block = self
                    .block_tx
                    .as_mut()
                    .ok_or(StoreError::NoBlockTransaction)?;
                let mut ledger = EngineLedger::new(&*self.engine, StateView::Deliver);
                match self.stake.deliver(
                    &ctx,
                    self.params.get(),
                    block.writer(),
                    &mut self.native,
                    &mut ledger,
                    stake_tx,
                ) {
                    Ok(receipt) => TxResponse {
                        gas_used: receipt.gas_used,
                        gas_fee: receipt.gas_fee,
                        data: receipt.data,
                        ..TxResponse::ok()
                    },
                    Err(err) => return Ok(Err(TxError::from_stake(err)?)),
                }
            }
            RoutedTx::Governance { kind } => {
                match self.governance.deliver_tx(&ctx, kind, &tx.data) {
                    Ok(receipt) => TxResponse {
                        gas_used: receipt.gas_used,
                        gas_fee: receipt.gas_fee,
                        data: receipt.data,
                        ..TxResponse::ok()
                    },
                    Err(rejection) => return Ok(Err(rejection.into())),
                }
            }
        };

        self.engine
            .set_nonce(StateView::Deliver, &basic.sender, basic.nonce + 1);
        self.total_used_gas_fee = self.total_used_gas_fee.saturating_add(resp.gas_fee);
        debug!(
            kind = routed.kind(),
            gas_used = resp.gas_used,
            gas_fee = %resp.gas_fee,
            "DeliverTx: native transaction applied"
        );
        Ok(Ok(resp))
    }

    fn composite_hash(&self, engine_hash: &Hash, height: u64) -> BridgeResult<AppHash> {
        let native_hash = self.native.digest(self.schedule.select(height));
        let relational_hash = self.store.digest()?;
        Ok(CompositeHasher::combine(
            engine_hash,
            &native_hash,
            &relational_hash,
        ))
    }
}
