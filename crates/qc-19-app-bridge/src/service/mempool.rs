//! CheckTx connection.
//!
//! Cloneable and shareable across threads. It reads only committed views (the
//! relational snapshot, the committed params, the engine's check state) and
//! never touches the block's relational transaction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use qc_18_staking::{ExecutionContext, RelationalStore, StakeModule};
use shared_types::{Hash, Params, Transaction};
use tracing::{debug, warn};

use crate::adapters::EngineLedger;
use crate::domain::{ResponseCheckTx, TxResponse};
use crate::error::{BridgeResult, TxError};
use crate::ports::{ExecutionEngine, GovernanceGateway, StateView};
use crate::router::{route, RoutedTx};

/// Height and time of the block currently being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockClock {
    pub height: u64,
    pub time: i64,
}

pub struct MempoolConnection<E, S, G> {
    pub(crate) chain_id: Arc<str>,
    pub(crate) engine: Arc<E>,
    pub(crate) store: Arc<S>,
    pub(crate) governance: Arc<G>,
    pub(crate) stake: Arc<StakeModule>,
    pub(crate) params: Arc<RwLock<Params>>,
    pub(crate) clock: Arc<RwLock<BlockClock>>,
    pub(crate) cache: Arc<RwLock<HashMap<Hash, Transaction>>>,
}

impl<E, S, G> Clone for MempoolConnection<E, S, G> {
    fn clone(&self) -> Self {
        Self {
            chain_id: Arc::clone(&self.chain_id),
            engine: Arc::clone(&self.engine),
            store: Arc::clone(&self.store),
            governance: Arc::clone(&self.governance),
            stake: Arc::clone(&self.stake),
            params: Arc::clone(&self.params),
            clock: Arc::clone(&self.clock),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<E, S, G> MempoolConnection<E, S, G>
where
    E: ExecutionEngine,
    S: RelationalStore,
    G: GovernanceGateway,
{
    /// Validate a transaction for mempool admission.
    ///
    /// Per-transaction failures become the response code. Only store faults
    /// are returned as errors.
    pub fn check_tx(&self, bytes: &[u8]) -> BridgeResult<ResponseCheckTx> {
        let tx = match Transaction::decode(bytes) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "CheckTx: invalid transaction encoding");
                return Ok(TxError::Decode(e.to_string()).into());
            }
        };

        if !tx.is_native() {
            let resp = self.engine.check_tx(&tx);
            debug!(code = resp.code, "CheckTx: engine response");
            if resp.is_ok() {
                self.cache.write().insert(tx.hash(), tx);
            }
            return Ok(resp);
        }

        match self.check_native(&tx)? {
            Ok(()) => Ok(TxResponse::ok()),
            Err(err) => {
                warn!(code = err.code(), error = %err, "CheckTx: native transaction rejected");
                Ok(err.into())
            }
        }
    }

    fn check_native(&self, tx: &Transaction) -> BridgeResult<Result<(), TxError>> {
        let basic = match self.engine.basic_check(StateView::Check, tx) {
            Ok(basic) => basic,
            Err(rejection) => return Ok(Err(TxError::Validation(rejection.log))),
        };
        let routed = match route(&tx.data) {
            Ok(routed) => routed,
            Err(err) => return Ok(Err(err)),
        };

        let clock = *self.clock.read();
        let ctx = ExecutionContext::new(&*self.chain_id, clock.height, clock.time)
            .with_signer(basic.sender, basic.nonce);

        let outcome = match &routed {
            RoutedTx::Stake(stake_tx) => {
                let snapshot = self.store.snapshot()?;
                let params = self.params.read().clone();
                let ledger = EngineLedger::new(&*self.engine, StateView::Check);
                match self
                    .stake
                    .check(&ctx, &params, &snapshot, &ledger, stake_tx)
                {
                    Ok(()) => Ok(()),
                    Err(err) => Err(TxError::from_stake(err)?),
                }
            }
            RoutedTx::Governance { kind } => self
                .governance
                .check_tx(&ctx, kind, &tx.data)
                .map_err(TxError::from),
        };

        if outcome.is_ok() {
            self.engine
                .set_nonce(StateView::Check, &basic.sender, basic.nonce + 1);
            debug!(kind = routed.kind(), "CheckTx: native transaction accepted");
        }
        Ok(outcome)
    }

    /// The validated transaction cached under `hash`, if any.
    pub fn cached(&self, hash: &Hash) -> Option<Transaction> {
        self.cache.read().get(hash).cloned()
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }
}
