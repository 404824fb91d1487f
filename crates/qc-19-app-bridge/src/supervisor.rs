//! Fatal-fault handling.
//!
//! Lifecycle calls return `BridgeResult`. The supervisor is the single place
//! that turns a `BridgeFault` into process termination; a node whose storage
//! cannot be trusted must not keep answering the consensus engine.

use anyhow::Context;
use qc_18_staking::RelationalStore;
use tracing::error;

use crate::domain::{
    BlockHeader, RequestEndBlock, RequestInitChain, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseEndBlock, ResponseInfo, ResponseInitChain,
};
use crate::error::BridgeFault;
use crate::ports::{ExecutionEngine, GovernanceGateway};
use crate::service::ConsensusBridge;

pub type FatalHandler = fn(&anyhow::Error) -> !;

fn abort_process(_err: &anyhow::Error) -> ! {
    std::process::abort()
}

#[derive(Clone, Copy)]
pub struct Supervisor {
    on_fatal: FatalHandler,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            on_fatal: abort_process,
        }
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the termination action (tests install a panicking handler).
    pub fn with_handler(on_fatal: FatalHandler) -> Self {
        Self { on_fatal }
    }

    /// Unwrap `result`, terminating on a fault.
    pub fn supervise<T>(&self, call: &'static str, result: Result<T, BridgeFault>) -> T {
        match result.with_context(|| format!("{call} failed")) {
            Ok(value) => value,
            Err(err) => {
                error!(call, error = %format!("{err:#}"), "fatal bridge fault, terminating");
                (self.on_fatal)(&err)
            }
        }
    }
}

/// The bridge as the consensus engine sees it: every call answers, and a
/// fault never returns.
pub struct SupervisedBridge<E, S: RelationalStore, G> {
    bridge: ConsensusBridge<E, S, G>,
    supervisor: Supervisor,
}

impl<E, S, G> SupervisedBridge<E, S, G>
where
    E: ExecutionEngine,
    S: RelationalStore,
    G: GovernanceGateway,
{
    pub fn new(bridge: ConsensusBridge<E, S, G>, supervisor: Supervisor) -> Self {
        Self { bridge, supervisor }
    }

    pub fn info(&mut self) -> ResponseInfo {
        let result = self.bridge.info();
        self.supervisor.supervise("info", result)
    }

    pub fn init_chain(&mut self, req: &RequestInitChain) -> ResponseInitChain {
        let result = self.bridge.init_chain(req);
        self.supervisor.supervise("init_chain", result)
    }

    pub fn check_tx(&self, bytes: &[u8]) -> ResponseCheckTx {
        self.supervisor
            .supervise("check_tx", self.bridge.check_tx(bytes))
    }

    pub fn deliver_tx(&mut self, bytes: &[u8]) -> ResponseDeliverTx {
        let result = self.bridge.deliver_tx(bytes);
        self.supervisor.supervise("deliver_tx", result)
    }

    pub fn begin_block(&mut self, header: &BlockHeader) {
        let result = self.bridge.begin_block(header);
        self.supervisor.supervise("begin_block", result)
    }

    pub fn end_block(&mut self, req: &RequestEndBlock) -> ResponseEndBlock {
        let result = self.bridge.end_block(req);
        self.supervisor.supervise("end_block", result)
    }

    pub fn commit(&mut self) -> ResponseCommit {
        let result = self.bridge.commit();
        self.supervisor.supervise("commit", result)
    }

    pub fn bridge(&self) -> &ConsensusBridge<E, S, G> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut ConsensusBridge<E, S, G> {
        &mut self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_18_staking::StoreError;

    fn panic_handler(err: &anyhow::Error) -> ! {
        panic!("fatal: {err:#}")
    }

    #[test]
    fn test_passes_values_through() {
        let supervisor = Supervisor::with_handler(panic_handler);
        assert_eq!(supervisor.supervise("commit", Ok::<_, BridgeFault>(7)), 7);
    }

    #[test]
    #[should_panic(expected = "begin_block failed")]
    fn test_fault_reaches_handler() {
        let supervisor = Supervisor::with_handler(panic_handler);
        supervisor.supervise::<()>(
            "begin_block",
            Err(BridgeFault::Store(StoreError::Unavailable("db down".into()))),
        );
    }
}
