//! Balance access for the staking module over one engine state view.

use qc_18_staking::{BalanceLedger, BalanceReader};
use shared_types::{Address, U256};

use crate::ports::{ExecutionEngine, StateView};

pub struct EngineLedger<'a, E: ?Sized> {
    engine: &'a E,
    view: StateView,
}

impl<'a, E: ExecutionEngine + ?Sized> EngineLedger<'a, E> {
    pub fn new(engine: &'a E, view: StateView) -> Self {
        Self { engine, view }
    }
}

impl<E: ExecutionEngine + ?Sized> BalanceReader for EngineLedger<'_, E> {
    fn balance(&self, address: &Address) -> U256 {
        self.engine.balance(self.view, address)
    }
}

impl<E: ExecutionEngine + ?Sized> BalanceLedger for EngineLedger<'_, E> {
    fn sub_balance(&mut self, address: &Address, amount: U256) {
        self.engine.sub_balance(self.view, address, amount);
    }

    fn add_balance(&mut self, address: &Address, amount: U256) {
        self.engine.add_balance(self.view, address, amount);
    }
}
