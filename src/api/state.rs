use std::sync::Arc;

use crate::simulate::Simulator;
use crate::storage::IncidentStore;

#[derive(Clone)]
pub struct AppState {
    pub simulator: Simulator,
}

impl AppState {
    pub fn new(simulator: Simulator) -> Self {
        Self { simulator }
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        self.simulator.store()
    }
}
