//! Simulate-alert pipeline: pick a scenario, run the worker, record the incident.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::analysis::{self, AnalysisRunner, InterpretError, InvocationError, Seed};
use crate::incident::{Incident, IncidentId};
use crate::scenario::{self, Scenario};
use crate::storage::{IncidentStore, StoreError};

/// Status given to every freshly simulated incident.
pub const INITIAL_STATUS: &str = "Open";

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the caller gets back from a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub ok: bool,
    pub incident_id: IncidentId,
    pub scenario: Scenario,
    pub engine: String,
    pub cluster_count: usize,
}

#[derive(Clone)]
pub struct Simulator {
    store: Arc<IncidentStore>,
    runner: Arc<dyn AnalysisRunner>,
}

impl Simulator {
    pub fn new(store: Arc<IncidentStore>, runner: Arc<dyn AnalysisRunner>) -> Self {
        Self { store, runner }
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        &self.store
    }

    /// Run one simulation for an optional caller-supplied scenario name.
    pub async fn simulate(&self, requested: Option<&str>) -> Result<SimulationSummary, SimulationError> {
        let scenario = scenario::select(requested, &mut rand::thread_rng());
        self.run(scenario, Seed::from_clock()).await
    }

    /// Run one simulation for a fixed scenario and seed.
    ///
    /// The worker runs outside the store lock. The store is only touched in
    /// the final load-merge-save step, so any earlier failure leaves it as is.
    pub async fn run(&self, scenario: Scenario, seed: Seed) -> Result<SimulationSummary, SimulationError> {
        let span = tracing::info_span!("simulation", run_id = %Uuid::new_v4(), %scenario, %seed);
        self.run_inner(scenario, seed).instrument(span).await
    }

    async fn run_inner(&self, scenario: Scenario, seed: Seed) -> Result<SimulationSummary, SimulationError> {
        // Fail fast on an unreadable store before paying for a worker run.
        self.store.snapshot().await?;
        info!("starting analysis worker");

        let raw = self.runner.run(scenario, seed).await.map_err(|e| {
            error!(error = %e, "analysis worker failed");
            e
        })?;
        if !raw.stderr.trim().is_empty() {
            tracing::debug!(stderr = %raw.stderr.trim(), "analysis worker stderr");
        }

        let result = analysis::interpret(&raw.stdout).map_err(|e| {
            error!(error = %e, "could not interpret analysis output");
            e
        })?;

        let engine = result.engine.clone();
        let cluster_count = result.clusters.len();

        let incident_id = self
            .store
            .transact(move |store| {
                let id = store.allocate_id()?;
                let incident = Incident {
                    id: id.clone(),
                    service: result.service,
                    severity: scenario.severity(),
                    status: INITIAL_STATUS.to_string(),
                    scenario,
                    engine: result.engine,
                    created_at: Utc::now(),
                };
                store.merge(incident, result.trend, result.clusters)?;
                Ok(id)
            })
            .await?;

        info!(incident_id = %incident_id, %engine, cluster_count, "incident recorded");

        Ok(SimulationSummary {
            ok: true,
            incident_id,
            scenario,
            engine,
            cluster_count,
        })
    }
}
