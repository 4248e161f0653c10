//! Fluent builder for constructing a [`Sim`].

use ts_core::{CancelToken, Tick};
use ts_vehicle::VehicleState;

use crate::executor::executor_for;
use crate::{Scenario, Sim, SimError, SimResult, StepExecutor, VehicleContainer};

/// Fluent builder for [`Sim`].
///
/// # Optional inputs (have defaults)
///
/// | Method              | Default                                        |
/// |---------------------|------------------------------------------------|
/// | `.executor(e)`      | chosen from `config.multi_threading`           |
/// | `.cancel_token(t)`  | a token nobody cancels                         |
///
/// # Example
///
/// ```rust,ignore
/// let mut scenario = Scenario::random(config, graph, 50);
/// ScenarioBuilder::default().prepare(&mut scenario)?;
/// let mut sim = SimBuilder::new(scenario).build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    scenario: Scenario,
    executor: Option<Box<dyn StepExecutor>>,
    cancel:   CancelToken,
}

impl SimBuilder {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario, executor: None, cancel: CancelToken::new() }
    }

    /// Override the executor the config would pick.
    pub fn executor(mut self, executor: Box<dyn StepExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate inputs and return a [`Sim`] positioned at tick zero.
    pub fn build(self) -> SimResult<Sim> {
        if !self.scenario.is_prepared() {
            return Err(SimError::NotPrepared);
        }
        let config = self.scenario.config();
        config.validate()?;

        let executor = match self.executor {
            Some(e) => e,
            None => executor_for(&config.multi_threading)?,
        };

        let mut container = VehicleContainer::new();
        for v in self.scenario.vehicles() {
            if v.state() != VehicleState::NotSpawned {
                return Err(SimError::Config(format!(
                    "{} is {} before the first tick; reset the scenario first",
                    v.id(),
                    v.state()
                )));
            }
            container.insert(v.id());
        }

        log::info!(
            "sim ready: {} vehicles, {} nodes, {} edges, {} executor with {} thread(s)",
            container.len(),
            self.scenario.graph().node_count(),
            self.scenario.graph().edge_count(),
            executor.name(),
            executor.n_threads(),
        );

        Ok(Sim {
            scenario: self.scenario,
            container,
            executor,
            cancel: self.cancel,
            tick: Tick::ZERO,
            phase: 0,
        })
    }
}
