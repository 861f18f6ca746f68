//! Execution Operator
//!
//! Entry point for running flows: instantiates executions, fires actions
//! through the handler pipeline and answers state queries.
//!
//! The operator holds no locks of its own. Fires against different
//! executions may run concurrently; callers must serialize fires against
//! the same execution.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use super::context::{FireResult, StepContext, StepData};
use super::model::Execution;
use super::pipeline::{AllowAll, Authorizer, FireOutcome, Pipeline};
use super::progress::ExecutionRecord;
use crate::activity::ActivityResolver;
use crate::config::EngineConfig;
use crate::error::FlowError;
use crate::flow::{Flow, State};
use crate::storage::{ExecutionQuery, ExecutionRepository, FlowQuery, FlowRepository};

/// Runs executions of stored flows.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use flowrunner::activity::ActivityResolver;
/// use flowrunner::config::EngineConfig;
/// use flowrunner::execution::FlowOperator;
/// use flowrunner::flow::{FlowBuilder, State};
/// use flowrunner::storage::{InMemoryExecutionRepository, InMemoryFlowRepository};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let flow = FlowBuilder::new("approval")
///     .state(State::new(1, "Approved"))
///     .initial(|s| s.for_state(State::new(0, "Draft")).allow(State::new(1, "Approved"), 1))
///     .build()?;
///
/// let operator = FlowOperator::new(
///     Arc::new(InMemoryFlowRepository::new()),
///     Arc::new(InMemoryExecutionRepository::new()),
///     Arc::new(ActivityResolver::default()),
///     &EngineConfig::default(),
/// );
///
/// let execution = operator.instantiate(&flow).await?;
/// let result = operator.fire(execution.id, 1, None).await;
/// assert!(result.is_completed());
/// # Ok(())
/// # }
/// ```
pub struct FlowOperator {
    flows: Arc<dyn FlowRepository>,
    executions: Arc<dyn ExecutionRepository>,
    resolver: Arc<ActivityResolver>,
    pipeline: Pipeline,
    max_depth: usize,
}

impl FlowOperator {
    pub fn new(
        flows: Arc<dyn FlowRepository>,
        executions: Arc<dyn ExecutionRepository>,
        resolver: Arc<ActivityResolver>,
        config: &EngineConfig,
    ) -> Self {
        let max_depth = config.progress_max_depth;
        let pipeline = Pipeline::standard(
            Arc::new(AllowAll),
            Arc::clone(&resolver),
            Arc::clone(&executions),
            max_depth,
        );

        Self {
            flows,
            executions,
            resolver,
            pipeline,
            max_depth,
        }
    }

    /// Replaces the authorizer consulted by the first pipeline stage.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.pipeline = Pipeline::standard(
            authorizer,
            Arc::clone(&self.resolver),
            Arc::clone(&self.executions),
            self.max_depth,
        );
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn resolver(&self) -> &ActivityResolver {
        &self.resolver
    }

    /// Stores a flow definition so executions can find it.
    pub async fn register(&self, flow: Flow) -> Result<Arc<Flow>, FlowError> {
        let flow = Arc::new(flow);
        self.flows.save(Arc::clone(&flow)).await?;
        info!("Registered flow '{}' ({})", flow.key(), flow.id());
        Ok(flow)
    }

    /// Starts an execution of `flow`, registering the flow if needed.
    pub async fn instantiate(&self, flow: &Flow) -> Result<Execution, FlowError> {
        if self.flows.get(FlowQuery::by_id(flow.id())).await?.is_empty() {
            self.register(flow.clone()).await?;
        }
        self.start(Execution::new(flow)).await
    }

    /// Starts an execution of the flow stored under `key`.
    pub async fn instantiate_by_key(&self, key: &str) -> Result<Execution, FlowError> {
        let flow = self.flow_by_key(key).await?;
        self.start(Execution::new(&flow)).await
    }

    async fn start(&self, execution: Execution) -> Result<Execution, FlowError> {
        self.save(&execution).await?;
        info!(
            "Instantiated execution {} at '{}'",
            execution.id,
            execution.state().map(|s| s.name.as_str()).unwrap_or_default()
        );
        Ok(execution)
    }

    /// Fires `action` on the stored execution `id`.
    pub async fn fire(&self, id: Uuid, action: i32, data: Option<StepData>) -> FireResult {
        let execution = match self.execution(id).await {
            Ok(execution) => execution,
            Err(e) => return FireResult::failed(&e),
        };
        self.run(execution, action, data).await.result
    }

    /// Fires `action` on a caller-held execution. On success the execution
    /// is replaced by its advanced copy; on failure it is left untouched.
    pub async fn fire_execution(&self, execution: &mut Execution, action: i32, data: Option<StepData>) -> FireResult {
        let outcome = self.run(execution.clone(), action, data).await;
        if let Some(advanced) = outcome.execution {
            *execution = advanced;
        }
        outcome.result
    }

    /// Fires `action` on the execution of flow `key` in `scope`, starting
    /// one if the scope has none.
    pub async fn fire_scoped(&self, key: &str, scope: Option<&str>, action: i32, data: Option<StepData>) -> FireResult {
        let execution = match self.current(key, scope).await {
            Ok(execution) => execution,
            Err(e) => return FireResult::failed(&e),
        };
        self.run(execution, action, data).await.result
    }

    /// Current state of the execution of flow `key` in `scope`, starting
    /// one if the scope has none.
    pub async fn state(&self, key: &str, scope: Option<&str>) -> Result<State, FlowError> {
        let execution = self.current(key, scope).await?;
        execution
            .state()
            .cloned()
            .ok_or_else(|| FlowError::Fault(format!("Execution {} has no steps", execution.id)))
    }

    /// Loads a stored execution.
    pub async fn execution(&self, id: Uuid) -> Result<Execution, FlowError> {
        let record = self
            .executions
            .get(ExecutionQuery::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(format!("Execution {}", id)))?;

        Ok(record.restore(self.max_depth)?)
    }

    /// Pauses an execution. Fires fail until it is resumed.
    pub async fn suspend(&self, id: Uuid) -> Result<Execution, FlowError> {
        let mut execution = self.execution(id).await?;
        execution.suspend()?;
        self.save(&execution).await?;
        info!("Suspended execution {}", id);
        Ok(execution)
    }

    pub async fn resume(&self, id: Uuid) -> Result<Execution, FlowError> {
        let mut execution = self.execution(id).await?;
        execution.resume()?;
        self.save(&execution).await?;
        info!("Resumed execution {}", id);
        Ok(execution)
    }

    /// Compensates a fire of `action` by walking the pipeline backward.
    /// Always ends failed; the message tells whether compensation finished.
    pub async fn roll_back(&self, id: Uuid, action: i32, data: Option<StepData>) -> FireResult {
        let context = match self.prepare(id, action, data).await {
            Ok(context) => context,
            Err(e) => return FireResult::failed(&e),
        };
        info!("Rolling back action {} on execution {}", action, id);
        self.pipeline.roll_back(context).await
    }

    async fn prepare(&self, id: Uuid, action: i32, data: Option<StepData>) -> Result<StepContext, FlowError> {
        let execution = self.execution(id).await?;
        let flow = self.flow_by_id(execution.flow_id).await?;
        StepContext::new(flow, execution, action, data.unwrap_or_default())
    }

    async fn run(&self, execution: Execution, action: i32, data: Option<StepData>) -> FireOutcome {
        debug!("Firing action {} on execution {}", action, execution.id);

        let flow = match self.flow_by_id(execution.flow_id).await {
            Ok(flow) => flow,
            Err(e) => return FireOutcome::failed(&e),
        };

        match StepContext::new(flow, execution, action, data.unwrap_or_default()) {
            Ok(context) => self.pipeline.fire(context).await,
            Err(e) => {
                debug!("Action {} rejected: {}", action, e);
                FireOutcome::failed(&e)
            }
        }
    }

    /// Latest execution of flow `key` in `scope`, or a new one.
    async fn current(&self, key: &str, scope: Option<&str>) -> Result<Execution, FlowError> {
        let flow = self.flow_by_key(key).await?;

        let latest = self
            .executions
            .get(ExecutionQuery::by_flow(flow.id()))
            .await?
            .into_iter()
            .filter(|record| record.scope.as_deref() == scope)
            .max_by_key(|record| record.created_on);

        match latest {
            Some(record) => Ok(record.restore(self.max_depth)?),
            None => {
                let execution = Execution::new(&flow);
                let execution = match scope {
                    Some(scope) => execution.with_scope(scope),
                    None => execution,
                };
                self.start(execution).await
            }
        }
    }

    async fn save(&self, execution: &Execution) -> Result<(), FlowError> {
        let record = ExecutionRecord::capture(execution, self.max_depth)?;
        self.executions.save(record).await?;
        Ok(())
    }

    /// Most recently saved flow under `key`.
    async fn flow_by_key(&self, key: &str) -> Result<Arc<Flow>, FlowError> {
        self.flows
            .get(FlowQuery::by_key(key))
            .await?
            .pop()
            .ok_or_else(|| FlowError::NotFound(format!("Flow '{}'", key)))
    }

    async fn flow_by_id(&self, id: Uuid) -> Result<Arc<Flow>, FlowError> {
        self.flows
            .get(FlowQuery::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(format!("Flow {}", id)))
    }
}
