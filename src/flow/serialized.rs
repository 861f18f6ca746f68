//! Serialized Flow Definitions
//!
//! JSON format exchanged with external flow designers. Documents are
//! translated into the same [`FlowBuilder`] calls an in-code definition
//! makes, so both paths share validation.
//!
//! Activity hooks are stored by name and resolved through the
//! [`ActivityResolver`] while building. Transition conditions are code and
//! have no serialized form.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use super::builder::{FlowBuilder, StepBuilder};
use super::model::{ActivityRef, Flow, State, Step};
use super::validator::unique_states;
use crate::activity::ActivityResolver;
use crate::config::ResolutionPolicy;
use crate::error::DefinitionError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFlow {
    /// Fixed flow id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub key: String,
    pub states: Vec<SerializedState>,
    pub initial: SerializedStep,
    #[serde(default)]
    pub steps: Vec<SerializedStep>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SerializedState {
    pub code: i32,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SerializedStep {
    pub from_state_code: i32,
    #[serde(default)]
    pub allows: Vec<SerializedAllow>,
    #[serde(default)]
    pub on_entry: Option<SerializedActivity>,
    #[serde(default)]
    pub on_exit: Option<SerializedActivity>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAllow {
    pub allowed_state_code: i32,
    pub trigger_code: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SerializedActivity {
    pub actor_name: String,
}

impl SerializedFlow {
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(json).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DefinitionError> {
        serde_json::to_string_pretty(self).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }

    /// Builds the flow, resolving hooks by name.
    ///
    /// Under [`ResolutionPolicy::Lenient`] an unresolvable hook is dropped
    /// with a warning; under [`ResolutionPolicy::Strict`] it fails the build.
    pub async fn build(&self, resolver: &ActivityResolver, policy: ResolutionPolicy) -> Result<Flow, DefinitionError> {
        let declared: Vec<State> = self
            .states
            .iter()
            .map(|s| State::new(s.code, s.name.as_str()))
            .collect();
        unique_states(&declared)?;

        let states: HashMap<i32, State> = declared.iter().map(|s| (s.code, s.clone())).collect();
        let mut builder = FlowBuilder::new(self.key.as_str());
        if let Some(id) = self.id {
            builder = builder.with_id(id);
        }
        for state in declared {
            builder = builder.state(state);
        }

        let initial = step_builder(&self.initial, &states, resolver, policy).await?;
        builder = builder.initial(move |_| initial);

        for step in &self.steps {
            let spec = step_builder(step, &states, resolver, policy).await?;
            builder = builder.new_step(move |_| spec);
        }

        builder.build()
    }
}

fn lookup(states: &HashMap<i32, State>, code: i32) -> Result<State, DefinitionError> {
    states
        .get(&code)
        .cloned()
        .ok_or(DefinitionError::UnknownStateCode(code))
}

async fn step_builder(
    step: &SerializedStep,
    states: &HashMap<i32, State>,
    resolver: &ActivityResolver,
    policy: ResolutionPolicy,
) -> Result<StepBuilder, DefinitionError> {
    let mut spec = StepBuilder::new().for_state(lookup(states, step.from_state_code)?);

    for allow in &step.allows {
        spec = spec.allow(lookup(states, allow.allowed_state_code)?, allow.trigger_code);
    }

    if let Some(hook) = resolve_hook(step.on_entry.as_ref(), resolver, policy).await? {
        spec = spec.on_entry_ref(hook);
    }
    if let Some(hook) = resolve_hook(step.on_exit.as_ref(), resolver, policy).await? {
        spec = spec.on_exit_ref(hook);
    }

    Ok(spec)
}

async fn resolve_hook(
    activity: Option<&SerializedActivity>,
    resolver: &ActivityResolver,
    policy: ResolutionPolicy,
) -> Result<Option<ActivityRef>, DefinitionError> {
    let Some(activity) = activity else {
        return Ok(None);
    };
    let name = activity.actor_name.trim();

    match resolver.resolve(name).await {
        Ok(instance) => {
            debug!("Resolved hook activity '{}'", name);
            Ok(Some(ActivityRef::resolved_as(name, instance)))
        }
        Err(e) => match policy {
            ResolutionPolicy::Lenient => {
                warn!("Dropping hook '{}': {}", name, e);
                Ok(None)
            }
            ResolutionPolicy::Strict => Err(DefinitionError::UnresolvedActivity {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        },
    }
}

impl From<&Step> for SerializedStep {
    fn from(step: &Step) -> Self {
        let activity = |hook: &Option<ActivityRef>| {
            hook.as_ref().map(|h| SerializedActivity {
                actor_name: h.name.clone(),
            })
        };

        Self {
            from_state_code: step.state.code,
            allows: step
                .allowed
                .iter()
                .map(|t| SerializedAllow {
                    allowed_state_code: t.to.code,
                    trigger_code: t.trigger,
                })
                .collect(),
            on_entry: activity(&step.on_entry),
            on_exit: activity(&step.on_exit),
        }
    }
}

impl From<&Flow> for SerializedFlow {
    fn from(flow: &Flow) -> Self {
        let initial = flow.initial().state.code;

        Self {
            id: Some(flow.id()),
            key: flow.key().to_string(),
            states: flow
                .states()
                .iter()
                .map(|s| SerializedState {
                    code: s.code,
                    name: s.name.clone(),
                })
                .collect(),
            initial: SerializedStep::from(flow.initial()),
            steps: flow
                .steps()
                .iter()
                .filter(|s| s.state.code != initial)
                .map(SerializedStep::from)
                .collect(),
        }
    }
}

/// Loads and builds a flow document.
pub async fn load_flow<P: AsRef<Path>>(
    path: P,
    resolver: &ActivityResolver,
    policy: ResolutionPolicy,
) -> Result<Flow, DefinitionError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).await.map_err(|e| DefinitionError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let flow = SerializedFlow::from_json(&content)?.build(resolver, policy).await?;
    info!("Loaded flow '{}' from {}", flow.key(), path.display());
    Ok(flow)
}

/// Writes a flow as a JSON document.
pub async fn save_flow<P: AsRef<Path>>(flow: &Flow, path: P) -> Result<(), DefinitionError> {
    let path = path.as_ref();
    let json = SerializedFlow::from(flow).to_json()?;

    fs::write(path, json).await.map_err(|e| DefinitionError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    info!("Saved flow '{}' to {}", flow.key(), path.display());
    Ok(())
}
