//! The Progress Bus (spec.md §4.5): a typed channel of `StageEvent`s keyed
//! by deployment id, delivered FIFO to subscribers. Enforces the per-stage
//! state machine and rejects out-of-order transitions.
//!
//! Grounded on `web_service::services::event_broadcaster::EventBroadcaster`
//! (subscriber map keyed by id, broadcast drops dead senders) generalized
//! from SSE `sse::Event` to the typed `StageEvent` and with the state
//! machine check moved into the bus itself rather than left to callers.

use dashmap::DashMap;
use deploy_core::{DeployError, DeploymentId, StageEvent, StageState, StageTag};
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};

const CHANNEL_CAPACITY: usize = 256;

struct DeploymentChannel {
    subscribers: Vec<mpsc::Sender<StageEvent>>,
    last_state: HashMap<StageTag, StageState>,
    next_sequence: u64,
}

impl DeploymentChannel {
    fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            last_state: HashMap::new(),
            next_sequence: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct ProgressBus {
    deployments: std::sync::Arc<DashMap<DeploymentId, Mutex<DeploymentChannel>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to all StageEvents for a deployment. Delivery order is
    /// FIFO per subscriber (spec.md §4.5).
    pub async fn subscribe(&self, deployment_id: DeploymentId) -> mpsc::Receiver<StageEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let entry = self
            .deployments
            .entry(deployment_id)
            .or_insert_with(|| Mutex::new(DeploymentChannel::new()));
        let mut channel = entry.lock().await;
        channel.subscribers.push(tx);
        rx
    }

    /// Publish a stage transition. Rejects transitions that violate the
    /// per-stage state machine (spec.md §3, §8.4): started → (in-progress)*
    /// → {complete | failed}, no regressions.
    pub async fn publish(
        &self,
        deployment_id: DeploymentId,
        stage: StageTag,
        state: StageState,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Result<(), DeployError> {
        let entry = self
            .deployments
            .entry(deployment_id)
            .or_insert_with(|| Mutex::new(DeploymentChannel::new()));
        let mut channel = entry.lock().await;

        if let Some(&prev) = channel.last_state.get(&stage) {
            if !prev.can_transition_to(state) {
                return Err(DeployError::Validation(format!(
                    "illegal stage transition for {:?}: {:?} -> {:?}",
                    stage, prev, state
                )));
            }
        } else if state != StageState::Started {
            return Err(DeployError::Validation(format!(
                "stage {:?} must start with Started, got {:?}",
                stage, state
            )));
        }
        channel.last_state.insert(stage, state);

        let sequence = channel.next_sequence;
        channel.next_sequence += 1;

        let event = StageEvent {
            deployment_id,
            stage,
            state,
            message: message.into(),
            details,
            sequence,
        };

        channel.subscribers.retain_mut(|tx| tx.try_send(event.clone()).is_ok());
        if channel.subscribers.is_empty() {
            tracing::debug!(deployment_id = %deployment_id, "progress bus: no subscribers for event");
        }
        Ok(())
    }

    /// Drop bookkeeping for a finished deployment so the map doesn't grow
    /// without bound across a long-running process.
    pub fn retire(&self, deployment_id: DeploymentId) {
        self.deployments.remove(&deployment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_strictly_increase() {
        let bus = ProgressBus::new();
        let deployment_id = DeploymentId::new();
        let mut rx = bus.subscribe(deployment_id).await;

        bus.publish(deployment_id, StageTag::RepoClone, StageState::Started, "starting", None)
            .await
            .unwrap();
        bus.publish(deployment_id, StageTag::RepoClone, StageState::Complete, "done", None)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.sequence > first.sequence);
    }

    #[tokio::test]
    async fn rejects_complete_after_failed() {
        let bus = ProgressBus::new();
        let deployment_id = DeploymentId::new();
        bus.publish(deployment_id, StageTag::ContainerBuild, StageState::Started, "s", None)
            .await
            .unwrap();
        bus.publish(deployment_id, StageTag::ContainerBuild, StageState::Failed, "f", None)
            .await
            .unwrap();
        let result = bus
            .publish(deployment_id, StageTag::ContainerBuild, StageState::Complete, "c", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_started_twice() {
        let bus = ProgressBus::new();
        let deployment_id = DeploymentId::new();
        bus.publish(deployment_id, StageTag::HealthVerification, StageState::Started, "s", None)
            .await
            .unwrap();
        let result = bus
            .publish(deployment_id, StageTag::HealthVerification, StageState::Started, "s2", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dead_subscribers_are_dropped_silently() {
        let bus = ProgressBus::new();
        let deployment_id = DeploymentId::new();
        {
            let _rx = bus.subscribe(deployment_id).await;
            // rx dropped here
        }
        let result = bus
            .publish(deployment_id, StageTag::CodeAnalysis, StageState::Started, "s", None)
            .await;
        assert!(result.is_ok());
    }
}
