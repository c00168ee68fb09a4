use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::ActionExecutor;
use super::models::Action;
use crate::simulator::shared::{periodic, EventSink, SimEvent};

/// Picks one random action per tick and runs it in the background
pub struct ActionScheduler {
    actions: Vec<Action>,
    interval: Duration,
    executor: ActionExecutor,
    events: EventSink,
}

impl ActionScheduler {
    pub fn new(actions: Vec<Action>, interval: Duration, executor: ActionExecutor, events: EventSink) -> Self {
        Self {
            actions,
            interval,
            executor,
            events,
        }
    }

    /// Uniform pick among the configured actions
    pub fn pick_action<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Action> {
        self.actions.choose(rng).copied()
    }

    /// Spawn the action without waiting for it; the outcome goes to the event sink
    pub fn dispatch(&self, action: Action) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = executor.execute(action).await;
            events.emit(SimEvent::ActionFinished { action, result });
        })
    }

    /// One scheduler tick; a no-op when no action is enabled
    pub fn tick(&self) -> Option<JoinHandle<()>> {
        let action = self.pick_action(&mut rand::thread_rng())?;
        debug!(%action, "dispatching random action");
        Some(self.dispatch(action))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let this = &self;
        periodic(&cancel, self.interval, || {
            this.tick();
            async {}
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::config::SimulationConfig;
    use crate::simulator::network::NodeType;
    use crate::simulator::shared::test_support::{DaemonCall, FixedFile, RecordingNetwork, ScriptedDaemon};
    use crate::simulator::action_slot::ActionError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn scheduler(actions: Vec<Action>, network: Arc<RecordingNetwork>) -> (ActionScheduler, tokio::sync::mpsc::UnboundedReceiver<SimEvent>) {
        let config = SimulationConfig::default();
        let executor = ActionExecutor::new(network, Arc::new(FixedFile(PathBuf::from("f"))), &config);
        let (events, rx) = EventSink::channel();
        (ActionScheduler::new(actions, Duration::from_millis(10), executor, events), rx)
    }

    #[test]
    fn test_empty_action_set_picks_nothing() {
        let (scheduler, _rx) = scheduler(vec![], Arc::new(RecordingNetwork::new()));
        assert_eq!(scheduler.pick_action(&mut StdRng::seed_from_u64(1)), None);
    }

    #[tokio::test]
    async fn test_empty_action_set_tick_is_noop() {
        let (scheduler, _rx) = scheduler(vec![], Arc::new(RecordingNetwork::new()));
        assert!(scheduler.tick().is_none());
    }

    #[test]
    fn test_pick_is_roughly_uniform() {
        let (scheduler, _rx) = scheduler(vec![Action::Ask, Action::Bid, Action::Payment], Arc::new(RecordingNetwork::new()));
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<Action, usize> = HashMap::new();

        for _ in 0..3000 {
            *counts.entry(scheduler.pick_action(&mut rng).unwrap()).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            assert!(*count > 850 && *count < 1150, "skewed pick: {:?}", counts);
        }
    }

    #[tokio::test]
    async fn test_dispatch_reports_outcome() {
        let network = Arc::new(RecordingNetwork::with_nodes(vec![(NodeType::Miner, ScriptedDaemon::new("m1"))]));
        let (scheduler, mut rx) = scheduler(vec![Action::Ask], network.clone());

        scheduler.tick().unwrap().await.unwrap();

        match rx.recv().await {
            Some(SimEvent::ActionFinished { action: Action::Ask, result: Ok(_) }) => {}
            other => panic!("unexpected event {:?}", other),
        }
        assert!(network.daemon(0).calls().contains(&DaemonCall::CreateMinerIdentity));
    }

    #[tokio::test]
    async fn test_failed_action_is_reported_not_raised() {
        let (scheduler, mut rx) = scheduler(vec![Action::Payment], Arc::new(RecordingNetwork::new()));

        scheduler.dispatch(Action::Payment).await.unwrap();

        match rx.recv().await {
            Some(SimEvent::ActionFinished {
                action: Action::Payment,
                result: Err(ActionError::NotEnoughNodes { .. }),
            }) => {}
            other => panic!("unexpected event {:?}", other),
        }
    }
}
