use chrono::{DateTime, Utc};
use colored::Colorize;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::simulator::action_slot::Action;
use crate::simulator::shared::SimEvent;

/// Outcome counts for one action kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionTally {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ActionTally {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Statistics accumulated over a whole run
#[derive(Debug, Clone)]
pub struct SimulationStats {
    pub actions: BTreeMap<String, ActionTally>,
    pub blocks_mined: usize,
    pub mining_failures: usize,
    pub nodes_added: usize,
    pub node_failures: usize,
    pub connections: usize,
    pub connect_failures: usize,
    pub started_at: DateTime<Utc>,
}

impl Default for SimulationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationStats {
    pub fn new() -> Self {
        Self {
            actions: Action::ALL.iter().map(|action| (action.to_string(), ActionTally::default())).collect(),
            blocks_mined: 0,
            mining_failures: 0,
            nodes_added: 0,
            node_failures: 0,
            connections: 0,
            connect_failures: 0,
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, event: &SimEvent) {
        match event {
            SimEvent::NodeAdded { .. } => self.nodes_added += 1,
            SimEvent::NodeAddFailed { .. } => self.node_failures += 1,
            SimEvent::PeersConnected { .. } => self.connections += 1,
            SimEvent::ConnectFailed { .. } => self.connect_failures += 1,
            SimEvent::BlockMined { .. } => self.blocks_mined += 1,
            SimEvent::MiningFailed { .. } => self.mining_failures += 1,
            SimEvent::ActionFinished { action, result } => {
                let tally = self.actions.entry(action.to_string()).or_default();
                match result {
                    Ok(_) => tally.completed += 1,
                    Err(e) if e.is_skip() => tally.skipped += 1,
                    Err(_) => tally.failed += 1,
                }
            }
        }
    }

    pub fn tally(&self, action: Action) -> ActionTally {
        self.actions.get(&action.to_string()).copied().unwrap_or_default()
    }

    pub fn total_actions(&self) -> usize {
        self.actions.values().map(ActionTally::total).sum()
    }

    /// Percentage of finished actions that completed
    pub fn success_rate(&self) -> f64 {
        let total = self.total_actions();
        if total == 0 {
            return 0.0;
        }
        let completed: usize = self.actions.values().map(|tally| tally.completed).sum();
        (completed as f64 / total as f64) * 100.0
    }

    pub fn print_summary(&self) {
        let elapsed = Utc::now() - self.started_at;
        let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;

        println!("\n{}", "=".repeat(70));
        println!("{}", "SIMULATION SUMMARY".bold());
        println!("{}", "=".repeat(70));
        println!("Nodes added: {} ({} failed)", self.nodes_added.to_string().green(), self.node_failures);
        println!("Connections: {} ({} failed)", self.connections, self.connect_failures);
        println!(
            "Blocks mined: {} ({} failed)",
            self.blocks_mined.to_string().green(),
            self.mining_failures
        );
        println!("Actions: {} ({:.1}% completed)", self.total_actions(), self.success_rate());
        for (action, tally) in &self.actions {
            println!(
                "  {:<8} {} completed, {} skipped, {} failed",
                action,
                tally.completed.to_string().green(),
                tally.skipped.to_string().yellow(),
                tally.failed.to_string().red()
            );
        }
        println!("Elapsed time: {:.2}s", elapsed_secs);
        println!("{}", "=".repeat(70));
    }
}

/// Consumes the engine's event channel, logs every event and keeps score
pub struct SimulationReporter {
    rx: UnboundedReceiver<SimEvent>,
    stats: SimulationStats,
}

impl SimulationReporter {
    pub fn new(rx: UnboundedReceiver<SimEvent>) -> Self {
        Self {
            rx,
            stats: SimulationStats::new(),
        }
    }

    /// Drain until every sender is gone, then hand back the totals
    pub async fn run(mut self) -> SimulationStats {
        while let Some(event) = self.rx.recv().await {
            log_event(&event);
            self.stats.record(&event);
        }
        self.stats
    }
}

fn log_event(event: &SimEvent) {
    match event {
        SimEvent::NodeAdded { id, node_type } => info!(node = id, %node_type, "node joined"),
        SimEvent::NodeAddFailed { node_type, error } => warn!(%node_type, %error, "failed to start node"),
        SimEvent::PeersConnected { a, b } => debug!(a, b, "peers connected"),
        SimEvent::ConnectFailed { a, b, error } => warn!(a, b, %error, "failed to connect peers"),
        SimEvent::BlockMined { epoch, node } => info!(epoch, node, "block mined"),
        SimEvent::MiningFailed { epoch, node, error } => warn!(epoch, node, %error, "mining failed"),
        SimEvent::ActionFinished { action, result } => match result {
            Ok(outcome) => info!(%action, %outcome, "action completed"),
            Err(e) if e.is_skip() => debug!(%action, reason = %e, "action skipped"),
            Err(e) => warn!(%action, error = %e, "action failed"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::action_slot::ActionError;
    use crate::simulator::network::NodeType;
    use crate::simulator::shared::EventSink;
    use anyhow::anyhow;

    #[test]
    fn test_record_classifies_action_outcomes() {
        let mut stats = SimulationStats::new();
        stats.record(&SimEvent::ActionFinished {
            action: Action::Payment,
            result: Ok("sent".to_string()),
        });
        stats.record(&SimEvent::ActionFinished {
            action: Action::Payment,
            result: Err(ActionError::NotEnoughNodes { needed: 2, found: 1 }),
        });
        stats.record(&SimEvent::ActionFinished {
            action: Action::Ask,
            result: Err(ActionError::daemon("submit ask", anyhow!("daemon down"))),
        });

        assert_eq!(
            stats.tally(Action::Payment),
            ActionTally {
                completed: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(stats.tally(Action::Ask).failed, 1);
        assert_eq!(stats.tally(Action::Deal), ActionTally::default());
        assert_eq!(stats.total_actions(), 3);
        assert!((stats.success_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate_with_no_actions() {
        assert_eq!(SimulationStats::new().success_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_reporter_drains_until_senders_drop() {
        let (events, rx) = EventSink::channel();
        let reporter = tokio::spawn(SimulationReporter::new(rx).run());

        events.emit(SimEvent::NodeAdded { id: 0, node_type: NodeType::Miner });
        events.emit(SimEvent::NodeAdded { id: 1, node_type: NodeType::Client });
        events.emit(SimEvent::PeersConnected { a: 0, b: 1 });
        events.emit(SimEvent::BlockMined { epoch: 0, node: 0 });
        events.emit(SimEvent::MiningFailed {
            epoch: 1,
            node: 0,
            error: "boom".to_string(),
        });
        let clone = events.clone();
        drop(events);
        clone.emit(SimEvent::NodeAddFailed {
            node_type: NodeType::Any,
            error: "no binary".to_string(),
        });
        drop(clone);

        let stats = reporter.await.unwrap();
        assert_eq!(stats.nodes_added, 2);
        assert_eq!(stats.node_failures, 1);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.blocks_mined, 1);
        assert_eq!(stats.mining_failures, 1);
    }
}
