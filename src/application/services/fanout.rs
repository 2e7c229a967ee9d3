//! Per-node fan-out
//!
//! Runs the same command once per node on a bounded worker pool. Nodes are
//! independent: one node failing never stops the others, and nothing is retried.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Node, NodeOutcome};
use crate::infrastructure::traits::NodeRunner;

/// Scatter a command over nodes, gather every outcome.
pub struct FanOutService {
    runner: Arc<dyn NodeRunner>,
    pool: ThreadPool,
}

impl FanOutService {
    /// Create a fan-out service with at most `max_concurrency` concurrent nodes.
    pub fn new(runner: Arc<dyn NodeRunner>, max_concurrency: usize) -> ApplicationResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_concurrency.max(1))
            .thread_name(|i| format!("berkflow-node-{i}"))
            .build()
            .map_err(|e| ApplicationError::OperationFailed {
                context: "build fan-out worker pool".into(),
                source: Box::new(e),
            })?;
        Ok(Self { runner, pool })
    }

    /// Run `command` on every node's public hostname.
    ///
    /// Returns one outcome per node, in the order of `nodes`.
    pub fn run(&self, nodes: &[Node], command: &str, sudo: bool) -> Vec<NodeOutcome> {
        debug!(
            "run: {} nodes, command={:?}, sudo={}, threads={}",
            nodes.len(),
            command,
            sudo,
            self.pool.current_num_threads()
        );
        if nodes.is_empty() {
            return Vec::new();
        }

        self.pool.install(|| {
            nodes
                .par_iter()
                .map(|node| self.runner.run(&node.public_hostname, command, sudo))
                .collect()
        })
    }
}
