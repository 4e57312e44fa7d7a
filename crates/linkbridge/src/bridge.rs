//! # Thread Bridge
//!
//! Runs one registered task on a fresh worker thread and returns its result.
//! The two threads talk only through a pair of peers over an in-memory
//! channel, so parameters and results follow the usual rules: data is copied,
//! objects cross as handles the worker can call back into while the task runs.
//!
//! ## Invariants
//! - Every `run` is one-shot: one thread, one call, then teardown.
//! - By the time `run` resolves, the worker thread has exited.
//! - Dropping a `run` future before it resolves still kills the link, so the
//!   worker stops on its own; it is just not joined.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use linkrun::ChannelTransport;
use linkrun::Peer;
use linkrun::Value;

use crate::error::Error;
use crate::error::Result;
use crate::registry::Params;
use crate::registry::TaskRegistry;
use crate::worker;

pub struct ThreadBridge {
    registry: Arc<TaskRegistry>,
}

impl ThreadBridge {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Runs `task` with `params` on a new worker thread.
    ///
    /// A handle returned by the task is dead on arrival: the link it came over
    /// is torn down before this resolves.
    pub async fn run(&self, task: &str, params: Params) -> Result<Value> {
        let (local, remote) = ChannelTransport::pair();
        let worker = worker::spawn(self.registry.clone(), remote).map_err(|e| Error::Spawn(e.to_string()))?;
        let link = KillOnDrop(Peer::new("main", "worker", Box::new(local)));
        let peer = &link.0;

        let outcome = invoke(peer, task, params).await;

        // Killing closes our end of the channel, which stops the worker.
        peer.kill("bridge call finished");
        let joined = tokio::task::spawn_blocking(move || worker.join()).await;
        match joined {
            Ok(Ok(())) => debug!(task, "worker joined"),
            Ok(Err(_)) => {
                warn!(task, "worker thread panicked");
                return Err(Error::WorkerPanicked);
            }
            Err(e) => {
                warn!(task, error = %e, "failed to join worker");
                return Err(Error::WorkerPanicked);
            }
        }

        outcome.map_err(Error::from)
    }
}

/// Kills the caller's peer however `run` ends. Killing twice is a no-op.
struct KillOnDrop(Peer);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if !self.0.is_killed() {
            debug!(peer = %self.0.self_name(), "bridge call cancelled");
            self.0.kill("bridge call cancelled");
        }
    }
}

async fn invoke(peer: &Peer, task: &str, params: Params) -> linkrun::Result<Value> {
    let entry = peer.get_param("run").await?;
    let entry = entry.as_remote().ok_or_else(|| linkrun::Error::Remote(linkrun::RemoteError {
        name: "TypeError".into(),
        message: "worker entry is not callable".into(),
        stack: None,
        peer_name: peer.peer_name().to_string(),
        self_name: peer.self_name().to_string(),
    }))?;

    let (names, values): (Vec<String>, Vec<Value>) = params.into_iter().unzip();
    let mut args = Vec::with_capacity(values.len() + 2);
    args.push(Value::from(task));
    args.push(Value::from(serde_json::Value::from(names)));
    args.extend(values);

    entry.call(args).await
}
