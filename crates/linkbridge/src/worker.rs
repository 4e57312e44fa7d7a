//! # Worker Thread
//!
//! The far half of the bridge: a dedicated OS thread with its own
//! single-threaded runtime and its own peer. It publishes one root entry,
//! `run`, and lives until its transport closes.
//!
//! `run` takes `(taskId, paramNames, ...paramValues)`: the task id, a list of
//! parameter names, then one value per name in the same order.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;
use tracing::info;
use tracing::warn;

use linkrun::ChannelTransport;
use linkrun::Fault;
use linkrun::Object;
use linkrun::PeerBuilder;
use linkrun::Value;

use crate::registry::Params;
use crate::registry::TaskRegistry;

pub(crate) const THREAD_NAME: &str = "linkbridge-worker";

/// Spawns the worker thread. It exits once the other end of `transport` is
/// dropped.
pub(crate) fn spawn(registry: Arc<TaskRegistry>, transport: ChannelTransport) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || serve(registry, transport))
}

fn serve(registry: Arc<TaskRegistry>, transport: ChannelTransport) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            // Dropping the transport here fails the caller's pending fetch.
            warn!(error = %e, "worker runtime failed to start");
            return;
        }
    };

    runtime.block_on(async move {
        let peer = PeerBuilder::new("worker", "main")
            .param("run", entry(registry))
            .connect(Box::new(transport));
        info!("worker started");
        peer.closed().await;
        info!("worker stopped");
    });
}

fn entry(registry: Arc<TaskRegistry>) -> Arc<Object> {
    Object::function(move |args: Vec<Value>| {
        let registry = registry.clone();
        async move { run_task(&registry, args).await }
    })
}

pub(crate) async fn run_task(registry: &TaskRegistry, args: Vec<Value>) -> Result<Value, Fault> {
    let mut args = args.into_iter();

    let task_id = args
        .next()
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| Fault::new("TypeError", "expected a task id"))?;
    let names = args
        .next()
        .map(param_names)
        .ok_or_else(|| Fault::new("TypeError", "expected a list of parameter names"))??;

    let values: Vec<Value> = args.collect();
    if values.len() != names.len() {
        return Err(Fault::new(
            "TypeError",
            format!("{} parameter names but {} values", names.len(), values.len()),
        ));
    }
    let params: Params = names.into_iter().zip(values).collect();

    let task = registry
        .get(&task_id)
        .ok_or_else(|| Fault::new("TaskNotFound", format!("no task registered as '{}'", task_id)))?;

    debug!(task = %task_id, params = params.len(), "running task");
    task(params).await
}

/// Accepts the names either as a JSON array or as a list of string values.
fn param_names(value: Value) -> Result<Vec<String>, Fault> {
    let names: Option<Vec<String>> = match value {
        Value::Data(serde_json::Value::Array(items)) => {
            items.iter().map(|item| item.as_str().map(str::to_string)).collect()
        }
        Value::List(items) => items.iter().map(|item| item.as_str().map(str::to_string)).collect(),
        _ => None,
    };
    names.ok_or_else(|| Fault::new("TypeError", "parameter names must be strings"))
}
