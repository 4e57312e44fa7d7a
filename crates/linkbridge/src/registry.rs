//! Pre-registered tasks the worker can run.
//!
//! Only a task id and its parameters cross the thread boundary. The code
//! itself is registered up front on both sides of the bridge.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use linkrun::Fault;
use linkrun::Value;

/// The captured name→value snapshot a task is invoked with.
pub type Params = BTreeMap<String, Value>;

pub type TaskFuture = BoxFuture<'static, Result<Value, Fault>>;
pub type Task = Arc<dyn Fn(Params) -> TaskFuture + Send + Sync>;

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `id`, replacing any earlier task with that id.
    pub fn task<F, Fut>(mut self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        self.tasks.insert(id.into(), Arc::new(move |params| f(params).boxed()));
        self
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
