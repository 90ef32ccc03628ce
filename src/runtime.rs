//! The container-runtime contract the execution engine deploys
//! services through: `run/start/stop/pause/remove/logs/health/inspect`.
//! Grounded on `octopus/core/container.py` + `octopus/core/service.py`'s
//! Docker-backed `Service`, re-architected per §4.5/§9 as an explicit
//! trait so the engine can be driven against a fake in tests, keeping
//! I/O behind a small trait the way `status.rs` keeps its output sink
//! generic over a `Write`.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("container runtime operation {op} failed for {container_id:?}: {message}")]
    OperationFailed {
        op: &'static str,
        container_id: String,
        message: String,
    },
    #[error("no such container {0:?}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Mirrors `octopus/core/service.py`'s `ServiceStatus`. Surfaced
/// through `inspect()`'s `status` key for richer status-line
/// rendering; the engine's own execution-node status machine (§4.4) is
/// the five-state one in `engine::Status` and does not derive from
/// this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    NotStarted,
    Created,
    Running,
    Stopped,
    Paused,
    Exited,
    Removed,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::NotStarted => "not_started",
            ServiceStatus::Created => "created",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Paused => "paused",
            ServiceStatus::Exited => "exited",
            ServiceStatus::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

/// The effective deploy descriptor the engine sends to the runtime for
/// a service, per §6.3.
#[derive(Debug, Clone, Default)]
pub struct DeploySpec {
    pub name: String,
    pub image: String,
    pub envs: Vec<String>,
    pub ports: Vec<String>,
    pub vols: Vec<String>,
    pub args: Vec<String>,
}

pub trait ContainerRuntime: Send + Sync {
    fn run(&self, spec: &DeploySpec) -> Result<String>;
    fn start(&self, id: &str) -> Result<()>;
    fn stop(&self, id: &str) -> Result<()>;
    fn pause(&self, id: &str) -> Result<()>;
    fn remove(&self, id: &str) -> Result<()>;
    fn logs(&self, id: &str) -> Result<Vec<String>>;
    fn health(&self, id: &str) -> Result<bool>;
    fn inspect(&self, id: &str) -> Result<HashMap<String, String>>;
}

/// An in-memory fake used by engine tests: containers are always
/// healthy unless their name appears in `unhealthy`, and an operation
/// on a name in `failing` always errors.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeRuntime {
        containers: Mutex<HashMap<String, DeploySpec>>,
        pub unhealthy: Vec<String>,
        pub failing: Vec<String>,
    }

    impl FakeRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_unhealthy(mut self, names: impl IntoIterator<Item = String>) -> Self {
            self.unhealthy = names.into_iter().collect();
            self
        }

        pub fn with_failing(mut self, names: impl IntoIterator<Item = String>) -> Self {
            self.failing = names.into_iter().collect();
            self
        }

        fn check_failing(&self, id: &str, op: &'static str) -> Result<()> {
            if self.failing.iter().any(|n| n == id) {
                return Err(RuntimeError::OperationFailed {
                    op,
                    container_id: id.to_string(),
                    message: "forced failure".to_string(),
                });
            }
            Ok(())
        }
    }

    impl ContainerRuntime for FakeRuntime {
        fn run(&self, spec: &DeploySpec) -> Result<String> {
            self.check_failing(&spec.name, "run")?;
            self.containers.lock().unwrap().insert(spec.name.clone(), spec.clone());
            Ok(spec.name.clone())
        }

        fn start(&self, id: &str) -> Result<()> {
            self.check_failing(id, "start")
        }

        fn stop(&self, id: &str) -> Result<()> {
            self.check_failing(id, "stop")
        }

        fn pause(&self, id: &str) -> Result<()> {
            self.check_failing(id, "pause")
        }

        fn remove(&self, id: &str) -> Result<()> {
            self.check_failing(id, "remove")?;
            self.containers.lock().unwrap().remove(id);
            Ok(())
        }

        fn logs(&self, _id: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn health(&self, id: &str) -> Result<bool> {
            self.check_failing(id, "health")?;
            Ok(!self.unhealthy.iter().any(|n| n == id))
        }

        fn inspect(&self, id: &str) -> Result<HashMap<String, String>> {
            self.check_failing(id, "inspect")?;
            let guard = self.containers.lock().unwrap();
            let status = if self.unhealthy.iter().any(|n| n == id) {
                ServiceStatus::Exited
            } else {
                ServiceStatus::Running
            };
            guard
                .get(id)
                .map(|s| {
                    HashMap::from([
                        ("image".to_string(), s.image.clone()),
                        ("status".to_string(), status.to_string()),
                    ])
                })
                .ok_or_else(|| RuntimeError::NotFound(id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_status_renders_snake_case() {
        assert_eq!(ServiceStatus::NotStarted.to_string(), "not_started");
        assert_eq!(ServiceStatus::Running.to_string(), "running");
    }
}
