//! The execution engine: walks the plan, deploys services through the
//! container runtime, runs test runners through the subprocess
//! launcher, records per-node status, and cleans up containers.
//!
//! Grounded on `octopus/orchestration/manager.py`'s run loop and
//! `octopus/core/service.py`'s deploy/health-check/cleanup sequence,
//! restructured around keeping engine state plain and explicit rather
//! than reaching for a class hierarchy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_yaml::Value;

use crate::config::{Config, ServiceSpec, TestSpec};
use crate::graph::GraphManager;
use crate::process::SubprocessLauncher;
use crate::runtime::{ContainerRuntime, DeploySpec};
use crate::{cleanup, util::ResultExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Service,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Success | Status::Failed | Status::Skipped)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionNode {
    pub name: String,
    pub kind: NodeKind,
    pub status: Status,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionNode {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            status: Status::Pending,
            start_ts: None,
            end_ts: None,
            error: None,
        }
    }
}

/// How long the engine waits after deploying a container before it
/// queries health. §4.4 suggests 2s; a proper poll-until-ready
/// protocol is an open question (§9.4).
pub const SETTLE_INTERVAL: Duration = Duration::from_secs(2);

pub struct Engine<'a> {
    config: &'a Config,
    graph: &'a GraphManager,
    runtime: Arc<dyn ContainerRuntime>,
    launcher: Box<dyn SubprocessLauncher>,
    pub nodes: HashMap<String, ExecutionNode>,
    containers: Vec<String>,
    settle_interval: Duration,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a Config,
        graph: &'a GraphManager,
        runtime: Arc<dyn ContainerRuntime>,
        launcher: Box<dyn SubprocessLauncher>,
    ) -> Self {
        cleanup::install_shutdown_hook();
        Self {
            config,
            graph,
            runtime,
            launcher,
            nodes: HashMap::new(),
            containers: Vec::new(),
            settle_interval: SETTLE_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_settle_interval(mut self, d: Duration) -> Self {
        self.settle_interval = d;
        self
    }

    /// Runs every node in `plan` in order, returning true iff all of
    /// them ended in `Success`.
    pub async fn execute(&mut self, plan: &[String]) -> bool {
        for name in plan {
            let kind = match self.graph.index_of(name).map(|i| self.graph.node_kind(i)) {
                Some(crate::graph::NodeKind::Service) => NodeKind::Service,
                Some(crate::graph::NodeKind::Test) => NodeKind::Test,
                None => continue,
            };
            self.nodes.entry(name.clone()).or_insert_with(|| ExecutionNode::new(name.clone(), kind));

            if self.any_dependency_not_succeeded(name) {
                let node = self.nodes.get_mut(name).unwrap();
                node.status = Status::Skipped;
                continue;
            }

            {
                let node = self.nodes.get_mut(name).unwrap();
                node.status = Status::Running;
                node.start_ts = Some(Utc::now());
            }

            match kind {
                NodeKind::Service => self.dispatch_service(name).await,
                NodeKind::Test => self.dispatch_test(name).await,
            }

            let node = self.nodes.get_mut(name).unwrap();
            node.end_ts = Some(Utc::now());
        }

        self.cleanup().await;

        self.nodes.values().all(|n| n.status == Status::Success)
    }

    fn any_dependency_not_succeeded(&self, name: &str) -> bool {
        self.graph.predecessors(name).iter().any(|dep| {
            self.nodes
                .get(dep)
                .map(|n| n.status != Status::Success)
                .unwrap_or(true)
        })
    }

    async fn dispatch_service(&mut self, name: &str) {
        let Some(spec) = self.config.service(name) else {
            self.fail(name, "service spec vanished after planning".to_string());
            return;
        };
        let deploy = deploy_spec(spec);

        match self.runtime.run(&deploy) {
            Ok(id) => {
                self.containers.push(id.clone());
                let rt = self.runtime.clone();
                let id_for_cleanup = id.clone();
                cleanup::add(id.clone(), move || {
                    log::warn!("shutdown hook stopping orphaned container {id_for_cleanup:?}");
                    if let Err(e) = rt.stop(&id_for_cleanup) {
                        log::error!("shutdown hook: stopping container {id_for_cleanup:?} failed: {e}");
                    }
                    if let Err(e) = rt.remove(&id_for_cleanup) {
                        log::error!("shutdown hook: removing container {id_for_cleanup:?} failed: {e}");
                    }
                });

                tokio::time::sleep(self.settle_interval).await;

                match self.runtime.health(&id) {
                    Ok(true) => self.succeed(name),
                    Ok(false) => self.fail(name, "unhealthy".to_string()),
                    Err(e) => self.fail(name, e.to_string()),
                }
            }
            Err(e) => self.fail(name, e.to_string()),
        }
    }

    async fn dispatch_test(&mut self, name: &str) {
        let Some(spec) = self.config.test(name) else {
            self.fail(name, "test spec vanished after planning".to_string());
            return;
        };

        let command = spec.runner().render_command();
        match self.launcher.run(&command).await {
            Ok(output) => {
                if let Some(mismatch) = self.check_expectation(spec, &output) {
                    self.fail(name, mismatch);
                } else {
                    self.succeed(name);
                }
            }
            Err(e) => self.fail(name, e.to_string()),
        }
    }

    /// Matches an observed subprocess result against the test's
    /// expectation per §4.4. Returns `Some(diagnostic)` on mismatch.
    fn check_expectation(&self, spec: &TestSpec, output: &crate::process::ProcessOutput) -> Option<String> {
        use crate::keyword::TestMode;
        let expect = spec.expect();

        let exit_code_matches = expect
            .get("exit_code")
            .and_then(Value::as_i64)
            .map(|want| want == output.exit_code as i64)
            .unwrap_or(true);
        if !exit_code_matches {
            return Some(format!(
                "exit_code mismatch: expected {:?}, got {}",
                expect.get("exit_code"),
                output.exit_code
            ));
        }

        match spec.mode() {
            TestMode::Shell | TestMode::Docker => {
                if let Some(want) = expect.get("stdout").and_then(Value::as_str) {
                    if !want.is_empty() && !output.stdout.contains(want) {
                        return Some(format!("stdout does not contain {want:?}: got {:?}", output.stdout));
                    }
                }
                if let Some(want) = expect.get("stderr").and_then(Value::as_str) {
                    if !want.is_empty() && !output.stderr.contains(want) {
                        return Some(format!("stderr does not contain {want:?}: got {:?}", output.stderr));
                    }
                }
                None
            }
            TestMode::Pytest => None,
            // status_code/response matching against an http/grpc result is
            // mode-specific parsing left to the runner adapter (§4.4, §9.3).
            TestMode::Http | TestMode::Grpc => None,
        }
    }

    fn succeed(&mut self, name: &str) {
        self.nodes.get_mut(name).unwrap().status = Status::Success;
    }

    fn fail(&mut self, name: &str, error: String) {
        let node = self.nodes.get_mut(name).unwrap();
        node.status = Status::Failed;
        node.error = Some(error);
    }

    /// Stops and removes every container this engine deployed, in
    /// reverse creation order. Errors are logged, never re-raised.
    /// Idempotent: each id is unregistered as soon as it is cleaned up.
    async fn cleanup(&mut self) {
        while let Some(id) = self.containers.pop() {
            self.runtime.stop(&id).or_log_error(&format!("stopping container {id:?}"));
            self.runtime.remove(&id).or_log_error(&format!("removing container {id:?}"));
            cleanup::remove(&id);
        }
    }

    /// The set of node names that ended in `Success`, for summary
    /// reporting (`K/N successful`).
    pub fn successes(&self) -> HashSet<&str> {
        self.nodes
            .values()
            .filter(|n| n.status == Status::Success)
            .map(|n| n.name.as_str())
            .collect()
    }
}

fn deploy_spec(spec: &ServiceSpec) -> DeploySpec {
    DeploySpec {
        name: spec.name().to_string(),
        image: spec.image().to_string(),
        envs: spec.envs().to_vec(),
        ports: spec.ports().to_vec(),
        vols: spec.vols().to_vec(),
        args: spec.args().to_vec(),
    }
}
