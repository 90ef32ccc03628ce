//! End-to-end scenario tests (§8) driven against the public API:
//! parse → validate → plan → execute, wiring in local fakes for the
//! container runtime and subprocess launcher the way `engine.rs`'s own
//! unit tests do, but exercised here as a whole pipeline rather than
//! per-module.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;

use octopus::config::Config;
use octopus::engine::{Engine, Status};
use octopus::error::OctopusError;
use octopus::graph::GraphManager;
use octopus::process::{ProcessOutput, SubprocessLauncher};
use octopus::runner::Runner;
use octopus::runtime::{ContainerRuntime, DeploySpec, RuntimeError};
use serde_yaml::Value;

#[derive(Default)]
struct FakeRuntime {
    unhealthy: HashSet<String>,
}

impl FakeRuntime {
    fn with_unhealthy(names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            unhealthy: names.into_iter().map(str::to_string).collect(),
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn run(&self, spec: &DeploySpec) -> octopus::runtime::Result<String> {
        Ok(spec.name.clone())
    }
    fn start(&self, _id: &str) -> octopus::runtime::Result<()> {
        Ok(())
    }
    fn stop(&self, _id: &str) -> octopus::runtime::Result<()> {
        Ok(())
    }
    fn pause(&self, _id: &str) -> octopus::runtime::Result<()> {
        Ok(())
    }
    fn remove(&self, _id: &str) -> octopus::runtime::Result<()> {
        Ok(())
    }
    fn logs(&self, _id: &str) -> octopus::runtime::Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn health(&self, id: &str) -> octopus::runtime::Result<bool> {
        Ok(!self.unhealthy.contains(id))
    }
    fn inspect(&self, id: &str) -> octopus::runtime::Result<HashMap<String, String>> {
        if self.unhealthy.contains(id) {
            return Err(RuntimeError::NotFound(id.to_string()));
        }
        Ok(HashMap::new())
    }
}

struct ScriptedLauncher {
    outputs: Mutex<HashMap<String, ProcessOutput>>,
}

impl ScriptedLauncher {
    fn new(outputs: HashMap<String, ProcessOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs),
        }
    }
}

#[async_trait::async_trait]
impl SubprocessLauncher for ScriptedLauncher {
    async fn run(&self, command: &str) -> octopus::process::Result<ProcessOutput> {
        Ok(self.outputs.lock().unwrap().get(command).cloned().unwrap_or(ProcessOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }))
    }
}

fn parse(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap()
}

const FULL_PIPELINE: &str = r#"
version: "0.1.0"
name: full-pipeline
desc: a linear chain with a triggered test at each rung
inputs:
  - registry: example.test

services:
  - name: db
    image: "${registry}/db:latest"
    next: ["api"]

  - name: api
    image: "${registry}/api:latest"
    depends_on: ["db"]
    trigger: ["smoke"]

tests:
  - name: smoke
    mode: shell
    needs: ["api"]
    runner: {cmd: ["echo", "ok"]}
    expect: {exit_code: 0, stdout: "ok", stderr: ""}
"#;

#[tokio::test]
async fn full_pipeline_loads_plans_and_executes() {
    let config = Config::from_value(&parse(FULL_PIPELINE)).expect("valid config");
    assert_eq!(config.service("db").unwrap().image(), "example.test/db:latest");

    let graph = GraphManager::build(&config).unwrap();
    let plan = graph.execution_plan().unwrap();
    assert_eq!(plan, vec!["db", "api", "smoke"]);

    let runtime = std::sync::Arc::new(FakeRuntime::default());
    let mut outputs = HashMap::new();
    outputs.insert(
        "echo ok".to_string(),
        ProcessOutput {
            exit_code: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
        },
    );
    let launcher = Box::new(ScriptedLauncher::new(outputs));

    let mut engine = Engine::new(&config, &graph, runtime, launcher);
    let ok = engine.execute(&plan).await;

    assert!(ok);
    assert_eq!(engine.nodes["db"].status, Status::Success);
    assert_eq!(engine.nodes["api"].status, Status::Success);
    assert_eq!(engine.nodes["smoke"].status, Status::Success);
}

#[test]
fn scenario_e_unknown_top_level_keyword() {
    let doc = parse(
        r#"
version: "0.1.0"
name: n
desc: d
timeout: 5
inputs: []
services: []
tests: []
"#,
    );
    assert_eq!(
        Config::from_value(&doc).unwrap_err(),
        OctopusError::UnknownKeyword("timeout".to_string())
    );
}

#[test]
fn scenario_g_runner_renderings() {
    let doc = parse(
        r#"
version: "0.1.0"
name: n
desc: d
inputs: []
services: []
tests:
  - name: http_check
    mode: http
    runner: {header: "Content-Type: text/plain", method: "POST", payload: "{}", endpoint: "http://h/"}
    expect: {status_code: 200, response: ""}
  - name: docker_check
    mode: docker
    runner: {cntr_name: "c", cmd: ["echo", "hi"]}
    expect: {exit_code: 0, stdout: "", stderr: ""}
"#,
    );
    let config = Config::from_value(&doc).unwrap();
    let http = config.test("http_check").unwrap();
    assert_eq!(
        http.runner().render_command(),
        "curl -H 'Content-Type: text/plain' -X POST -d '{}' 'http://h/'"
    );
    let docker = config.test("docker_check").unwrap();
    assert_eq!(docker.runner().render_command(), "docker exec c echo hi");
    assert!(matches!(docker.runner(), Runner::Docker { .. }));
}

#[tokio::test]
async fn dependent_service_is_skipped_when_its_prerequisite_fails_health_check() {
    let config = Config::from_value(&parse(FULL_PIPELINE)).unwrap();
    let graph = GraphManager::build(&config).unwrap();
    let plan = graph.execution_plan().unwrap();

    let runtime = std::sync::Arc::new(FakeRuntime::with_unhealthy(["db"]));
    let launcher = Box::new(ScriptedLauncher::new(HashMap::new()));
    let mut engine = Engine::new(&config, &graph, runtime, launcher);

    let ok = engine.execute(&plan).await;

    assert!(!ok);
    assert_eq!(engine.nodes["db"].status, Status::Failed);
    assert_eq!(engine.nodes["api"].status, Status::Skipped);
    assert_eq!(engine.nodes["smoke"].status, Status::Skipped);
}

#[test]
fn config_loads_from_a_real_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config file");
    file.write_all(FULL_PIPELINE.as_bytes()).expect("write temp config file");

    let raw = std::fs::read_to_string(file.path()).expect("read temp config file");
    let doc: Value = serde_yaml::from_str(&raw).expect("parse temp config file as YAML");
    let config = Config::from_value(&doc).expect("valid config");

    assert_eq!(config.service("db").unwrap().image(), "example.test/db:latest");
}

#[tokio::test]
async fn scenario_b_cyclic_graph_is_rejected_before_execution() {
    let doc = parse(
        r#"
version: "0.1.0"
name: n
desc: d
inputs: []
services:
  - name: a
    image: busybox
    next: ["b"]
  - name: b
    image: busybox
    next: ["a"]
tests: []
"#,
    );
    let config = Config::from_value(&doc).unwrap();
    let graph = GraphManager::build(&config).unwrap();
    assert!(!graph.is_dag());
    assert_eq!(graph.execution_plan().unwrap_err(), OctopusError::CyclicGraph);
}
