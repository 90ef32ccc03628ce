//! The document model: service specs, test specs, and the root `Config`
//! that owns them. Mirrors `octopus/dsl/dsl_service.py`,
//! `octopus/dsl/dsl_test.py`, `octopus/dsl/dsl_config.py` and
//! `octopus/dsl/checker.py`, folded into one module keeping its
//! service/test/config structs side by side.

use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::{OctopusError, Result};
use crate::eval;
use crate::expect::Expectation;
use crate::keyword::{self, TestMode};
use crate::runner::Runner;
use crate::variable::Variable;

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

fn as_mapping<'a>(value: &'a Value, context: &str) -> Result<&'a Mapping> {
    value.as_mapping().ok_or_else(|| OctopusError::MissingField {
        context: context.to_string(),
        field: "<map>".to_string(),
    })
}

fn get_str(map: &Mapping, field: &str) -> Option<String> {
    map.get(field).and_then(Value::as_str).map(str::to_owned)
}

fn require_str(map: &Mapping, context: &str, field: &str) -> Result<String> {
    get_str(map, field).ok_or_else(|| OctopusError::MissingField {
        context: context.to_string(),
        field: field.to_string(),
    })
}

fn get_str_list(map: &Mapping, field: &str) -> Vec<String> {
    map.get(field)
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().map(scalar_to_string).collect())
        .unwrap_or_default()
}

/// Walks a document tree and fails on the first mapping key outside the
/// closed keyword set. The `inputs` value is exempt: its keys are
/// user-chosen variable names, not keywords.
pub fn syntax_check(value: &Value) -> Result<()> {
    walk(value, false)
}

fn walk(value: &Value, inside_inputs: bool) -> Result<()> {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                if let Some(key) = k.as_str() {
                    if !inside_inputs && !keyword::is_keyword(key) {
                        return Err(OctopusError::UnknownKeyword(key.to_string()));
                    }
                    walk(v, inside_inputs || key == "inputs")?;
                } else {
                    walk(v, inside_inputs)?;
                }
            }
            Ok(())
        }
        Value::Sequence(items) => {
            for item in items {
                walk(item, inside_inputs)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceFields {
    pub name: String,
    pub desc: String,
    pub image: String,
    pub args: Vec<String>,
    pub envs: Vec<String>,
    pub ports: Vec<String>,
    pub vols: Vec<String>,
    pub next: Vec<String>,
    pub depends_on: Vec<String>,
    pub trigger: Vec<String>,
}

fn parse_service_fields(map: &Mapping) -> Result<ServiceFields> {
    Ok(ServiceFields {
        name: require_str(map, "service", "name")?,
        desc: get_str(map, "desc").unwrap_or_default(),
        image: require_str(map, "service", "image")?,
        args: get_str_list(map, "args"),
        envs: get_str_list(map, "envs"),
        ports: get_str_list(map, "ports"),
        vols: get_str_list(map, "vols"),
        next: get_str_list(map, "next"),
        depends_on: get_str_list(map, "depends_on"),
        trigger: get_str_list(map, "trigger"),
    })
}

/// A declarative container description plus its graph edges.
///
/// `origin` is the pre-evaluation mapping snapshot: every `evaluate`
/// call restores from it before substituting, so repeated evaluation
/// with the same bindings is idempotent.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    origin: Mapping,
    fields: ServiceFields,
}

impl ServiceSpec {
    pub fn from_mapping(map: Mapping) -> Result<Self> {
        let fields = parse_service_fields(&map)?;
        Ok(Self { origin: map, fields })
    }

    pub fn evaluate(&mut self, bindings: &HashMap<String, String>) -> Result<()> {
        let evaluated = eval::evaluate_value(&Value::Mapping(self.origin.clone()), bindings);
        let map = as_mapping(&evaluated, "service")?.clone();
        self.fields = parse_service_fields(&map)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
    pub fn image(&self) -> &str {
        &self.fields.image
    }
    pub fn args(&self) -> &[String] {
        &self.fields.args
    }
    pub fn envs(&self) -> &[String] {
        &self.fields.envs
    }
    pub fn ports(&self) -> &[String] {
        &self.fields.ports
    }
    pub fn vols(&self) -> &[String] {
        &self.fields.vols
    }
    pub fn next(&self) -> &[String] {
        &self.fields.next
    }
    pub fn depends_on(&self) -> &[String] {
        &self.fields.depends_on
    }
    pub fn trigger(&self) -> &[String] {
        &self.fields.trigger
    }
}

/// Mode + runner + needs + expectation.
#[derive(Debug, Clone)]
pub struct TestSpec {
    origin: Mapping,
    name: String,
    desc: String,
    mode: TestMode,
    needs: Vec<String>,
    runner: Runner,
    expect: Expectation,
}

fn parse_mode(map: &Mapping) -> Result<TestMode> {
    let raw = require_str(map, "test", "mode")?;
    serde_yaml::from_value(Value::String(raw.clone())).map_err(|_| OctopusError::MissingField {
        context: "test".to_string(),
        field: format!("mode (unsupported value {raw:?})"),
    })
}

impl TestSpec {
    pub fn from_mapping(map: Mapping) -> Result<Self> {
        let name = require_str(&map, "test", "name")?;
        let desc = get_str(&map, "desc").unwrap_or_default();
        let mode = parse_mode(&map)?;
        let needs = get_str_list(&map, "needs");

        let runner_value = map.get("runner").ok_or_else(|| OctopusError::MissingField {
            context: "test".to_string(),
            field: "runner".to_string(),
        })?;
        let runner_map = as_mapping(runner_value, "test.runner")?;
        let runner = Runner::from_mapping(mode, runner_map)?;
        if runner.mode() != mode {
            return Err(OctopusError::RunnerModeMismatch {
                test: name.clone(),
                mode: mode.to_string(),
                runner_kind: runner.mode().to_string(),
            });
        }

        let expect_value = map.get("expect").ok_or_else(|| OctopusError::MissingField {
            context: "test".to_string(),
            field: "expect".to_string(),
        })?;
        let expect_map = as_mapping(expect_value, "test.expect")?.clone();
        let expect = Expectation::from_mapping(mode, expect_map)?;

        Ok(Self {
            origin: map,
            name,
            desc,
            mode,
            needs,
            runner,
            expect,
        })
    }

    pub fn evaluate(&mut self, bindings: &HashMap<String, String>) -> Result<()> {
        let evaluated = eval::evaluate_value(&Value::Mapping(self.origin.clone()), bindings);
        let rebuilt = Self::from_mapping(as_mapping(&evaluated, "test")?.clone())?;
        self.name = rebuilt.name;
        self.desc = rebuilt.desc;
        self.needs = rebuilt.needs;
        self.runner = rebuilt.runner;
        self.expect = rebuilt.expect;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn desc(&self) -> &str {
        &self.desc
    }
    pub fn mode(&self) -> TestMode {
        self.mode
    }
    pub fn needs(&self) -> &[String] {
        &self.needs
    }
    pub fn runner(&self) -> &Runner {
        &self.runner
    }
    pub fn expect(&self) -> &Expectation {
        &self.expect
    }
}

/// The root document: version, name, desc, inputs, services, tests.
/// Owns name indices and re-runs evaluation across the full set of
/// inputs on every rebind of a lazy variable.
pub struct Config {
    pub version: String,
    pub name: String,
    pub desc: String,
    inputs: Vec<Variable>,
    services: Vec<ServiceSpec>,
    tests: Vec<TestSpec>,
    service_index: HashMap<String, usize>,
    test_index: HashMap<String, usize>,
}

impl Config {
    pub fn from_value(root: &Value) -> Result<Self> {
        syntax_check(root)?;
        let map = as_mapping(root, "config")?;

        let version = require_str(map, "config", "version")?;
        if !keyword::is_supported_version(&version) {
            return Err(OctopusError::UnsupportedVersion(version));
        }
        let name = require_str(map, "config", "name")?;
        let desc = get_str(map, "desc").unwrap_or_default();

        let inputs = parse_inputs(map)?;

        let mut services = Vec::new();
        for raw in map
            .get("services")
            .and_then(Value::as_sequence)
            .into_iter()
            .flatten()
        {
            let m = as_mapping(raw, "service")?.clone();
            services.push(ServiceSpec::from_mapping(m)?);
        }

        let mut tests = Vec::new();
        for raw in map.get("tests").and_then(Value::as_sequence).into_iter().flatten() {
            let m = as_mapping(raw, "test")?.clone();
            tests.push(TestSpec::from_mapping(m)?);
        }

        let mut service_index = HashMap::new();
        for (i, s) in services.iter().enumerate() {
            if service_index.insert(s.name().to_string(), i).is_some() {
                return Err(OctopusError::DuplicateName(s.name().to_string()));
            }
        }
        let mut test_index = HashMap::new();
        for (i, t) in tests.iter().enumerate() {
            if test_index.insert(t.name().to_string(), i).is_some() {
                return Err(OctopusError::DuplicateName(t.name().to_string()));
            }
        }

        let mut config = Self {
            version,
            name,
            desc,
            inputs,
            services,
            tests,
            service_index,
            test_index,
        };

        config.evaluate_all()?;
        config.semantic_check()?;

        Ok(config)
    }

    fn bindings(&self) -> HashMap<String, String> {
        self.inputs
            .iter()
            .map(|v| (v.key().to_string(), v.value().to_string()))
            .collect()
    }

    fn evaluate_all(&mut self) -> Result<()> {
        let bindings = self.bindings();
        for s in &mut self.services {
            s.evaluate(&bindings)?;
        }
        for t in &mut self.tests {
            t.evaluate(&bindings)?;
        }
        Ok(())
    }

    /// Re-assign a lazy variable and re-evaluate every service and test
    /// against the full, current set of bindings.
    pub fn rebind(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let var = self
            .inputs
            .iter_mut()
            .find(|v| v.key() == key)
            .ok_or_else(|| OctopusError::InvalidMutation(key.to_string()))?;
        var.set_value(value)?;
        self.evaluate_all()
    }

    pub fn services(&self) -> &[ServiceSpec] {
        &self.services
    }
    pub fn tests(&self) -> &[TestSpec] {
        &self.tests
    }
    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }
    pub fn is_valid_service(&self, name: &str) -> bool {
        self.service_index.contains_key(name)
    }
    pub fn is_valid_test(&self, name: &str) -> bool {
        self.test_index.contains_key(name)
    }
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.service_index.get(name).map(|&i| &self.services[i])
    }
    pub fn test(&self, name: &str) -> Option<&TestSpec> {
        self.test_index.get(name).map(|&i| &self.tests[i])
    }

    /// Aggregates findings from the next / depends_on / inputs
    /// sub-checks, reporting all of them together rather than stopping
    /// at the first. `next`/`depends_on` references to an unknown
    /// service are findings here because §4.3 has the graph manager
    /// warn-and-skip those edges rather than fail to build; `trigger`/
    /// `needs` references are NOT checked here — those name a hard
    /// requirement for an edge to exist, and `GraphManager::build` is
    /// the sole raiser of `UnknownReference` for them.
    fn semantic_check(&self) -> Result<()> {
        let mut findings = Vec::new();

        for s in &self.services {
            for n in s.next() {
                if !self.is_valid_service(n) {
                    findings.push(format!("next: {{{}, {}, not a valid service}}", s.name(), n));
                }
            }
            for d in s.depends_on() {
                if !self.is_valid_service(d) {
                    findings.push(format!(
                        "depends_on: {{{}, {}, not a valid service}}",
                        s.name(),
                        d
                    ));
                }
            }
        }

        for key in self.inputs.iter().map(Variable::key).duplicates() {
            findings.push(format!("inputs: {{{}, {}, duplicate input key}}", self.name, key));
        }

        if findings.is_empty() {
            Ok(())
        } else {
            Err(OctopusError::SemanticCheckFailed(findings))
        }
    }
}

fn parse_inputs(map: &Mapping) -> Result<Vec<Variable>> {
    let mut inputs = Vec::new();
    for raw in map.get("inputs").and_then(Value::as_sequence).into_iter().flatten() {
        let entry = as_mapping(raw, "inputs")?;
        let (k, v) = entry.iter().next().ok_or_else(|| OctopusError::MissingField {
            context: "inputs".to_string(),
            field: "<key>".to_string(),
        })?;
        let key = k.as_str().ok_or_else(|| OctopusError::MissingField {
            context: "inputs".to_string(),
            field: "<key>".to_string(),
        })?;
        inputs.push(Variable::new(key, scalar_to_string(v)));
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    const SCENARIO_F: &str = r#"
version: "0.1.0"
name: scenario-f
desc: variable substitution
inputs:
  - svc_name: w
  - $port: 8080
services:
  - name: "${svc_name}"
    image: busybox
    ports:
      - "${$port}:80"
tests: []
"#;

    #[test]
    fn unknown_top_level_keyword_is_rejected() {
        let d = doc("version: \"0.1.0\"\nname: n\ndesc: d\ntimeout: 5\ninputs: []\nservices: []\ntests: []\n");
        let err = Config::from_value(&d).unwrap_err();
        assert_eq!(err, OctopusError::UnknownKeyword("timeout".to_string()));
    }

    #[test]
    fn scenario_f_eager_evaluation_and_rebind_idempotence() {
        let d = doc(SCENARIO_F);
        let mut cfg = Config::from_value(&d).unwrap();
        assert_eq!(cfg.services()[0].name(), "w");
        assert_eq!(cfg.services()[0].ports(), ["8080:80"]);

        cfg.rebind("$port", "9090").unwrap();
        assert_eq!(cfg.services()[0].ports(), ["9090:80"]);

        cfg.rebind("$port", "9090").unwrap();
        assert_eq!(cfg.services()[0].ports(), ["9090:80"]);
        assert_eq!(cfg.services()[0].name(), "w");
    }

    #[test]
    fn unknown_depends_on_reference_is_a_semantic_check_finding() {
        let d = doc(
            r#"
version: "0.1.0"
name: n
desc: d
inputs: []
services:
  - name: a
    image: busybox
    depends_on: ["svc_missing"]
tests: []
"#,
        );
        let err = Config::from_value(&d).unwrap_err();
        match err {
            OctopusError::SemanticCheckFailed(findings) => {
                assert!(findings.iter().any(|f| f.contains("svc_missing")));
            }
            other => panic!("expected SemanticCheckFailed, got {other:?}"),
        }
    }

    /// Scenario C (§8): a `trigger` naming a test that doesn't exist is
    /// NOT caught by `Config::from_value` itself — `trigger`/`needs`
    /// are hard edge requirements, checked only when the graph is
    /// built. See `graph::tests::unknown_trigger_reference_is_rejected_at_build`.
    #[test]
    fn scenario_c_missing_trigger_reference_passes_config_construction() {
        let d = doc(
            r#"
version: "0.1.0"
name: n
desc: d
inputs: []
services:
  - name: a
    image: busybox
    trigger: ["t_missing"]
tests: []
"#,
        );
        assert!(Config::from_value(&d).is_ok());
    }

    #[test]
    fn scenario_d_duplicate_service_name() {
        let d = doc(
            r#"
version: "0.1.0"
name: n
desc: d
inputs: []
services:
  - name: svc
    image: busybox
  - name: svc
    image: busybox
tests: []
"#,
        );
        let err = Config::from_value(&d).unwrap_err();
        assert_eq!(err, OctopusError::DuplicateName("svc".to_string()));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let d = doc("version: \"9.9.9\"\nname: n\ndesc: d\ninputs: []\nservices: []\ntests: []\n");
        let err = Config::from_value(&d).unwrap_err();
        assert_eq!(err, OctopusError::UnsupportedVersion("9.9.9".to_string()));
    }
}
