//! Expectations: the mode-scoped set of fields a test's observed
//! outcome is matched against. Mirrors `TEST_EXPECT_FIELDS` validation
//! in `octopus/dsl/checker.py`.

use serde_yaml::{Mapping, Value};

use crate::error::{OctopusError, Result};
use crate::keyword::{required_expect_fields, TestMode};

#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    fields: Mapping,
}

impl Expectation {
    /// Build an expectation for `mode`, checking that every field the
    /// mode requires is present in `map`.
    pub fn from_mapping(mode: TestMode, map: Mapping) -> Result<Self> {
        for field in required_expect_fields(mode) {
            if !map.contains_key(*field) {
                return Err(OctopusError::MissingField {
                    context: format!("{mode} expect"),
                    field: field.to_string(),
                });
            }
        }
        Ok(Self { fields: map })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Compare an observed field value (rendered to a YAML value by the
    /// engine) against the expected one, if the field was declared.
    pub fn matches(&self, field: &str, observed: &Value) -> bool {
        match self.fields.get(field) {
            Some(expected) => expected == observed,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        let mut m = Mapping::new();
        for (k, v) in pairs {
            m.insert(Value::String(k.to_string()), v.clone());
        }
        m
    }

    #[test]
    fn shell_requires_exit_code_stdout_stderr() {
        let map = mapping(&[("exit_code", Value::Number(0.into()))]);
        let err = Expectation::from_mapping(TestMode::Shell, map).unwrap_err();
        assert_eq!(
            err,
            OctopusError::MissingField {
                context: "shell expect".to_string(),
                field: "stdout".to_string()
            }
        );
    }

    #[test]
    fn full_shell_expectation_builds() {
        let map = mapping(&[
            ("exit_code", Value::Number(0.into())),
            ("stdout", Value::String("ok".to_string())),
            ("stderr", Value::String("".to_string())),
        ]);
        let exp = Expectation::from_mapping(TestMode::Shell, map).unwrap();
        assert!(exp.matches("exit_code", &Value::Number(0.into())));
        assert!(!exp.matches("exit_code", &Value::Number(1.into())));
        assert!(exp.matches("undeclared_field", &Value::String("anything".to_string())));
    }
}
