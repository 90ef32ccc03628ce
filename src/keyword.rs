//! The closed keyword set and small enums shared across the document model.
//!
//! Mirrors `octopus/dsl/constants.py`: every mapping key that can
//! legally appear in the configuration document (outside of `inputs`,
//! whose keys are user-chosen variable names) is listed here once.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every mapping key the parser accepts anywhere in the document except
/// inside `inputs` values.
pub const KEYWORDS: &[&str] = &[
    "desc",
    "name",
    "version",
    "inputs",
    "services",
    "tests",
    "image",
    "args",
    "envs",
    "ports",
    "vols",
    "next",
    "depends_on",
    "trigger",
    "needs",
    "mode",
    "runner",
    "expect",
    "cmd",
    "header",
    "method",
    "payload",
    "endpoint",
    "root_dir",
    "test_args",
    "proto",
    "function",
    "cntr_name",
    "exit_code",
    "stdout",
    "stderr",
    "status_code",
    "response",
];

pub fn is_keyword(key: &str) -> bool {
    KEYWORDS.contains(&key)
}

pub const SUPPORTED_VERSIONS: &[&str] = &["0.1.0"];

pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    Shell,
    Http,
    Grpc,
    Pytest,
    Docker,
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestMode::Shell => "shell",
            TestMode::Http => "http",
            TestMode::Grpc => "grpc",
            TestMode::Pytest => "pytest",
            TestMode::Docker => "docker",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        };
        write!(f, "{s}")
    }
}

/// Fields an `Expectation` requires, keyed by test mode. Mirrors
/// `TEST_EXPECT_FIELDS` in `constants.py`.
pub fn required_expect_fields(mode: TestMode) -> &'static [&'static str] {
    match mode {
        TestMode::Shell => &["exit_code", "stdout", "stderr"],
        TestMode::Http => &["status_code", "response"],
        TestMode::Grpc => &["exit_code", "response"],
        TestMode::Pytest => &["exit_code"],
        TestMode::Docker => &["exit_code", "stdout", "stderr"],
    }
}
