//! The five test runner variants and their rendered command strings.
//!
//! Mirrors `octopus/dsl/runner.py`'s `ShellRunner`/`HttpRunner`/
//! `GrpcRunner`/`PytestRunner`/`DockerRunner`, re-architected as a sum
//! type per §9 ("Dynamic field resolution across variants"): one
//! variant per mode instead of a class hierarchy.

use serde_yaml::{Mapping, Value};

use crate::error::{OctopusError, Result};
use crate::keyword::{HttpMethod, TestMode};

#[derive(Debug, Clone, PartialEq)]
pub enum Runner {
    Shell {
        cmd: Vec<String>,
    },
    Http {
        header: Option<String>,
        method: HttpMethod,
        payload: Option<String>,
        endpoint: String,
    },
    Grpc {
        proto: Option<String>,
        function: String,
        endpoint: String,
        payload: String,
    },
    Pytest {
        root_dir: Option<String>,
        test_args: Vec<String>,
    },
    Docker {
        cntr_name: String,
        cmd: Vec<String>,
    },
}

impl Runner {
    pub fn mode(&self) -> TestMode {
        match self {
            Runner::Shell { .. } => TestMode::Shell,
            Runner::Http { .. } => TestMode::Http,
            Runner::Grpc { .. } => TestMode::Grpc,
            Runner::Pytest { .. } => TestMode::Pytest,
            Runner::Docker { .. } => TestMode::Docker,
        }
    }

    /// Parse a runner out of its mapping, dispatching on `mode`. Fails
    /// with `MissingField` if a required field for that mode is absent.
    pub fn from_mapping(mode: TestMode, map: &Mapping) -> Result<Self> {
        let get_str = |field: &str| -> Option<String> {
            map.get(field).and_then(Value::as_str).map(str::to_owned)
        };
        let get_str_list = |field: &str| -> Option<Vec<String>> {
            map.get(field).and_then(Value::as_sequence).map(|seq| {
                seq.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
        };
        let require_str = |field: &str| -> Result<String> {
            get_str(field).ok_or_else(|| missing(mode, field))
        };
        let require_list = |field: &str| -> Result<Vec<String>> {
            get_str_list(field).ok_or_else(|| missing(mode, field))
        };

        Ok(match mode {
            TestMode::Shell => Runner::Shell {
                cmd: require_list("cmd")?,
            },
            TestMode::Http => {
                let method = match get_str("method") {
                    Some(m) => parse_http_method(mode, &m)?,
                    None => HttpMethod::Get,
                };
                Runner::Http {
                    header: get_str("header"),
                    method,
                    payload: get_str("payload"),
                    endpoint: require_str("endpoint")?,
                }
            }
            TestMode::Grpc => Runner::Grpc {
                proto: get_str("proto"),
                function: require_str("function")?,
                endpoint: require_str("endpoint")?,
                payload: require_str("payload")?,
            },
            TestMode::Pytest => Runner::Pytest {
                root_dir: get_str("root_dir"),
                test_args: require_list("test_args")?,
            },
            TestMode::Docker => Runner::Docker {
                cntr_name: require_str("cntr_name")?,
                cmd: require_list("cmd")?,
            },
        })
    }

    /// Render the runner to its executable command string. See §6.2.
    pub fn render_command(&self) -> String {
        match self {
            Runner::Shell { cmd } => cmd.join(" "),
            Runner::Docker { cntr_name, cmd } => {
                let mut parts = vec!["docker".to_string(), "exec".to_string(), cntr_name.clone()];
                parts.extend(cmd.iter().cloned());
                parts.join(" ")
            }
            Runner::Http {
                header,
                method,
                payload,
                endpoint,
            } => {
                let mut parts = vec!["curl".to_string()];
                if let Some(h) = header {
                    parts.push("-H".to_string());
                    parts.push(format!("'{h}'"));
                }
                parts.push("-X".to_string());
                parts.push(method.to_string());
                if !matches!(method, HttpMethod::Get | HttpMethod::Delete) {
                    if let Some(p) = payload {
                        parts.push("-d".to_string());
                        parts.push(format!("'{p}'"));
                    }
                }
                parts.push(format!("'{endpoint}'"));
                parts.join(" ")
            }
            Runner::Grpc {
                proto,
                function,
                endpoint,
                payload,
            } => {
                let mut parts = vec!["grpcurl".to_string()];
                if let Some(p) = proto {
                    parts.push("-proto".to_string());
                    parts.push(p.clone());
                }
                parts.push("-d".to_string());
                parts.push(format!("'{payload}'"));
                parts.push("-plaintext".to_string());
                parts.push(endpoint.clone());
                parts.push(function.clone());
                parts.join(" ")
            }
            Runner::Pytest { root_dir, test_args } => {
                let mut parts = vec!["pytest".to_string()];
                if let Some(rd) = root_dir {
                    parts.push("--rootdir".to_string());
                    parts.push(rd.clone());
                }
                parts.extend(test_args.iter().cloned());
                parts.join(" ")
            }
        }
    }
}

fn missing(mode: TestMode, field: &str) -> OctopusError {
    OctopusError::MissingField {
        context: format!("{mode} runner"),
        field: field.to_string(),
    }
}

fn parse_http_method(mode: TestMode, s: &str) -> Result<HttpMethod> {
    Ok(match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        "PATCH" => HttpMethod::Patch,
        other => {
            return Err(OctopusError::MissingField {
                context: format!("{mode} runner"),
                field: format!("method (unsupported value {other:?})"),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn mapping(pairs: &[(&str, Value)]) -> Mapping {
        let mut m = Mapping::new();
        for (k, v) in pairs {
            m.insert(Value::String(k.to_string()), v.clone());
        }
        m
    }

    #[test]
    fn renders_http_post_with_header_and_payload() {
        let runner = Runner::Http {
            header: Some("Content-Type: text/plain".to_string()),
            method: HttpMethod::Post,
            payload: Some("{}".to_string()),
            endpoint: "http://h/".to_string(),
        };
        assert_eq!(
            runner.render_command(),
            "curl -H 'Content-Type: text/plain' -X POST -d '{}' 'http://h/'"
        );
    }

    #[test]
    fn renders_docker_exec() {
        let runner = Runner::Docker {
            cntr_name: "c".to_string(),
            cmd: vec!["echo".to_string(), "hi".to_string()],
        };
        assert_eq!(runner.render_command(), "docker exec c echo hi");
    }

    #[test_case(HttpMethod::Get, "curl -X GET 'http://h/'"; "get drops payload")]
    #[test_case(HttpMethod::Delete, "curl -X DELETE 'http://h/'"; "delete drops payload")]
    #[test_case(HttpMethod::Post, "curl -X POST -d 'ignored' 'http://h/'"; "post keeps payload")]
    #[test_case(HttpMethod::Put, "curl -X PUT -d 'ignored' 'http://h/'"; "put keeps payload")]
    #[test_case(HttpMethod::Patch, "curl -X PATCH -d 'ignored' 'http://h/'"; "patch keeps payload")]
    fn renders_payload_per_method(method: HttpMethod, expected: &str) {
        let runner = Runner::Http {
            header: None,
            method,
            payload: Some("ignored".to_string()),
            endpoint: "http://h/".to_string(),
        };
        assert_eq!(runner.render_command(), expected);
    }

    #[test]
    fn renders_grpc() {
        let runner = Runner::Grpc {
            proto: Some("svc.proto".to_string()),
            function: "Svc.Method".to_string(),
            endpoint: "localhost:9000".to_string(),
            payload: "{\"a\":1}".to_string(),
        };
        assert_eq!(
            runner.render_command(),
            "grpcurl -proto svc.proto -d '{\"a\":1}' -plaintext localhost:9000 Svc.Method"
        );
    }

    #[test]
    fn renders_pytest_with_rootdir() {
        let runner = Runner::Pytest {
            root_dir: Some("tests/".to_string()),
            test_args: vec!["-k".to_string(), "smoke".to_string()],
        };
        assert_eq!(runner.render_command(), "pytest --rootdir tests/ -k smoke");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let map = mapping(&[("header", Value::String("x".to_string()))]);
        let err = Runner::from_mapping(TestMode::Http, &map).unwrap_err();
        assert_eq!(
            err,
            OctopusError::MissingField {
                context: "http runner".to_string(),
                field: "endpoint".to_string()
            }
        );
    }

    #[test]
    fn shell_requires_cmd() {
        let map = mapping(&[]);
        assert!(Runner::from_mapping(TestMode::Shell, &map).is_err());
    }
}
