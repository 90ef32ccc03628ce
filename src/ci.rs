//! CI-platform adapter stubs.
//!
//! Grounded on `octopus/ext_api/base.py`'s `CIAdapter` abstract base
//! (`get_pipeline_status`, `trigger_pipeline`, `cancel_pipeline`,
//! `get_job_logs`) and its three concrete subclasses in `ci/github.py`,
//! `ci/gitlab.py`, `ci/jenkins.py`. Out of scope for the core per §1
//! ("CI-platform adapters (stubs only)"); kept here as the capability
//! surface a front end could use to report results back to a platform,
//! not wired into the engine. Every concrete adapter below is a stub:
//! it returns `CiError::NotImplemented` for all four operations.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CiError {
    #[error("{platform} adapter does not implement {operation}")]
    NotImplemented {
        platform: &'static str,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CiError>;

/// Mirrors the dict `get_pipeline_status` returns in the original:
/// id/status/ref/sha/timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub id: String,
    pub status: String,
    pub git_ref: String,
    pub sha: String,
}

pub trait CiAdapter {
    /// Human-readable platform name, for logging.
    fn name(&self) -> &'static str;

    fn pipeline_status(&self, pipeline_id: &str) -> Result<PipelineStatus>;
    fn trigger_pipeline(&self, config: &HashMap<String, String>) -> Result<String>;
    fn cancel_pipeline(&self, pipeline_id: &str) -> Result<bool>;
    fn job_logs(&self, job_id: &str) -> Result<String>;
}

macro_rules! stub_adapter {
    ($ty:ident, $platform:literal) => {
        pub struct $ty;

        impl CiAdapter for $ty {
            fn name(&self) -> &'static str {
                $platform
            }

            fn pipeline_status(&self, _pipeline_id: &str) -> Result<PipelineStatus> {
                Err(CiError::NotImplemented {
                    platform: $platform,
                    operation: "pipeline_status",
                })
            }

            fn trigger_pipeline(&self, _config: &HashMap<String, String>) -> Result<String> {
                Err(CiError::NotImplemented {
                    platform: $platform,
                    operation: "trigger_pipeline",
                })
            }

            fn cancel_pipeline(&self, _pipeline_id: &str) -> Result<bool> {
                Err(CiError::NotImplemented {
                    platform: $platform,
                    operation: "cancel_pipeline",
                })
            }

            fn job_logs(&self, _job_id: &str) -> Result<String> {
                Err(CiError::NotImplemented {
                    platform: $platform,
                    operation: "job_logs",
                })
            }
        }
    };
}

stub_adapter!(GithubAdapter, "github");
stub_adapter!(GitlabAdapter, "gitlab");
stub_adapter!(JenkinsAdapter, "jenkins");

/// Picks an adapter by platform name as passed on the CLI; unrecognized
/// names fall through to `None` rather than erroring, since CI
/// reporting is an optional add-on, not part of the core contract.
pub fn adapter_for(platform: &str) -> Option<Box<dyn CiAdapter>> {
    match platform {
        "github" => Some(Box::new(GithubAdapter)),
        "gitlab" => Some(Box::new(GitlabAdapter)),
        "jenkins" => Some(Box::new(JenkinsAdapter)),
        _ => None,
    }
}
