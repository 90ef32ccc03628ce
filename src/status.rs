//! Terminal status rendering for a run.
//!
//! Presentational only, with no core decision logic: one line per plan
//! node, colorized by status, repainted in place by tracking how many
//! lines were written since the last pass. No commit-graph rendering
//! since Octopus has no revision history, only a fixed, known-up-front
//! plan of services and tests.

use std::io::Write;

use colored::Colorize;

use crate::engine::{ExecutionNode, Status};

pub struct Tracker<O: Write> {
    plan: Vec<String>,
    output: O,
    lines_written: usize,
}

impl<O: Write> Tracker<O> {
    pub fn new(plan: Vec<String>, output: O) -> Self {
        Self {
            plan,
            output,
            lines_written: 0,
        }
    }

    /// Repaints the full plan against the engine's current node map,
    /// clearing whatever this tracker printed last time first.
    pub fn repaint(&mut self, nodes: &std::collections::HashMap<String, ExecutionNode>) -> anyhow::Result<()> {
        for _ in 0..self.lines_written {
            write!(self.output, "\x1b[1A\x1b[2K")?;
        }

        let mut lines = 0;
        for name in &self.plan {
            let line = match nodes.get(name) {
                Some(node) => render_line(node),
                None => format!("{name} {}", "pending".dimmed()),
            };
            writeln!(self.output, "{line}")?;
            lines += 1;
        }
        self.output.flush()?;
        self.lines_written = lines;
        Ok(())
    }

    /// Final, non-repainting summary line: `K/N successful`.
    pub fn summarize(&mut self, nodes: &std::collections::HashMap<String, ExecutionNode>) -> anyhow::Result<()> {
        let total = self.plan.len();
        let successful = self
            .plan
            .iter()
            .filter(|n| nodes.get(*n).map(|node| node.status == Status::Success).unwrap_or(false))
            .count();
        let summary = format!("{successful}/{total} successful");
        let colored = if successful == total {
            summary.green()
        } else {
            summary.red()
        };
        writeln!(self.output, "{colored}")?;
        Ok(())
    }
}

fn render_line(node: &ExecutionNode) -> String {
    let status = match node.status {
        Status::Pending => "pending".dimmed(),
        Status::Running => "running".yellow(),
        Status::Success => "success".green(),
        Status::Failed => "failed".red(),
        Status::Skipped => "skipped".dimmed(),
    };
    match &node.error {
        Some(err) => format!("{} {status} — {err}", node.name),
        None => format!("{} {status}", node.name),
    }
}
