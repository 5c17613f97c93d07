//! Progress Renderer (§4.H): differential ANSI redraw of step + nested task
//! status on a TTY, a single initial render with no diffing otherwise.

use std::collections::HashMap;
use std::io::{IsTerminal, Write};

const ICON_PENDING: &str = "○";
const ICON_RUNNING: &str = "◐";
const ICON_DONE: &str = "✓";
const ICON_FAILED: &str = "✗";
const NAME_COL: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl Status {
    fn icon(self) -> &'static str {
        match self {
            Status::Pending | Status::Skipped => ICON_PENDING,
            Status::Running => ICON_RUNNING,
            Status::Done => ICON_DONE,
            Status::Failed => ICON_FAILED,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
struct NestedTask {
    id: String,
    status: Status,
    duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct StepLine {
    status: Status,
    duration_ms: Option<u64>,
    nested: Vec<NestedTask>,
    show_nested: bool,
}

/// A single state transition the scheduler reports to the renderer.
pub struct StepUpdate<'a> {
    pub name: &'a str,
    pub status: Status,
    pub duration_ms: Option<u64>,
}

/// Differential TTY redraw of step + nested task trees. Driven exclusively
/// from the scheduler's control thread via `update`/`update_nested`.
pub struct Renderer {
    order: Vec<String>,
    lines: HashMap<String, StepLine>,
    rendered_line_count: usize,
    is_tty: bool,
    initial_rendered: bool,
    color: bool,
}

impl Renderer {
    pub fn new(step_names: &[String], color: bool) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        let lines = step_names
            .iter()
            .map(|n| {
                (
                    n.clone(),
                    StepLine {
                        status: Status::Pending,
                        duration_ms: None,
                        nested: Vec::new(),
                        show_nested: false,
                    },
                )
            })
            .collect();
        Self {
            order: step_names.to_vec(),
            lines,
            rendered_line_count: 0,
            is_tty,
            initial_rendered: false,
            color,
        }
    }

    /// Register the nested tasks a workspace-script step will run, all
    /// starting `pending`.
    pub fn register_nested(&mut self, step_name: &str, task_ids: &[String]) {
        if let Some(line) = self.lines.get_mut(step_name) {
            line.nested = task_ids
                .iter()
                .map(|id| NestedTask { id: id.clone(), status: Status::Pending, duration_ms: None })
                .collect();
            line.show_nested = true;
        }
    }

    pub fn update_nested(&mut self, step_name: &str, task_id: &str, status: Status, duration_ms: Option<u64>) {
        if let Some(line) = self.lines.get_mut(step_name)
            && let Some(task) = line.nested.iter_mut().find(|t| t.id == task_id)
        {
            task.status = status;
            task.duration_ms = duration_ms;
        }
    }

    /// Apply a step-level transition, then redraw (or print once).
    pub fn update(&mut self, update: StepUpdate) {
        if let Some(line) = self.lines.get_mut(update.name) {
            line.status = update.status;
            line.duration_ms = update.duration_ms;
            if matches!(update.status, Status::Done | Status::Failed) {
                line.show_nested = false;
            }
        }
        self.render();
    }

    fn render(&mut self) {
        let new_lines = self.build_lines();

        if !self.is_tty {
            if !self.initial_rendered {
                for line in &new_lines {
                    println!("{line}");
                }
                self.initial_rendered = true;
            }
            return;
        }

        let mut out = std::io::stdout();
        if !self.initial_rendered {
            let _ = write!(out, "\x1b[?25l");
            for line in &new_lines {
                let _ = writeln!(out, "{line}");
            }
            self.initial_rendered = true;
            self.rendered_line_count = new_lines.len();
            let _ = out.flush();
            return;
        }

        let _ = write!(out, "\x1b[{}A", self.rendered_line_count);
        for line in &new_lines {
            let _ = write!(out, "\x1b[2K\r{line}\n");
        }
        if new_lines.len() < self.rendered_line_count {
            let blank = self.rendered_line_count - new_lines.len();
            for _ in 0..blank {
                let _ = write!(out, "\x1b[2K\r\n");
            }
            let _ = write!(out, "\x1b[{blank}A");
        }
        self.rendered_line_count = new_lines.len();
        let _ = out.flush();
    }

    fn build_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in &self.order {
            let Some(line) = self.lines.get(name) else { continue };
            out.push(format_step_line(name, line, self.color));
            if line.show_nested {
                for task in &line.nested {
                    out.push(format_nested_line(task, self.color));
                }
            }
        }
        out
    }

    /// Finish the run: ensure the cursor is visible again.
    pub fn finish(&mut self) {
        if self.is_tty {
            print!("\x1b[?25h");
            let _ = std::io::stdout().flush();
        }
    }
}

fn format_step_line(name: &str, line: &StepLine, color: bool) -> String {
    let icon = line.status.icon();
    let padded = if name.len() >= NAME_COL { name.to_string() } else { format!("{name:<NAME_COL$}") };
    let suffix = match (line.status, line.duration_ms) {
        (Status::Done, Some(ms)) | (Status::Failed, Some(ms)) => format!("{} ({})", line.status.label(), format_duration(ms)),
        _ => line.status.label().to_string(),
    };
    let text = format!("{icon} {padded} {suffix}");
    if color { colorize(&text, line.status) } else { text }
}

fn format_nested_line(task: &NestedTask, color: bool) -> String {
    let icon = task.status.icon();
    let suffix = match task.duration_ms {
        Some(ms) => format!("{} ({})", task.status.label(), format_duration(ms)),
        None => task.status.label().to_string(),
    };
    let text = format!("    {icon} {} {suffix}", task.id);
    if color { colorize(&text, task.status) } else { text }
}

fn colorize(text: &str, status: Status) -> String {
    match status {
        Status::Done => console::style(text).green().to_string(),
        Status::Failed => console::style(text).red().to_string(),
        Status::Running => console::style(text).yellow().to_string(),
        _ => console::style(text).dim().to_string(),
    }
}

/// `<1000ms -> "%dms"`, else `"%.2fs"`.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 { format!("{ms}ms") } else { format!("{:.2}s", ms as f64 / 1000.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1000), "1.00s");
        assert_eq!(format_duration(2500), "2.50s");
    }

    #[test]
    fn line_contains_icon_and_name() {
        let names = vec!["lint".to_string()];
        let mut r = Renderer::new(&names, false);
        r.lines.get_mut("lint").unwrap().status = Status::Running;
        let lines = r.build_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(ICON_RUNNING));
        assert!(lines[0].contains("lint"));
    }

    #[test]
    fn done_line_contains_duration() {
        let names = vec!["build".to_string()];
        let mut r = Renderer::new(&names, false);
        {
            let line = r.lines.get_mut("build").unwrap();
            line.status = Status::Done;
            line.duration_ms = Some(1500);
        }
        let lines = r.build_lines();
        assert!(lines[0].contains(ICON_DONE));
        assert!(lines[0].contains("1.50s"));
    }

    #[test]
    fn collapsing_nested_on_settle() {
        let names = vec!["build".to_string()];
        let mut r = Renderer::new(&names, false);
        r.register_nested("build", &["a#build".to_string()]);
        assert!(r.lines["build"].show_nested);
        r.update(StepUpdate { name: "build", status: Status::Done, duration_ms: Some(10) });
        assert!(!r.lines["build"].show_nested);
    }
}
