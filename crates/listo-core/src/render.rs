use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::store::Summary;
use crate::task::Task;

pub const ACTIVE_TITLE: &str = "Tasks";
pub const ACTIVE_EMPTY: &str = "No tasks yet! Add some.";
pub const DELETED_TITLE: &str = "Deleted tasks";
pub const DELETED_EMPTY: &str = "No deleted tasks.";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.trim().to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Title first, then either the table or the empty-state line.
    pub fn write_task_list<W: Write>(
        &self,
        mut out: W,
        title: &str,
        tasks: &[&Task],
        empty_message: &str,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(title, "1"))?;
        if tasks.is_empty() {
            writeln!(out, "{empty_message}")?;
            return Ok(());
        }

        let headers = vec!["ID".to_string(), "Done".to_string(), "Text".to_string()];
        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed { "✓" } else { " " };
                let text = if task.completed {
                    self.paint(&task.text, "2;9")
                } else {
                    task.text.clone()
                };
                vec![self.paint(task.id.as_str(), "33"), done.to_string(), text]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    pub fn write_summary<W: Write>(&self, mut out: W, summary: Summary) -> anyhow::Result<()> {
        writeln!(
            out,
            "Total: {} | Completed: {} | Pending: {}",
            summary.total, summary.completed, summary.pending
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
