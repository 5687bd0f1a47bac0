use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::charts::{DueHistogram, PriorityBreakdown};
use crate::config::Config;
use crate::dashboard::{Notice, NoticeLevel};
use crate::task::{Priority, Status, Task, User};
use crate::view::{DerivedView, TaskStats, ViewCriteria};

const BAR_WIDTH: usize = 30;

/// Colour is decided per stream: tables go to stdout, notices to stderr,
/// and either may be redirected independently.
#[derive(Debug, Clone)]
pub struct Renderer {
    stdout_color: bool,
    stderr_color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self::for_streams(
            color,
            io::stdout().is_terminal(),
            io::stderr().is_terminal(),
        ))
    }

    pub fn for_streams(color: bool, stdout_tty: bool, stderr_tty: bool) -> Self {
        Self {
            stdout_color: color && stdout_tty,
            stderr_color: color && stderr_tty,
        }
    }

    pub fn plain() -> Self {
        Self::for_streams(false, false, false)
    }

    #[tracing::instrument(skip(self, view, criteria))]
    pub fn print_view(&self, view: &DerivedView, criteria: &ViewCriteria) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_view(&mut out, view, criteria)
    }

    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        view: &DerivedView,
        criteria: &ViewCriteria,
    ) -> anyhow::Result<()> {
        if view.is_empty() {
            if criteria.search_term.is_empty() && view.stats.total == 0 {
                writeln!(out, "No tasks yet. Create one with `taskdash add <title>`.")?;
            } else {
                writeln!(out, "No tasks match the current filter.")?;
            }
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Priority".to_string(),
            "Status".to_string(),
            "Due".to_string(),
        ];

        let rows = view
            .visible_tasks
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.id, "33"),
                    task.title.clone(),
                    self.paint_priority(task.priority),
                    self.paint_status(task.status),
                    due_label(task),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(
            out,
            "page {}/{} ({} tasks, filter: {}{})",
            view.page_number,
            view.total_pages,
            view.total_filtered,
            criteria.status_filter,
            if criteria.search_term.is_empty() {
                String::new()
            } else {
                format!(", search: \"{}\"", criteria.search_term)
            }
        )?;
        Ok(())
    }

    pub fn print_view_json(&self, view: &DerivedView) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, view)?;
        writeln!(out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description_or_empty())?;
        writeln!(out, "priority    {}", task.priority.label())?;
        writeln!(out, "status      {}", task.status)?;
        writeln!(out, "due         {}", due_label(task))?;
        for (key, value) in &task.extra {
            let rendered = match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            writeln!(out, "{key:<11} {rendered}")?;
        }

        Ok(())
    }

    pub fn print_stats(&self, stats: &TaskStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_stats(&mut out, stats)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(out, "total      {}", stats.total)?;
        writeln!(out, "active     {}", stats.active)?;
        writeln!(out, "completed  {}", stats.completed)?;
        writeln!(out, "due today  {}", stats.due_today)?;
        Ok(())
    }

    pub fn print_charts(
        &self,
        histogram: &DueHistogram,
        breakdown: &PriorityBreakdown,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_charts(&mut out, histogram, breakdown)
    }

    pub fn write_charts<W: Write>(
        &self,
        mut out: W,
        histogram: &DueHistogram,
        breakdown: &PriorityBreakdown,
    ) -> anyhow::Result<()> {
        writeln!(out, "Due in the next 7 days")?;
        let max = histogram.max_count();
        for bucket in &histogram.buckets {
            writeln!(
                out,
                "  {} {:>3} {}",
                bucket.date.format("%a %m-%d"),
                bucket.count,
                self.paint(&bar(bucket.count, max), "36")
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Priority distribution")?;
        let total = breakdown.total();
        for priority in Priority::ALL {
            let count = breakdown.get(priority);
            let share = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            writeln!(
                out,
                "  {:<6} {:>3} {:>5.1}% {}",
                priority.label(),
                count,
                share,
                self.paint(&bar(count, total), priority_color(priority))
            )?;
        }
        Ok(())
    }

    pub fn print_user(&self, user: &User) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "login       {}", user.login)?;
        writeln!(out, "id          {}", user.id)?;
        if let Some(created) = user.create_at.as_deref() {
            let day = created.get(..10).unwrap_or(created);
            writeln!(out, "registered  {day}")?;
        }
        Ok(())
    }

    pub fn print_health(&self, base_url: &str, health: Result<&str, &str>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        match health {
            Ok(status) => writeln!(
                out,
                "{} {base_url} ({status})",
                self.paint("online", "32")
            )?,
            Err(reason) => writeln!(
                out,
                "{} {base_url}: {reason}",
                self.paint("offline", "31")
            )?,
        }
        Ok(())
    }

    pub fn print_notices(&self, notices: &[Notice]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        self.write_notices(&mut err, notices)
    }

    /// Notices are painted for stderr.
    pub fn write_notices<W: Write>(&self, mut out: W, notices: &[Notice]) -> anyhow::Result<()> {
        for notice in notices {
            let (tag, code) = match notice.level {
                NoticeLevel::Success => ("ok", "32"),
                NoticeLevel::Error => ("error", "31"),
                NoticeLevel::Info => ("info", "36"),
            };
            writeln!(
                out,
                "[{}] {}",
                paint(self.stderr_color, tag, code),
                notice.message
            )?;
        }
        Ok(())
    }

    fn paint_priority(&self, priority: Priority) -> String {
        self.paint(priority.label(), priority_color(priority))
    }

    fn paint_status(&self, status: Status) -> String {
        match status {
            Status::Active => status.to_string(),
            Status::Completed => self.paint(status.as_str(), "90"),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        paint(self.stdout_color, text, code)
    }
}

fn paint(enabled: bool, text: &str, code: &str) -> String {
    if !enabled {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "32",
        Priority::Medium => "33",
        Priority::High => "31",
    }
}

fn due_label(task: &Task) -> String {
    task.due_date()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "no due date".to_string())
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let width = (count * BAR_WIDTH).div_ceil(max);
    "#".repeat(width)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
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

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
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
