//! Terminal styling and the coordinator's end-of-run summary.

use crate::driver::RunSummary;
use std::fmt;
use std::io::{self, IsTerminal};

const ESC: &str = "\x1b[";
const RESET: &str = "\x1b[0m";

const BOX_WIDTH: usize = 46;

/// Check if stdout is a terminal that supports colors.
pub fn stdout_supports_color() -> bool {
    io::stdout().is_terminal() && !no_color_env()
}

/// Check if stderr is a terminal that supports colors.
pub fn stderr_supports_color() -> bool {
    io::stderr().is_terminal() && !no_color_env()
}

fn no_color_env() -> bool {
    std::env::var_os("NO_COLOR").is_some()
}

/// A string with optional ANSI color and bold.
#[derive(Debug, Clone)]
pub struct Styled {
    content: String,
    color: Option<&'static str>,
    bold: bool,
    enabled: bool,
}

impl Styled {
    pub fn new(content: impl Into<String>, enabled: bool) -> Self {
        Self {
            content: content.into(),
            color: None,
            bold: false,
            enabled,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn red(mut self) -> Self {
        self.color = Some("31");
        self
    }

    pub fn green(mut self) -> Self {
        self.color = Some("32");
        self
    }

    pub fn yellow(mut self) -> Self {
        self.color = Some("33");
        self
    }

    pub fn cyan(mut self) -> Self {
        self.color = Some("36");
        self
    }

    /// Visible width, escape codes excluded.
    pub fn width(&self) -> usize {
        self.content.chars().count()
    }
}

impl fmt::Display for Styled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled || (self.color.is_none() && !self.bold) {
            return f.write_str(&self.content);
        }
        let codes: Vec<&str> = self.bold.then_some("1").into_iter().chain(self.color).collect();
        write!(f, "{}{}m{}{}", ESC, codes.join(";"), self.content, RESET)
    }
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    let enabled = stderr_supports_color();
    eprintln!("{} {}", Styled::new("\u{2717}", enabled).red().bold(), message);
}

/// Format a byte count with a binary unit.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Render the summary box as lines.
pub fn render_summary(summary: &RunSummary, color: bool) -> Vec<String> {
    let inner = BOX_WIDTH - 2;
    let rule: String = "\u{2500}".repeat(inner);
    let row = |cell: Styled| {
        let pad = inner.saturating_sub(cell.width());
        format!("\u{2502}{}{:pad$}\u{2502}", cell, "", pad = pad)
    };

    let title = "Run Complete";
    let left = (inner - title.len()) / 2;
    let mut lines = vec![
        format!("\u{256D}{rule}\u{256E}"),
        format!(
            "\u{2502}{:left$}{}{:right$}\u{2502}",
            "",
            Styled::new(title, color).bold(),
            "",
            left = left,
            right = inner - left - title.len()
        ),
        format!("\u{251C}{rule}\u{2524}"),
    ];

    let ops = summary.images * crate::filters::Operation::ALL.len();
    let done = ops.saturating_sub(summary.failures);
    lines.push(row(Styled::new(
        format!("  \u{2713} Outputs:    {done} of {ops}"),
        color,
    )
    .green()));
    if summary.failures > 0 {
        lines.push(row(Styled::new(
            format!("  \u{2717} Failed:     {} operations", summary.failures),
            color,
        )
        .red()));
    }
    if summary.failed_workers > 0 {
        lines.push(row(Styled::new(
            format!("  \u{26A0} Lost ranks: {}", summary.failed_workers),
            color,
        )
        .yellow()));
    }
    lines.push(row(Styled::new("", color)));

    let report = &summary.report;
    for text in [
        format!(
            "  Ranks: {}  Threads: {}  Kernel: {}",
            summary.processes, summary.threads, summary.kernel_size
        ),
        format!("  Bytes moved: {}", format_size(report.total_bytes())),
        format!("  Time: {:.3}s", report.elapsed_secs),
        format!("  Global MIPS: {:.2}", report.mips()),
    ] {
        lines.push(row(Styled::new(text, color)));
    }
    lines.push(row(Styled::new(
        format!("  Report: {}", summary.report_path.display()),
        color,
    )
    .cyan()));

    lines.push(format!("\u{2570}{rule}\u{256F}"));
    lines
}

/// Print the summary box to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!();
    for line in render_summary(summary, stdout_supports_color()) {
        println!("{line}");
    }
}
