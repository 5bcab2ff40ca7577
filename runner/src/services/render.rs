//! HTML rendering of an execution log for notification mail and preview.

use crate::database::{ExecStatus, ExecutionLogRecord};

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn status_color(status: ExecStatus) -> &'static str {
    match status {
        ExecStatus::Success => "#2e7d32",
        ExecStatus::Running => "#1565c0",
        ExecStatus::Timeout => "#ef6c00",
        ExecStatus::Fail | ExecStatus::Error => "#c62828",
    }
}

/// `850ms`, `12.3s`, `4m 05s`, `2h 03m`
pub fn format_duration(duration_ms: Option<i64>) -> String {
    let Some(ms) = duration_ms else {
        return "-".to_string();
    };
    if ms < 1000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1000;
    if secs < 60 {
        return format!("{:.1}s", ms as f64 / 1000.0);
    }
    if secs < 3600 {
        return format!("{}m {:02}s", secs / 60, secs % 60);
    }
    format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
}

pub fn subject(job_name: &str, log: &ExecutionLogRecord) -> String {
    format!("[{}] cron job {} (run #{})", log.status, job_name, log.id)
}

pub fn render_execution_log(job_name: &str, log: &ExecutionLogRecord) -> String {
    let row = |label: &str, value: &str| {
        format!(
            "<tr><td style=\"padding:4px 12px;color:#555\">{}</td><td style=\"padding:4px 12px\">{}</td></tr>",
            label,
            escape_html(value)
        )
    };
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let block = |title: &str, text: Option<&str>| match text.filter(|t| !t.is_empty()) {
        Some(text) => format!(
            "<h4>{}</h4><pre style=\"background:#f5f5f5;padding:8px;white-space:pre-wrap\">{}</pre>",
            title,
            escape_html(text)
        ),
        None => String::new(),
    };

    let mut html = String::new();
    html.push_str("<html><body style=\"font-family:sans-serif\">");
    html.push_str(&format!(
        "<h3>{} <span style=\"color:{}\">{}</span></h3>",
        escape_html(job_name),
        status_color(log.status),
        log.status
    ));
    html.push_str("<table>");
    html.push_str(&row("Run", &log.id.to_string()));
    html.push_str(&row("Target", &log.connect_info));
    html.push_str(&row("Script", log.script_name.as_deref().unwrap_or("-")));
    html.push_str(&row("Arguments", log.args_text.as_deref().unwrap_or("-")));
    html.push_str(&row("Started", &time(log.start_time)));
    html.push_str(&row("Finished", &time(log.end_time)));
    html.push_str(&row("Duration", &format_duration(log.duration_ms)));
    html.push_str(&row(
        "Exit code",
        &log.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
    ));
    html.push_str("</table>");
    html.push_str(&block("Output", log.output_text.as_deref()));
    html.push_str(&block("Errors", log.error_text.as_deref()));
    html.push_str("</body></html>");
    html
}
