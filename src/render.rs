//! Digest rendering: subject line, HTML and plain-text bodies.
//!
//! Everything here is presentation; the buckets and counts come from
//! [`crate::digest::partition`].

use chrono::{DateTime, Datelike, FixedOffset, Weekday};

use crate::digest::{Digest, PendingTask};
use crate::urgency::Tier;

/// Presentation options that do not come from the digest itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub dashboard_url: Option<String>,
    pub banner_weekday: Option<Weekday>,
    pub banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render `digest` as seen at `now`; times are shown in `now`'s offset.
pub fn render(digest: &Digest, now: DateTime<FixedOffset>, options: &RenderOptions) -> RenderedDigest {
    let banner = active_banner(now, options);
    RenderedDigest {
        subject: subject(digest, now, banner),
        text: text_body(digest, now, banner, options),
        html: html_body(digest, now, banner, options),
    }
}

fn active_banner<'a>(now: DateTime<FixedOffset>, options: &'a RenderOptions) -> Option<&'a str> {
    match (options.banner_weekday, options.banner.as_deref()) {
        (Some(day), Some(text)) if now.weekday() == day => Some(text),
        _ => None,
    }
}

pub fn subject(digest: &Digest, now: DateTime<FixedOffset>, banner: Option<&str>) -> String {
    let day = now.format("%a %b %d");
    if let Some(banner) = banner {
        return format!("📅 {banner} — {day}");
    }
    if digest.due_within_24h > 0 {
        return format!(
            "⚠️ {} assignment(s) due soon — {day}",
            digest.due_within_24h
        );
    }
    format!("☀️ Daily DDL Digest — {day} ({} pending)", digest.pending())
}

fn tier_color(tier: Tier) -> &'static str {
    match tier {
        Tier::Urgent => "#e53e3e",
        Tier::Tomorrow | Tier::Near => "#dd6b20",
        Tier::Week => "#d69e2e",
        Tier::Later => "#38a169",
    }
}

fn tier_marker(tier: Tier) -> &'static str {
    match tier {
        Tier::Urgent => "⚠️",
        Tier::Tomorrow => "🔴",
        Tier::Near => "🟠",
        Tier::Week => "🟡",
        Tier::Later => "🟢",
    }
}

fn due_display(task: &PendingTask, now: DateTime<FixedOffset>) -> String {
    task.due_at
        .with_timezone(&now.timezone())
        .format("%b %d, %H:%M")
        .to_string()
}

fn text_body(
    digest: &Digest,
    now: DateTime<FixedOffset>,
    banner: Option<&str>,
    options: &RenderOptions,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Daily DDL Digest — {}", now.format("%A, %b %d")));
    lines.push(format!(
        "{} pending · {} due within 24h",
        digest.pending(),
        digest.due_within_24h
    ));
    if let Some(banner) = banner {
        lines.push(String::new());
        lines.push(format!("📅 {banner}"));
    }

    for (title, tasks) in [("Due This Week", &digest.soon), ("Coming Up Later", &digest.later)] {
        lines.push(String::new());
        lines.push(format!("{title}:"));
        if tasks.is_empty() {
            lines.push("- Nothing here!".to_string());
        }
        for task in tasks.iter() {
            lines.push(format!(
                "- [{}] {} ({}) · {} · due {}",
                task.urgency.label,
                task.record.title,
                task.record.course,
                task.record.source,
                due_display(task, now)
            ));
        }
    }

    if let Some(url) = &options.dashboard_url {
        lines.push(String::new());
        lines.push(format!("Mark tasks complete: {url}"));
    }

    lines.join("\n")
}

fn html_table(tasks: &[PendingTask], now: DateTime<FixedOffset>) -> String {
    if tasks.is_empty() {
        return "<p style=\"color:#a0aec0;text-align:center;padding:20px 0;\">🎉 Nothing here!</p>"
            .to_string();
    }

    let cell = "padding:10px 12px;border-bottom:1px solid #e2e8f0;";
    let mut rows = String::new();
    for task in tasks {
        let title = html_escape(&task.record.title);
        let link = match &task.record.url {
            Some(url) if !url.is_empty() => format!(
                "<a href=\"{}\" style=\"color:#3182ce;text-decoration:none;\">{title}</a>",
                html_escape(url)
            ),
            _ => title,
        };
        let (badge_bg, badge_fg) = if task.record.source == "PrairieLearn" {
            ("#f0fff4", "#276749")
        } else {
            ("#ebf8ff", "#2b6cb0")
        };
        rows.push_str(&format!(
            "<tr>\
<td style=\"{cell}\">{link}</td>\
<td style=\"{cell}color:#718096;font-size:13px;\">{course}</td>\
<td style=\"{cell}font-weight:600;color:{color};\">{marker} {label}</td>\
<td style=\"{cell}color:#718096;font-size:13px;\">{due}</td>\
<td style=\"{cell}\"><span style=\"background:{badge_bg};color:{badge_fg};padding:2px 8px;border-radius:9999px;font-size:12px;\">{source}</span></td>\
</tr>",
            course = html_escape(&task.record.course),
            color = tier_color(task.urgency.tier),
            marker = tier_marker(task.urgency.tier),
            label = html_escape(&task.urgency.label),
            due = due_display(task, now),
            source = html_escape(&task.record.source),
        ));
    }

    let head = "padding:10px 12px;text-align:left;color:#4a5568;";
    format!(
        "<table style=\"width:100%;border-collapse:collapse;font-size:14px;\">\
<thead><tr style=\"background:#f7fafc;\">\
<th style=\"{head}\">Assignment</th><th style=\"{head}\">Course</th>\
<th style=\"{head}\">Urgency</th><th style=\"{head}\">Due</th>\
<th style=\"{head}\">Source</th></tr></thead>\
<tbody>{rows}</tbody></table>"
    )
}

fn html_body(
    digest: &Digest,
    now: DateTime<FixedOffset>,
    banner: Option<&str>,
    options: &RenderOptions,
) -> String {
    let banner_html = banner
        .map(|text| {
            format!(
                "<div style=\"background:#fff5f5;border-left:4px solid #e53e3e;padding:14px 20px;margin-bottom:20px;border-radius:4px;\">\
<strong style=\"color:#c53030;\">📅 {}</strong></div>",
                html_escape(text)
            )
        })
        .unwrap_or_default();

    let dashboard_html = options
        .dashboard_url
        .as_deref()
        .map(|url| {
            format!(
                "<p style=\"margin-top:24px;font-size:13px;color:#a0aec0;text-align:center;\">\
✅ Mark tasks complete on your <a href=\"{}\" style=\"color:#667eea;\">DDL Dashboard</a> \
— completed tasks won't appear in future emails.</p>",
                html_escape(url)
            )
        })
        .unwrap_or_default();

    let stat = |value: usize, color: &str, label: &str| {
        format!(
            "<div><div style=\"font-size:26px;font-weight:700;color:{color};\">{value}</div>\
<div style=\"font-size:12px;color:#718096;\">{label}</div></div>"
        )
    };

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head>\
<body style=\"margin:0;padding:0;background:#f7fafc;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;\">\
<div style=\"max-width:740px;margin:24px auto;background:white;border-radius:12px;overflow:hidden;\">\
<div style=\"background:linear-gradient(135deg,#667eea,#764ba2);padding:24px 32px;\">\
<h1 style=\"margin:0;color:white;font-size:20px;\">☀️ Daily DDL Digest — {title_day}</h1>\
<p style=\"margin:5px 0 0;color:rgba(255,255,255,0.8);font-size:13px;\">{pending} pending assignments · {within} due within 24h</p>\
</div>\
<div style=\"display:flex;padding:16px 32px;background:#f8f9ff;border-bottom:1px solid #e2e8f0;gap:40px;\">{s_pending}{s_soon}{s_later}</div>\
<div style=\"padding:20px 32px 32px;\">{banner_html}\
<h2 style=\"color:#2d3748;font-size:15px;margin:0 0 8px;\">🔥 Due This Week</h2>{soon}\
<h2 style=\"color:#2d3748;font-size:15px;margin:28px 0 8px;\">📆 Coming Up Later</h2>{later}\
{dashboard_html}</div>\
<div style=\"padding:14px 32px;background:#f7fafc;border-top:1px solid #e2e8f0;text-align:center;color:#a0aec0;font-size:12px;\">Auto-generated {generated}</div>\
</div></body></html>",
        title_day = now.format("%A, %b %d"),
        pending = digest.pending(),
        within = digest.due_within_24h,
        s_pending = stat(digest.pending(), "#667eea", "Pending"),
        s_soon = stat(digest.soon.len(), "#e53e3e", "This week"),
        s_later = stat(digest.later.len(), "#38a169", "Later"),
        soon = html_table(&digest.soon, now),
        later = html_table(&digest.later, now),
        generated = now.format("%Y-%m-%d %H:%M %:z"),
    )
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
