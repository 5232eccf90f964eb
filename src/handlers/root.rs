//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let selection = if state.config.pids.is_empty() {
        format!("cmdline regexps: {}", state.config.cmdline_regexps.join(", "))
    } else {
        let pids: Vec<String> = state.config.pids.iter().map(u32::to_string).collect();
        format!("pids: {}", pids.join(", "))
    };

    let health_link = if state.config.enable_health.unwrap_or(true) {
        r#"<li><a href="/health">/health</a> - exporter internal statistics (text)</li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Process Stats Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; line-height: 1.6; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
        .footer {{ margin-top: 40px; color: #666; font-size: 0.9em; }}
    </style>
</head>
<body>
    <h1>Process Stats Exporter</h1>
    <p>Version <code>{version}</code>, uptime {uptime}</p>
    <p>Selection: <code>{selection}</code></p>
    <ul>
        <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
        {health_link}
    </ul>
    <div class="footer">{footer}</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        selection = html_escape(&selection),
        health_link = health_link,
        footer = FOOTER_TEXT
    );

    Html(html)
}

/// Escapes text for inclusion in HTML.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
