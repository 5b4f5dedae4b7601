//! HTML report renderer.
//!
//! Produces a self-contained HTML file with the CSS inlined and the radar
//! chart drawn as inline SVG.

use anyhow::Result;

use crate::document::{DocumentRenderer, ReportDocument};
use crate::insights::InsightBand;
use crate::radar::RadarGeometry;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Escaped text with line breaks kept.
fn paragraphs(s: &str) -> String {
    html_escape(s).replace('\n', "<br>\n")
}

/// Renders a [`ReportDocument`] as a standalone HTML page.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl DocumentRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>> {
        Ok(generate_html(document).into_bytes())
    }
}

/// Generate the HTML page of a report document.
pub fn generate_html(doc: &ReportDocument) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>{} report</title>\n",
        html_escape(&doc.test_title)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&doc.test_title)));
    html.push_str(&format!(
        "<p class=\"meta\">Result #{} | user {} | {}</p>\n",
        doc.result_id, doc.user_id, doc.status
    ));
    html.push_str("</header>\n");

    // Overall scores
    html.push_str("<section>\n<h2>Test Scores</h2>\n");
    html.push_str("<table class=\"summary\">\n<tbody>\n");
    html.push_str(&format!(
        "<tr><th>Total Score</th><td>{:.2}</td></tr>\n",
        doc.total_score
    ));
    html.push_str(&format!(
        "<tr><th>Average Score</th><td>{:.2}</td></tr>\n",
        doc.average_score
    ));
    html.push_str(&format!(
        "<tr><th>Overall</th><td>{}</td></tr>\n",
        doc.overall_category
    ));
    html.push_str("</tbody></table>\n");
    if doc.sdb_flag {
        html.push_str(
            "<p class=\"flag\">Responses show a strong social desirability pattern; interpret with care.</p>\n",
        );
    }
    html.push_str("</section>\n");

    // Clusters
    if !doc.clusters.is_empty() {
        html.push_str("<section>\n<h2>Cluster Scores</h2>\n");
        if let Some(radar) = &doc.radar {
            html.push_str(&generate_radar_svg(radar));
        }
        html.push_str("<table class=\"results-table\">\n");
        html.push_str("<thead><tr><th>Cluster</th><th>Average</th><th>Percentage</th><th>Band</th><th>What it looks like</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for c in &doc.clusters {
            let class = match c.insight.band {
                InsightBand::High => "high",
                InsightBand::Medium => "medium",
                InsightBand::Low => "low",
            };
            html.push_str(&format!(
                "<tr><td>{}</td><td>{:.2}</td><td>{}%</td><td class=\"{}\">{}</td><td>{}</td></tr>\n",
                html_escape(&c.insight.name),
                c.insight.average,
                c.insight.percentage,
                class,
                c.insight.band,
                c.behaviour.as_deref().map(html_escape).unwrap_or_default()
            ));
        }
        html.push_str("</tbody></table>\n");
        html.push_str("</section>\n");
    }

    // Constructs
    if !doc.constructs.is_empty() {
        html.push_str("<section>\n<h2>Construct Scores</h2>\n");
        html.push_str("<table class=\"results-table\">\n");
        html.push_str("<thead><tr><th>Construct</th><th>Average</th><th>Band</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for c in &doc.constructs {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{:.2}</td><td>{}</td></tr>\n",
                html_escape(&c.name),
                c.average,
                c.band
            ));
        }
        html.push_str("</tbody></table>\n");
        html.push_str("</section>\n");
    }

    // Narrative
    html.push_str("<section>\n<h2>Report Summary</h2>\n");
    match &doc.summary {
        Some(summary) if !summary.trim().is_empty() => {
            html.push_str(&format!("<p>{}</p>\n", paragraphs(summary)));
        }
        _ => html.push_str("<p class=\"no-content\">Report content will be available soon.</p>\n"),
    }
    html.push_str("</section>\n");
    if let Some(recommendations) = doc.recommendations.as_deref().filter(|r| !r.trim().is_empty()) {
        html.push_str("<section>\n<h2>Recommendations</h2>\n");
        html.push_str(&format!("<p>{}</p>\n", paragraphs(recommendations)));
        html.push_str("</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(doc)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str(&format!(
        "<footer>Generated on {}</footer>\n",
        doc.generated_at.format("%B %d, %Y at %H:%M UTC")
    ));
    html.push_str("</body>\n</html>");
    html
}

fn generate_radar_svg(radar: &RadarGeometry) -> String {
    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        radar.width, radar.height
    );

    for circle in &radar.circles {
        svg.push_str(&format!(
            "  <circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"#d1d5db\"/>\n",
            radar.center.x, radar.center.y, circle.r
        ));
    }
    for axis in &radar.axes {
        svg.push_str(&format!(
            "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#9ca3af\"/>\n",
            axis.start.x, axis.start.y, axis.end.x, axis.end.y
        ));
    }
    svg.push_str(&format!(
        "  <polygon points=\"{}\" fill=\"rgba(54, 162, 235, 0.2)\" stroke=\"rgba(54, 162, 235, 1)\" stroke-width=\"2\"/>\n",
        radar.polygon_points
    ));
    for label in &radar.labels {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" text-anchor=\"{}\" dominant-baseline=\"middle\">{} ({}%)</text>\n",
            label.position.x,
            label.position.y,
            label.anchor.as_str(),
            html_escape(&label.text),
            label.percentage
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --high: #dcfce7; --medium: #fef9c3; --low: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --high: #064e3b; --medium: #713f12; --low: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta, footer { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.high { background: var(--high); }
.medium { background: var(--medium); }
.low { background: var(--low); }
.flag { font-weight: bold; }
.no-content { color: #999; font-style: italic; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
footer { margin-top: 2rem; font-size: 0.8rem; }
"#;
