//! Plain-text rendering of a [`BatchReport`].

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use colored::{Color, Colorize};

use crate::config::{CERT_FAIR_DAYS, CERT_GOOD_DAYS, HANDSHAKE_FAIR_MS, HANDSHAKE_GOOD_MS};
use crate::models::{Detector, DetectionResult};
use crate::report::BatchReport;
use crate::scoring;

const COLUMNS: [&str; 8] = [
    "Final domain",
    "Basics",
    "Handshake",
    "Cert days",
    "CDN",
    "Hot",
    "Rating",
    "Page",
];

/// One table cell: its plain text and an optional color.
struct Cell {
    text: String,
    color: Option<Color>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

/// Human-friendly duration: `850µs`, `12ms`, `3.25s`, `2m5s`.
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_millis(1) {
        format!("{}µs", d.as_micros())
    } else if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else if d < Duration::from_secs(60) {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}

/// Renders the report as text. `color` enables ANSI colors.
pub fn render_text(report: &BatchReport, color: bool) -> String {
    let mut out = String::new();
    let stats = &report.statistics;
    let summary = &report.summary;

    let _ = writeln!(out, "{}", paint("Batch check report", Some(Color::Cyan), color));
    let _ = writeln!(
        out,
        "Checked {} domain(s) in {}: {} suitable, {} unsuitable, {} excluded",
        stats.total_domains,
        format_duration(report.total_duration),
        report.suitable().len(),
        report.unsuitable().len(),
        report.excluded().len(),
    );
    let _ = writeln!(
        out,
        "Success rate {:.1}%, suitability rate {:.1}%, blocking rate {:.1}%",
        summary.success_rate * 100.0,
        summary.suitability_rate * 100.0,
        summary.blocking_rate * 100.0,
    );

    let suitable = report.suitable();
    if !suitable.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", paint("Suitable domains:", Some(Color::Green), color));
        let rows: Vec<Vec<Cell>> = suitable.into_iter().map(suitable_row).collect();
        out.push_str(&render_table(&rows, color));
    }

    let unsuitable = report.unsuitable();
    if !unsuitable.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}",
            paint(
                &format!("Unsuitable domains ({}):", unsuitable.len()),
                Some(Color::Yellow),
                color
            )
        );
        for (reason, count) in grouped_reasons(&unsuitable) {
            let _ = writeln!(out, "   - {count}× {reason}");
        }
    }

    let excluded = report.excluded();
    if !excluded.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}",
            paint(
                &format!("Excluded status codes ({}):", excluded.len()),
                Some(Color::Red),
                color
            )
        );
        let mut codes: BTreeMap<u16, usize> = BTreeMap::new();
        for result in &excluded {
            let code = result.network.as_ref().map_or(0, |n| n.status_code);
            *codes.entry(code).or_default() += 1;
        }
        for (code, count) in codes {
            let _ = writeln!(out, "   - {count}× status code {code}");
        }
    }

    for warning in &summary.warnings {
        let _ = writeln!(out, "{} {warning}", paint("warning:", Some(Color::Yellow), color));
    }
    out
}

/// Unsuitable reasons with counts, most frequent first, ties by reason.
fn grouped_reasons(results: &[&DetectionResult]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        let reason = match &result.error {
            Some(error) => error.reason(),
            None if !result.hard_requirements_met => "missing TLS 1.3, X25519, HTTP/2 or SNI match".to_string(),
            None => "not suitable".to_string(),
        };
        *counts.entry(reason).or_default() += 1;
    }
    let mut grouped: Vec<_> = counts.into_iter().collect();
    grouped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    grouped
}

fn suitable_row(result: &DetectionResult) -> Vec<Cell> {
    let basics = if result.hard_requirements_met {
        Cell::colored("✓", Color::Green)
    } else {
        Cell::colored("✗", Color::Red)
    };

    let handshake = match &result.tls {
        Some(tls) if result.is_detector_executed(Detector::Tls) => {
            let ms = tls.handshake_time.as_millis();
            let color = if ms <= HANDSHAKE_GOOD_MS {
                Color::Green
            } else if ms <= HANDSHAKE_FAIR_MS {
                Color::Yellow
            } else {
                Color::Red
            };
            Cell::colored(format!("{ms}ms"), color)
        }
        _ => Cell::plain("invalid"),
    };

    let cert = match &result.certificate {
        Some(cert) if cert.valid => {
            let color = if cert.days_until_expiry >= CERT_GOOD_DAYS {
                Color::Green
            } else if cert.days_until_expiry >= CERT_FAIR_DAYS {
                Color::Yellow
            } else {
                Color::Red
            };
            Cell::colored(cert.days_until_expiry.to_string(), color)
        }
        _ => Cell::colored("invalid", Color::Red),
    };

    let (cdn, hot) = match &result.cdn {
        Some(cdn) if result.is_detector_executed(Detector::Cdn) => {
            let label = match (cdn.is_cdn, cdn.confidence) {
                (true, Some(confidence)) => Cell::colored(confidence.to_string(), Color::Yellow),
                (true, None) => Cell::colored("yes", Color::Yellow),
                (false, _) => Cell::colored("none", Color::Green),
            };
            let hot = if cdn.is_hot_website {
                Cell::plain("✓")
            } else {
                Cell::plain("-")
            };
            (label, hot)
        }
        _ => (Cell::plain("invalid"), Cell::plain("invalid")),
    };

    let page = match &result.page_status {
        Some(page) if page.is_accessible => {
            let color = match page.status_code {
                200 => Color::Green,
                301 | 302 => Color::Yellow,
                404 => Color::Blue,
                _ => Color::Red,
            };
            Cell::colored(page.status_code.to_string(), color)
        }
        _ => Cell::colored("unreachable", Color::Red),
    };

    vec![
        Cell::plain(result.final_domain()),
        basics,
        handshake,
        cert,
        cdn,
        hot,
        Cell::plain(scoring::recommendation(result).to_string()),
        page,
    ]
}

fn render_table(rows: &[Vec<Cell>], color: bool) -> String {
    let mut widths: Vec<usize> = COLUMNS.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.text.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = COLUMNS
        .iter()
        .zip(&widths)
        .map(|(name, width)| pad(name, *width))
        .collect();
    let _ = writeln!(out, "  {}", paint(&header.join("  "), None, color));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "  {}", rule.join("  "));

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| paint(&pad(&cell.text, *width), cell.color, color))
            .collect();
        let _ = writeln!(out, "  {}", line.join("  ").trim_end());
    }
    out
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.chars().count());
    format!("{text}{}", " ".repeat(fill))
}

fn paint(text: &str, color: Option<Color>, enabled: bool) -> String {
    match color {
        Some(color) if enabled => text.color(color).to_string(),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ProbeError;
    use crate::models::{
        CdnResult, CertificateResult, NetworkResult, PageStatusResult, SniResult, StatusCodeCategory,
        TlsResult,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn suitable(domain: &str, handshake_ms: u64) -> DetectionResult {
        let mut result = DetectionResult::new(domain, 0);
        result.network = Some(NetworkResult {
            accessible: true,
            status_code: 200,
            final_domain: domain.to_string(),
            redirect_chain: Vec::new(),
            is_redirected: false,
            redirect_count: 0,
            url: format!("https://{domain}/"),
            response_time: Duration::from_millis(50),
            handshake_time: Duration::ZERO,
            headers: BTreeMap::new(),
        });
        result.tls = Some(TlsResult {
            protocol_version: "TLS 1.3".into(),
            supports_tls13: true,
            supports_x25519: true,
            supports_http2: true,
            cipher_suite: "TLS13_AES_256_GCM_SHA384".into(),
            key_exchange_group: Some("X25519".into()),
            handshake_time: Duration::from_millis(handshake_ms),
        });
        result.sni = Some(SniResult {
            supports_sni: true,
            sni_match: true,
            server_name: domain.to_string(),
        });
        result.certificate = Some(CertificateResult {
            valid: true,
            issuer: "Test CA".into(),
            subject: domain.to_string(),
            days_until_expiry: 90,
            sans: vec![domain.to_string()],
            not_before: Utc::now(),
            not_after: Utc::now(),
            error: None,
        });
        result.cdn = Some(CdnResult {
            is_cdn: false,
            provider: None,
            confidence: None,
            evidence: Vec::new(),
            is_hot_website: false,
        });
        result.page_status = Some(PageStatusResult {
            status_code: 200,
            is_accessible: true,
            response_time_ms: 50,
            error: None,
        });
        result.status_code_category = Some(StatusCodeCategory::Safe);
        scoring::apply(&mut result);
        result
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(850)), "850µs");
        assert_eq!(format_duration(Duration::from_millis(12)), "12ms");
        assert_eq!(format_duration(Duration::from_millis(3250)), "3.25s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }

    #[test]
    fn test_suitable_table_sorted_by_ascending_stars() {
        // example.org lacks the TLD star and the latency star
        let weaker = suitable("example.org", 40);
        let stronger = suitable("example.com", 5);
        assert!(weaker.suitable && stronger.suitable);

        let now = Utc::now();
        let report = BatchReport::new(vec![stronger, weaker], now, now);
        let text = render_text(&report, false);

        let org = text.find("example.org").expect("org row");
        let com = text.find("example.com").expect("com row");
        assert!(org < com);
        assert!(text.contains("★★★★"));
        assert!(text.contains("Final domain"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_unsuitable_reasons_grouped_with_counts() {
        let mut a = DetectionResult::new("a.example", 0);
        a.error = Some(ProbeError::Dns("nxdomain".into()));
        let mut b = DetectionResult::new("b.example", 1);
        b.error = Some(ProbeError::Dns("servfail".into()));
        let mut c = DetectionResult::new("c.example", 2);
        c.error = Some(ProbeError::Blocked("c.example".into()));

        let now = Utc::now();
        let text = render_text(&BatchReport::new(vec![a, b, c], now, now), false);
        assert!(text.contains("Unsuitable domains (3):"));
        assert!(text.contains("   - 2× DNS resolution failed"));
        assert!(text.contains("   - 1× domain is blocked"));
    }

    #[test]
    fn test_excluded_status_codes_sorted() {
        let excluded = |domain: &str, code: u16| {
            let mut result = suitable(domain, 5);
            if let Some(network) = result.network.as_mut() {
                network.status_code = code;
            }
            result.status_code_category = Some(StatusCodeCategory::Excluded);
            result.error = Some(ProbeError::StatusCode(code));
            scoring::apply(&mut result);
            result
        };
        let now = Utc::now();
        let report = BatchReport::new(
            vec![excluded("a.example", 500), excluded("b.example", 404), excluded("c.example", 500)],
            now,
            now,
        );
        let text = render_text(&report, false);
        let first = text.find("1× status code 404").expect("404 line");
        let second = text.find("2× status code 500").expect("500 line");
        assert!(first < second);
        assert!(!text.contains("Suitable domains:"));
    }

    #[test]
    fn test_color_toggle() {
        colored::control::set_override(true);
        let now = Utc::now();
        let report = BatchReport::new(vec![suitable("example.com", 5)], now, now);
        assert!(render_text(&report, true).contains('\u{1b}'));
        assert!(!render_text(&report, false).contains('\u{1b}'));
        colored::control::unset_override();
    }
}
