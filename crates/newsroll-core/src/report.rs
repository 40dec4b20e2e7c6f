//! Rollup report over promoted cases, as plain text or as an HTML
//! document that word processors open directly.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::Case;

pub const EMPTY_REPORT: &str = "Không có dữ liệu để tạo báo cáo.";

const REPORT_TITLE: &str = "BÁO CÁO TỔNG HỢP CASE";
const NO_SUMMARY: &str = "(Chưa có tóm tắt)";

/// Render `cases` (already filtered and ordered) as a report.
///
/// `from`/`to` only affect the header; selecting cases is the caller's
/// job (see [`CaseBook::cases_for_report`](crate::cases::CaseBook::cases_for_report)).
pub fn build_report(
    cases: &[Case],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> String {
    if cases.is_empty() {
        return EMPTY_REPORT.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(REPORT_TITLE.to_string());
    lines.push("=".repeat(51));
    lines.push(String::new());

    if let Some(range) = date_range(from, to) {
        lines.push("Thời gian báo cáo:".to_string());
        lines.push(range);
        lines.push(String::new());
    }

    lines.push(format!("Tổng số case: {}", cases.len()));
    lines.push(String::new());

    for (i, case) in cases.iter().enumerate() {
        lines.push("-".repeat(60));
        lines.push(format!("Case #{}: {}", i + 1, case.name));
        lines.push(format!("Người tạo: {}", case.owner.as_deref().unwrap_or("N/A")));
        lines.push(format!("Ngày tạo: {}", case.created_at.format("%d/%m/%Y %H:%M")));
        lines.push(String::new());

        match case.summary.as_deref().filter(|s| !s.is_empty()) {
            Some(summary) => {
                lines.push("Tóm tắt:".to_string());
                lines.push(summary.to_string());
            }
            None => lines.push(format!("Tóm tắt: {}", NO_SUMMARY)),
        }
        lines.push(String::new());
    }

    lines.push("=".repeat(60));
    lines.push("Hết báo cáo".to_string());
    lines.push(format!("Ngày xuất: {}", now.format("%d/%m/%Y %H:%M:%S")));

    lines.join("\n")
}

/// Render `cases` as a standalone HTML document with the same content
/// as [`build_report`].
pub fn build_report_html(
    cases: &[Case],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> String {
    if cases.is_empty() {
        return format!("<p>{}</p>", EMPTY_REPORT);
    }

    let mut html = String::from(r#"<html><head><meta charset="UTF-8"></head><body>"#);
    html.push_str(&format!(
        r#"<h1 style="text-align: center;">{}</h1>"#,
        REPORT_TITLE
    ));

    if let Some(range) = date_range(from, to) {
        html.push_str(&format!("<p><strong>Thời gian báo cáo:</strong> {}</p>", range));
    }
    html.push_str(&format!(
        "<p><strong>Tổng số case:</strong> {}</p><hr>",
        cases.len()
    ));

    for (i, case) in cases.iter().enumerate() {
        html.push_str(&format!(
            "<h2>Case #{}: {}</h2>",
            i + 1,
            html_escape(&case.name)
        ));
        html.push_str(&format!(
            "<p><strong>Người tạo:</strong> {}</p>",
            html_escape(case.owner.as_deref().unwrap_or("N/A"))
        ));
        html.push_str(&format!(
            "<p><strong>Ngày tạo:</strong> {}</p>",
            case.created_at.format("%d/%m/%Y %H:%M")
        ));

        match case.summary.as_deref().filter(|s| !s.is_empty()) {
            Some(summary) => {
                html.push_str("<p><strong>Tóm tắt:</strong></p>");
                html.push_str(&format!(
                    r#"<p style="text-align: justify; white-space: pre-wrap;">{}</p>"#,
                    html_escape(summary).replace('\n', "<br />\n")
                ));
            }
            None => html.push_str(&format!(
                "<p><strong>Tóm tắt:</strong> {}</p>",
                NO_SUMMARY
            )),
        }
        html.push_str("<hr>");
    }

    html.push_str(&format!(
        r#"<p style="text-align: right; font-style: italic;">Ngày xuất: {}</p>"#,
        now.format("%d/%m/%Y %H:%M:%S")
    ));
    html.push_str("</body></html>");
    html
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<String> {
    match (from, to) {
        (Some(f), Some(t)) => Some(format!("Từ: {} đến {}", day(f), day(t))),
        (Some(f), None) => Some(format!("Từ: {}", day(f))),
        (None, Some(t)) => Some(format!("Đến: {}", day(t))),
        (None, None) => None,
    }
}

fn day(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}
