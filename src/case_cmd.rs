//! `newsroll case ...` and `newsroll report`.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use newsroll_core::models::{CaseStatus, Role};
use newsroll_core::report::{build_report, build_report_html};

use crate::app::App;

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_status(s: &str) -> Result<CaseStatus> {
    CaseStatus::parse(s)
        .with_context(|| format!("unknown status '{}', expected open or promoted", s))
}

/// `--user` selects a member view; without it the caller sees everything.
pub fn role_for(user: Option<String>) -> Role {
    match user {
        Some(user) if !user.trim().is_empty() => Role::Member { user },
        _ => Role::Admin,
    }
}

pub async fn run_create(app: &App, name: &str, owner: Option<&str>) -> Result<()> {
    let case = app.cases.create_case(name, owner).await?;
    println!("{}", case.id);
    Ok(())
}

pub async fn run_promote(app: &App, case_id: &str, item_ids: &[String]) -> Result<()> {
    let case = app.cases.promote_case(case_id, item_ids).await?;
    println!("case {} promoted with {} item(s)", case.id, item_ids.len());
    Ok(())
}

pub async fn run_summarize(app: &App, case_id: &str, max_chars: Option<usize>) -> Result<()> {
    match app.cases.summarize_case(case_id, max_chars).await? {
        Some(summary) => println!("{}", summary),
        None => println!("(no summary produced)"),
    }
    Ok(())
}

pub async fn run_list(app: &App, role: &Role, status: Option<CaseStatus>) -> Result<()> {
    let cases = app.cases.list_cases(role, status).await?;
    for case in &cases {
        println!(
            "{}  {:<8}  {}  {}  {}",
            case.id,
            case.status.as_str(),
            case.created_at.format("%Y-%m-%d"),
            case.owner.as_deref().unwrap_or("-"),
            case.name
        );
    }
    println!("{} case(s)", cases.len());
    Ok(())
}

pub async fn run_report(
    app: &App,
    case_ids: &[String],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    html: bool,
) -> Result<()> {
    let cases = app.cases.cases_for_report(case_ids, from, to).await?;
    let report = if html {
        build_report_html(&cases, from, to, Utc::now())
    } else {
        build_report(&cases, from, to, Utc::now())
    };
    println!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-11-04").unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 4).unwrap()
        );
        assert!(parse_date("04/11/2025").is_err());
    }

    #[test]
    fn test_role_for() {
        assert_eq!(role_for(None), Role::Admin);
        assert_eq!(role_for(Some(" ".to_string())), Role::Admin);
        assert_eq!(
            role_for(Some("alice".to_string())),
            Role::Member {
                user: "alice".to_string()
            }
        );
    }
}
