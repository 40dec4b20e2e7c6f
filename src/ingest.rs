//! `newsroll ingest`: feed one payload (or an array of payloads) from a
//! JSON file or stdin through the ingestion engine.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use newsroll_core::models::{IngestRequest, Outcome};
use newsroll_core::Error;

use crate::app::App;

fn read_payloads(source: &str) -> Result<Vec<IngestRequest>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read payload file: {}", source))?
    };

    let value: serde_json::Value = serde_json::from_str(&raw).context("Payload is not valid JSON")?;
    let payloads = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<IngestRequest>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(payloads)
}

pub async fn run_ingest(app: &App, source: &str) -> Result<()> {
    let payloads = read_payloads(source)?;

    let mut created = 0usize;
    let mut updated = 0usize;
    let mut skipped = 0usize;
    let mut rejected = 0usize;

    for (i, payload) in payloads.into_iter().enumerate() {
        let outcome = match payload.validate() {
            Ok(new_item) => app.engine.ingest(new_item).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                match result.outcome {
                    Outcome::Created => created += 1,
                    Outcome::Updated => updated += 1,
                    Outcome::SkippedDuplicate | Outcome::SkippedContentDuplicate => skipped += 1,
                }
                println!(
                    "{} {} {}",
                    result.outcome.as_str(),
                    result.item.id,
                    result.item.link
                );
            }
            Err(Error::Validation { errors }) => {
                rejected += 1;
                for e in errors {
                    eprintln!("payload {}: {}: {}", i, e.field, e.message);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("ingest {}", source);
    println!("  created: {}", created);
    println!("  updated: {}", updated);
    println!("  skipped: {}", skipped);
    if rejected > 0 {
        println!("  rejected: {}", rejected);
        bail!("{} payload(s) failed validation", rejected);
    }
    println!("ok");
    Ok(())
}
