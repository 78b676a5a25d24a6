//! Read-only inspection commands: stored bridges and offline page checks.

use std::path::Path;

use anyhow::{Context, Result};

use crate::classify::{classify, Clock};
use crate::config::Config;
use crate::extract::extract_bridge_lines;
use crate::models::Category;
use crate::store::open_store;

/// One extracted line and what the classifier made of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedLine {
    pub category: Option<Category>,
    pub line: String,
}

/// Extracts and classifies every bridge line in `text`, without touching
/// storage or notifications.
pub fn check_text(text: &str, clock: &dyn Clock) -> Vec<CheckedLine> {
    extract_bridge_lines(text)
        .into_iter()
        .map(|line| CheckedLine {
            category: classify(&line, clock).ok().map(|r| r.category()),
            line,
        })
        .collect()
}

pub fn run_check(path: &Path, clock: &dyn Clock) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page: {}", path.display()))?;

    let checked = check_text(&text, clock);
    let malformed = checked.iter().filter(|c| c.category.is_none()).count();

    for c in &checked {
        let tag = c.category.map(|cat| cat.as_str()).unwrap_or("malformed");
        println!("{:<16} {}", tag, c.line);
    }
    println!(
        "{} lines ({} classified, {} malformed)",
        checked.len(),
        checked.len() - malformed,
        malformed
    );
    Ok(())
}

pub async fn run_list(config: &Config, only: Option<Category>) -> Result<()> {
    let store = open_store(config).await?;
    let docs = store.read_all().await?;

    for (category, doc) in &docs {
        if only.is_some_and(|c| c != *category) {
            continue;
        }
        let lines: Vec<&str> = doc.lines().collect();
        println!("{} ({})", category, lines.len());
        for line in lines {
            println!("  {}", line);
        }
    }
    Ok(())
}
