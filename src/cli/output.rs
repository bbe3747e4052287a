use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::tag::to_display;
use crate::ops::inventory::{PageDelta, TagCount};
use crate::ops::rename::RenamePlan;
use crate::util::unicode::{display_width, pad_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PageJson {
    pub tag: String,
    pub pages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

#[derive(Serialize)]
pub struct PageEntryJson {
    pub tag: String,
    pub pages: Vec<String>,
}

#[derive(Serialize)]
pub struct PageChangeJson<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

pub fn recovery_to_json(entries: &[RecoveryEntry]) -> serde_json::Value {
    serde_json::Value::Array(entries.iter().map(RecoveryEntry::to_json).collect())
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One line per tag: name, use count, and tag pages, in aligned columns.
pub fn format_tag_counts(counts: &[TagCount]) -> Vec<String> {
    let names: Vec<String> = counts.iter().map(|c| to_display(&c.tag)).collect();
    let name_width = names.iter().map(|n| display_width(n)).max().unwrap_or(0);
    let count_width = counts
        .iter()
        .map(|c| c.uses.to_string().len())
        .max()
        .unwrap_or(1);

    counts
        .iter()
        .zip(&names)
        .map(|(count, name)| {
            let mut line = format!(
                "{}  {:>width$}",
                pad_to_width(name, name_width),
                count.uses,
                width = count_width
            );
            if !count.pages.is_empty() {
                line.push_str(&format!("  page: {}", count.pages.join(", ")));
            }
            line
        })
        .collect()
}

/// What a dry run would do
pub fn format_plan(plan: &RenamePlan) -> Vec<String> {
    let mut lines = vec![format!(
        "Renaming #{} to #{} would update {} file(s):",
        plan.old,
        plan.new,
        plan.targets.len()
    )];
    for target in &plan.targets {
        lines.push(format!("  {}", target));
    }
    if let Some(clash) = &plan.clash {
        lines.push(format!(
            "Merge: #{} would merge with #{}",
            clash.origin, clash.collides_with
        ));
    }
    lines
}

/// Tag-page changes for one document, e.g. `notes/a.md: +#topic -#old`
pub fn format_page_delta(path: &str, delta: &PageDelta) -> String {
    let mut parts = vec![format!("{}:", path)];
    parts.extend(delta.added.iter().map(|t| format!("+{}", to_display(t))));
    parts.extend(delta.removed.iter().map(|t| format!("-{}", to_display(t))));
    parts.join(" ")
}
