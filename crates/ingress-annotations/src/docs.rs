//! Renders operator-facing documentation from annotation registries.
use crate::parser::{AnnotationField, AnnotationGroup, annotation_with_prefix};

const TABLE_HEADER: &str = "\
| Group | Annotation | Risk | Scope | Description |
|-------|------------|------|-------|-------------|
";

/// Renders all fields of `groups` as a Markdown table.
///
/// Rows are sorted by group and then by annotation name. Annotations are
/// shown with their full prefix.
pub fn render_markdown<'a>(groups: impl IntoIterator<Item = &'a AnnotationGroup>) -> String {
    let mut rows = groups
        .into_iter()
        .flat_map(|group| {
            group
                .annotations
                .iter()
                .map(move |(name, field)| (group.group, *name, field))
        })
        .collect::<Vec<(&str, &str, &AnnotationField)>>();
    rows.sort_by_key(|(group, name, _)| (*group, *name));

    let mut table = String::from(TABLE_HEADER);
    for (group, name, field) in rows {
        table.push_str(&format!(
            "| {group} | `{annotation}` | {risk} | {scope} | {description} |\n",
            annotation = annotation_with_prefix(name),
            risk = field.risk,
            scope = field.scope,
            description = escape_cell(field.documentation),
        ));
    }

    table
}

// Table cells must stay on one line and must not contain column separators
fn escape_cell(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}
