//! Plain-text table of published results.

use std::fmt::Write;

use wildlife_core::{SortColumn, SortDirection};
use wildlife_query::{ResultSet, SortKeys};

/// Render results as an aligned table followed by a count line.
///
/// Sorted column headers carry an arrow for their direction.
pub fn render_table(results: &ResultSet, sort: &SortKeys) -> String {
    let header = |column: SortColumn, label: &str| match sort.direction(column) {
        Some(SortDirection::Ascending) => format!("{} ↑", label),
        Some(SortDirection::Descending) => format!("{} ↓", label),
        None => label.to_string(),
    };
    let headers = [
        header(SortColumn::Id, "ID"),
        header(SortColumn::Class, "CLASS"),
        header(SortColumn::Name, "NAME"),
        header(SortColumn::Level, "LEVEL"),
    ];

    let cells: Vec<[String; 4]> = results
        .rows
        .iter()
        .map(|row| {
            [
                row.record.id.to_string(),
                row.record.class_name.clone(),
                row.name.clone(),
                row.record.base_level.to_string(),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in std::iter::once(&headers).chain(&cells) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for line in std::iter::once(&headers).chain(&cells) {
        let text = format!(
            "{:>w0$}  {:<w1$}  {:<w2$}  {:>w3$}",
            line[0],
            line[1],
            line[2],
            line[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        );
        let _ = writeln!(out, "{}", text.trim_end());
    }

    let partition = results
        .partition
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default();
    let _ = writeln!(out, "{} creatures on {}", results.len(), partition);
    out
}
