//! Rendering for `--output`.
//!
//! `json`, `json-compact` and `yaml` serialize the value itself; `table`
//! and `plain` go through per-command views (a `Tabled` row or a detail
//! block, and one identifier per line).

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Serde rendering for the structured formats; `None` for `table`/`plain`.
fn structured<T: Serialize + ?Sized>(
    format: &OutputFormat,
    data: &T,
) -> Option<Result<String, CliError>> {
    match format {
        OutputFormat::Json => Some(render_json(data, false)),
        OutputFormat::JsonCompact => Some(render_json(data, true)),
        OutputFormat::Yaml => Some(serde_yaml::to_string(data).map_err(CliError::from)),
        OutputFormat::Table | OutputFormat::Plain => None,
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a collection: one table row or one plain line per item.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    if let Some(rendered) = structured(format, data) {
        return rendered;
    }
    if matches!(format, OutputFormat::Plain) {
        return Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n"));
    }
    if data.is_empty() {
        return Ok("(none)".into());
    }
    let rows: Vec<R> = data.iter().map(to_row).collect();
    Ok(Table::new(rows).with(Style::rounded()).to_string())
}

/// Render one item: `detail_fn` draws the table view.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match structured(format, data) {
        Some(rendered) => rendered,
        None if matches!(format, OutputFormat::Plain) => Ok(id_fn(data)),
        None => Ok(detail_fn(data)),
    }
}

/// JSON, pretty or single-line.
pub(crate) fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

/// Write rendered output to stdout unless `--quiet`.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    // A closed pipe (`myhome listen | head`) is not an error.
    let _ = writeln!(io::stdout().lock(), "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Item {
        id: &'static str,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ID")]
        id: String,
    }

    fn render(format: &OutputFormat, items: &[Item]) -> String {
        render_list(format, items, |i| Row { id: i.id.into() }, |i| i.id.to_owned()).unwrap()
    }

    #[test]
    fn renders_every_format() {
        let items = [Item { id: "a" }, Item { id: "b" }];
        assert!(render(&OutputFormat::Table, &items).contains("ID"));
        assert_eq!(
            render(&OutputFormat::JsonCompact, &items),
            r#"[{"id":"a"},{"id":"b"}]"#
        );
        assert_eq!(render(&OutputFormat::Plain, &items), "a\nb");
        assert!(render(&OutputFormat::Yaml, &items).contains("- id: a"));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render(&OutputFormat::Table, &[]), "(none)");
        assert_eq!(render(&OutputFormat::Json, &[]), "[]");
    }

    #[test]
    fn single_item_uses_detail_view() {
        let item = Item { id: "a" };
        let detail = render_single(&OutputFormat::Table, &item, |i| format!("ID: {}", i.id), |i| i.id.to_owned());
        assert_eq!(detail.unwrap(), "ID: a");
    }
}
