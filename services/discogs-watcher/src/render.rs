//!
//! src/render.rs  Andrew Belles  Oct 16th, 2026
//!
//! Text presentation of the current view
//!

use chrono::{DateTime, Local};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;

use crate::errors::WatcherError;
use crate::pipeline::ViewState;
use crate::types::{LowestPrice, ReleaseSummary};

pub const PLACEHOLDER: &str = "—";
pub const NO_COVER: &str = "(no image)";
pub const EMPTY_VIEW: &str = "No items yet. Add a Release ID or URL with `add`.";

pub fn format_price(price: Option<&LowestPrice>) -> String {
    match price {
        None => PLACEHOLDER.to_string(),
        Some(LowestPrice::Amount(v)) => format!("{v} $"),
        Some(LowestPrice::Priced { value, currency }) if currency == "USD" => format!("{value} $"),
        Some(LowestPrice::Priced { value, currency }) => format!("{value} {currency}")
    }
}

fn title_cell(r: &ReleaseSummary) -> String {
    if r.artists.is_empty() {
        r.title.clone()
    } else {
        format!("{} — {}", r.artists, r.title)
    }
}

/// Thumbnail by default, the full size image when `full_images` is set.
/// Either one stands in for the other when missing
fn cover_cell(r: &ReleaseSummary, full_images: bool) -> String {
    let (first, second) = if full_images {
        (&r.image_url, &r.thumb_url)
    } else {
        (&r.thumb_url, &r.image_url)
    };
    first.as_ref().or(second.as_ref())
        .cloned()
        .unwrap_or_else(|| NO_COVER.to_string())
}

pub fn render_table(rows: &[ReleaseSummary], full_images: bool) -> String {
    if rows.is_empty() {
        return EMPTY_VIEW.to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["Cover", "ID", "Artist – Title", "For Sale", "Lowest Price", "Link"]);

    for r in rows {
        table.add_row(vec![
            cover_cell(r, full_images),
            r.id.to_string(),
            title_cell(r),
            r.num_for_sale.map_or_else(|| PLACEHOLDER.to_string(), |n| n.to_string()),
            format_price(r.lowest_price.as_ref()),
            r.link().to_string(),
        ]);
    }
    table.to_string()
}

///
/// Tracked ids line, error banner, then the table of `rows` (already
/// filtered and sorted by the caller)
///
pub fn render_view(
    ids: &[u64],
    view: &ViewState,
    rows: &[ReleaseSummary],
    full_images: bool
) -> String {
    let mut out = String::new();

    if !ids.is_empty() {
        let tracked = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("Tracked IDs: {tracked}"));
        if let (false, Some(at)) = (view.rows.is_empty(), view.updated_at) {
            out.push_str(&format!(" • last updated: {}", at.format("%H:%M:%S")));
        }
        out.push('\n');
    }

    if let Some(err) = &view.last_error {
        out.push_str(&format!("Error: {err}\n"));
    }

    out.push_str(&render_table(rows, full_images));
    out.push('\n');
    out
}

#[derive(Serialize)]
struct JsonView<'a> {
    tracked_ids: &'a [u64],
    updated_at: Option<DateTime<Local>>,
    error: Option<&'a str>,
    rows: &'a [ReleaseSummary]
}

///
/// Same content as `render_view` as one pretty printed json document.
/// `updated_at` is only set once rows have been loaded
///
pub fn render_json(
    ids: &[u64],
    view: &ViewState,
    rows: &[ReleaseSummary]
) -> Result<String, WatcherError> {
    let doc = JsonView {
        tracked_ids: ids,
        updated_at: if view.rows.is_empty() { None } else { view.updated_at },
        error: view.last_error.as_deref(),
        rows
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}
