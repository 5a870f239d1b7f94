//! Plain-text rendering of directory data for the terminal.

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

use crate::cache::{BaseSyncOutcome, BaseView, CacheResult, EntityOutcome, SyncReport};
use crate::remote::types::{Base, Organization, PageCards, Table, TileConfig, TileContent};

pub fn timestamp(at: Option<DateTime<Utc>>) -> String {
  match at {
    Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    None => "never".to_string(),
  }
}

/// Shown above anything served from the local store.
pub fn offline_banner(cached_at: Option<DateTime<Utc>>) -> String {
  format!("Offline: showing saved data (last updated {})", timestamp(cached_at))
}

pub fn base_line(base: &Base, followed: bool) -> String {
  let marker = if followed { "*" } else { " " };
  let inactive = if base.active == Some(false) { " (inactive)" } else { "" };
  format!(
    "{} {:<12} {}, {}, {}{}",
    marker, base.id, base.name, base.city, base.state, inactive
  )
}

/// Columns sized to their widest cell; ragged rows are padded first.
pub fn table(table: &Table) -> String {
  let rows = table.padded_rows();
  let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
  for row in &rows {
    for (w, cell) in widths.iter_mut().zip(row) {
      *w = (*w).max(cell.chars().count());
    }
  }

  let line = |cells: &[String]| {
    cells
      .iter()
      .zip(&widths)
      .map(|(c, w)| format!("{:<width$}", c, width = *w))
      .collect::<Vec<_>>()
      .join(" | ")
      .trim_end()
      .to_string()
  };

  let mut out = String::new();
  if !table.title.is_empty() {
    let _ = writeln!(out, "{}", table.title);
  }
  let _ = writeln!(out, "{}", line(&table.headers));
  let _ = writeln!(
    out,
    "{}",
    widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
  );
  for row in &rows {
    let _ = writeln!(out, "{}", line(row));
  }
  out
}

fn organization(org: &Organization, out: &mut String) {
  let _ = writeln!(out, "{} [{}]", org.name, org.kind.display_name());
  if let Some(description) = &org.description {
    let _ = writeln!(out, "  {}", description);
  }
  let _ = writeln!(out, "  email: {}", org.email);
  if let Some(contact) = &org.contact {
    let _ = writeln!(out, "  contact: {}", contact);
  }
  if let Some(building) = &org.building_number {
    let _ = writeln!(out, "  building: {}", building);
  }
  if let Some(address) = &org.address {
    let _ = writeln!(out, "  address: {}", address);
  }
  if let Some(url) = &org.web_url {
    let _ = writeln!(out, "  web: {}", url);
  }
  for link in org.links.iter().flatten() {
    let _ = writeln!(out, "  {}: {}", link.label, link.url);
  }
  if org.use_table {
    for t in &org.table_data {
      for l in table(t).lines() {
        let _ = writeln!(out, "  {}", l);
      }
    }
  }
}

fn tile(tile: &TileConfig, cards: &PageCards, out: &mut String) {
  let _ = writeln!(out, "## {}", tile.title);
  match &tile.content {
    TileContent::Text(text) => {
      let _ = writeln!(out, "{}", text);
    }
    TileContent::Images(urls) => {
      for url in urls {
        let _ = writeln!(out, "[image] {}", url);
      }
    }
    TileContent::TableRefs(ids) => {
      for id in ids {
        match cards.table(id) {
          Some(t) => out.push_str(&table(t)),
          None => {
            let _ = writeln!(out, "(missing table {})", id);
          }
        }
      }
    }
    TileContent::Links(links) => {
      for link in links {
        let _ = writeln!(out, "{}: {}", link.label, link.url);
      }
    }
    TileContent::Contact { phone, email } => {
      if let Some(phone) = phone {
        let _ = writeln!(out, "phone: {}", phone);
      }
      if let Some(email) = email {
        let _ = writeln!(out, "email: {}", email);
      }
    }
    TileContent::Unknown(_) => {
      let _ = writeln!(out, "(unsupported {} tile)", tile.kind);
    }
  }
}

pub fn base_view(result: &CacheResult<BaseView>) -> String {
  let view = &result.data;
  let mut out = String::new();
  if result.from_cache() {
    let _ = writeln!(out, "{}\n", offline_banner(result.cached_at));
  }

  let flags = view.page_cards.as_ref();
  let shown = |flag: fn(&PageCards) -> bool| flags.map(flag).unwrap_or(true);

  if let Some(details) = &view.base_details {
    if shown(|c| c.show_motto) {
      if let Some(motto) = &details.motto {
        let _ = writeln!(out, "\"{}\"", motto);
      }
    }
    if shown(|c| c.show_commander) {
      if let Some(commander) = &details.commander {
        let _ = writeln!(out, "Commander: {}", commander);
      }
    }
    if shown(|c| c.show_phone) {
      if let Some(phone) = &details.phone {
        let _ = writeln!(out, "Phone: {}", phone);
      }
    }
    if shown(|c| c.show_email) {
      if let Some(email) = &details.email {
        let _ = writeln!(out, "Email: {}", email);
      }
    }
    if let Some(population) = details.population {
      let _ = writeln!(out, "Population: {}", population);
    }
    out.push('\n');
  }

  if let Some(cards) = &view.page_cards {
    for t in cards.visible_tiles() {
      tile(t, cards, &mut out);
      out.push('\n');
    }
    if cards.show_tables {
      for t in &cards.table_data {
        out.push_str(&table(t));
        out.push('\n');
      }
    }
  }

  let _ = writeln!(out, "# Organizations ({})", view.organizations.len());
  for org in &view.organizations {
    organization(org, &mut out);
  }
  out
}

fn outcome(outcome: &BaseSyncOutcome) -> String {
  if let (true, EntityOutcome::Synced(orgs)) = (outcome.is_complete(), &outcome.organizations) {
    return format!(
      "  ok      {} ({}): {} organizations",
      outcome.base_name, outcome.base_id, orgs
    );
  }
  let failed: Vec<String> = outcome
    .failures()
    .into_iter()
    .map(|(what, reason)| format!("{}: {}", what, reason))
    .collect();
  format!(
    "  partial {} ({}): {}",
    outcome.base_name,
    outcome.base_id,
    failed.join("; ")
  )
}

pub fn sync_report(report: &SyncReport) -> String {
  let mut out = String::new();
  let elapsed = report.finished_at - report.started_at;
  if report.is_complete() {
    let _ = writeln!(
      out,
      "Synced all {} bases in {}ms",
      report.outcomes.len(),
      elapsed.num_milliseconds()
    );
  } else {
    let _ = writeln!(
      out,
      "Synced {}/{} bases in {}ms",
      report.complete_count(),
      report.outcomes.len(),
      elapsed.num_milliseconds()
    );
  }
  if !report.bases_saved {
    let _ = writeln!(out, "  warning: followed bases were not saved to the cache");
  }
  for o in &report.outcomes {
    let _ = writeln!(out, "{}", outcome(o));
  }
  out
}
