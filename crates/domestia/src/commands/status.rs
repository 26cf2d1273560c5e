//! `domestia status`: one-shot controller query.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use domestia_config::Config;
use domestia_core::{Bridge, LightStatus, LightView};

use crate::cli::StatusArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusRow {
    relay: u8,
    name: String,
    entity_id: String,
    state: LightStatus,
    brightness: u8,
    dimmable: bool,
    always_on: bool,
}

impl From<&LightView> for StatusRow {
    fn from(view: &LightView) -> Self {
        Self {
            relay: view.config.relay,
            name: view.config.name.clone(),
            entity_id: view.config.entity_id(),
            state: view.state().state,
            brightness: view.brightness,
            dimmable: view.config.dimmable,
            always_on: view.config.always_on,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LightRow {
    #[tabled(rename = "Relay")]
    relay: u8,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Brightness")]
    brightness: u8,
    #[tabled(rename = "Flags")]
    flags: String,
}

impl From<&StatusRow> for LightRow {
    fn from(row: &StatusRow) -> Self {
        let mut flags = Vec::new();
        if row.dimmable {
            flags.push("dimmable");
        }
        if row.always_on {
            flags.push("always-on");
        }

        Self {
            relay: row.relay,
            name: row.name.clone(),
            state: row.state.to_string(),
            brightness: row.brightness,
            flags: flags.join(","),
        }
    }
}

fn render_table(rows: &[StatusRow]) -> String {
    let rows: Vec<LightRow> = rows.iter().map(LightRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(config: &Config, args: &StatusArgs) -> Result<(), CliError> {
    let bridge = Bridge::from_config(config.to_bridge_config());
    let rows: Vec<StatusRow> = bridge.snapshot().await?.iter().map(StatusRow::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("controller reported no configured lights");
    } else {
        println!("{}", render_table(&rows));
    }
    Ok(())
}
