//! `hivelink routes`: print the validated routing table.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::backend_for;
use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::Config;
use crate::services::RoutingTable;

/// Arguments for `hivelink routes`.
#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Backend to resolve (claude_code, anthropic_api, mock)
    #[arg(long)]
    pub backend: Option<String>,
}

/// One configured route.
#[derive(Debug, Serialize)]
pub struct RouteRow {
    pub source: String,
    pub destination: String,
    pub tier: String,
    pub backend: String,
}

/// The validated routing table.
#[derive(Debug, Serialize)]
pub struct RoutesOutput {
    pub routes: Vec<RouteRow>,
    pub total: usize,
}

impl CommandOutput for RoutesOutput {
    fn to_human(&self) -> String {
        let mut t = table(["Source", "Destination", "Tier", "Backend"]);
        for row in &self.routes {
            t.add_row(vec![&row.source, &row.destination, &row.tier, &row.backend]);
        }
        format!("{t}\n\n{} route(s)", self.total)
    }
}

impl RoutesOutput {
    /// Listing for `routes`, sorted by path.
    pub fn from_table(routes: &RoutingTable) -> Self {
        let rows: Vec<RouteRow> = routes
            .paths()
            .into_iter()
            .filter_map(|path| routes.get(&path))
            .map(|route| RouteRow {
                source: route.path.source.to_string(),
                destination: route.path.destination.to_string(),
                tier: route.path.destination.tier().as_str().to_string(),
                backend: route.backend.name().to_string(),
            })
            .collect();
        let total = rows.len();
        Self { routes: rows, total }
    }
}

/// Print the routing table built from configuration.
pub async fn execute(args: RoutesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let backend = backend_for(config, args.backend.as_deref())?;
    let routes = RoutingTable::from_specs(config.routes.as_slice(), backend).context("Invalid routing table")?;
    output(&RoutesOutput::from_table(&routes), json_mode);
    Ok(())
}
