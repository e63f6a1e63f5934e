use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use ecomap_core::bom::{load_bom_from_csv, BomLine};
use ecomap_core::mapping::OverrideRequest;
use ecomap_core::products::Product;
use ecomap_core::scenarios::{default_scenario, Scenario};

use crate::main_lib::AppState;

#[derive(Parser)]
#[command(name = "ecomap", version, about = "BOM resolution and circularity scoring")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve every BOM line to an LCI dataset and record the decisions
    Resolve(BomArgs),
    /// Record a manual dataset choice for one BOM line
    Override(OverrideArgs),
    /// Compute the Product Circularity Index of a BOM
    Pci(BomArgs),
    /// Build the LCI model from confirmed decisions, resolving if needed
    Lci(BomArgs),
    /// Show the effective decision per BOM line of a product
    Decisions(ProductArgs),
    /// List every recorded decision of a product, newest first
    History(ProductArgs),
}

#[derive(Parser)]
pub struct BomArgs {
    /// BOM CSV file
    #[arg(value_name = "BOM_CSV")]
    pub bom: PathBuf,
    /// Scenario JSON file (default: built-in EU reference scenario)
    #[arg(long, value_name = "PATH")]
    pub scenario: Option<PathBuf>,
}

#[derive(Parser)]
pub struct OverrideArgs {
    #[arg(value_name = "BOM_CSV")]
    pub bom: PathBuf,
    /// BOM line to override
    pub line: String,
    pub dataset: String,
    pub provider: String,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub comment: Option<String>,
    /// Life-cycle stage, e.g. raw_materials or end-of-life
    #[arg(long)]
    pub stage: Option<String>,
    #[arg(long)]
    pub scenario_id: Option<String>,
}

#[derive(Parser)]
pub struct ProductArgs {
    pub product: String,
}

fn load_scenario(path: Option<&Path>) -> anyhow::Result<Scenario> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
        }
        None => Ok(default_scenario()),
    }
}

fn load_bom(path: &Path) -> anyhow::Result<Vec<BomLine>> {
    load_bom_from_csv(path).with_context(|| format!("loading BOM {}", path.display()))
}

/// The product is identified by the BOM's `product_id` column.
fn product_of(lines: &[BomLine]) -> anyhow::Result<Product> {
    let first = lines.first().ok_or_else(|| anyhow!("BOM has no lines"))?;
    Ok(Product::new(first.product_id.clone(), first.product_id.clone()))
}

pub async fn run(command: Command, state: &AppState) -> anyhow::Result<Value> {
    match command {
        Command::Resolve(args) => {
            let lines = load_bom(&args.bom)?;
            let scenario = args.scenario.as_deref().map(|p| load_scenario(Some(p))).transpose()?;
            let decisions = state
                .mapping_service
                .resolve(&lines, scenario.as_ref())
                .await?;
            Ok(serde_json::to_value(decisions)?)
        }
        Command::Override(args) => {
            let lines = load_bom(&args.bom)?;
            let line = lines
                .iter()
                .find(|l| l.id == args.line)
                .ok_or_else(|| anyhow!("BOM line {} not found in {}", args.line, args.bom.display()))?;
            let request = OverrideRequest {
                dataset_id: args.dataset,
                provider: args.provider,
                user_id: args.user,
                comment: args.comment,
                scenario_id: args.scenario_id,
                life_cycle_stage: args.stage,
            };
            let decision = state.mapping_service.record_override(line, request).await?;
            Ok(serde_json::to_value(decision)?)
        }
        Command::Pci(args) => {
            let lines = load_bom(&args.bom)?;
            let product = product_of(&lines)?;
            let scenario = load_scenario(args.scenario.as_deref())?;
            let result = state
                .circularity_service
                .calculate_pci(&product, &lines, &scenario)?;
            Ok(serde_json::to_value(result)?)
        }
        Command::Lci(args) => {
            let lines = load_bom(&args.bom)?;
            let product = product_of(&lines)?;
            let scenario = args.scenario.as_deref().map(|p| load_scenario(Some(p))).transpose()?;
            let (model, decisions) = state
                .mapping_service
                .build_lci_model(&product, &lines, scenario.as_ref())
                .await?;
            Ok(json!({ "model": model, "decisions": decisions }))
        }
        Command::Decisions(args) => {
            let decisions = state.mapping_service.load_latest_decisions(&args.product)?;
            Ok(serde_json::to_value(decisions)?)
        }
        Command::History(args) => {
            let history = state.mapping_service.list_history(&args.product)?;
            Ok(serde_json::to_value(history)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses_override() {
        let cli = Cli::try_parse_from([
            "ecomap",
            "override",
            "bom.csv",
            "line-1",
            "custom:y",
            "acme",
            "--user",
            "analyst",
            "--stage",
            "end-of-life",
        ])
        .unwrap();
        match cli.command {
            Command::Override(args) => {
                assert_eq!(args.line, "line-1");
                assert_eq!(args.dataset, "custom:y");
                assert_eq!(args.provider, "acme");
                assert_eq!(args.user.as_deref(), Some("analyst"));
                assert_eq!(args.stage.as_deref(), Some("end-of-life"));
                assert!(args.comment.is_none());
            }
            _ => panic!("expected override"),
        }
    }

    #[test]
    fn test_scenario_file_and_default() {
        let default = load_scenario(None).unwrap();
        assert_eq!(default.id, default_scenario().id);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id":"s-1","name":"Closed loop","collectionFractionForReuse":0.2,"collectionFractionForRecycling":0.8,"utilityFactor":1.5}}"#
        )
        .unwrap();
        let scenario = load_scenario(Some(file.path())).unwrap();
        assert_eq!(scenario.name, "Closed loop");
        assert_eq!(scenario.utility_factor, Some(1.5));
        assert!(scenario.material_parameters.is_empty());
    }

    #[test]
    fn test_product_of_requires_lines() {
        assert!(product_of(&[]).is_err());
        let line = BomLine::new("l1", "bike", "Frame", 1.0);
        assert_eq!(product_of(&[line]).unwrap().id, "bike");
    }
}
