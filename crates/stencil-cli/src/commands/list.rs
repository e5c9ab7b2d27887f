//! Implementation of the `stencil list` command.

use stencil_core::application::{BlueprintInfo, BlueprintService};

use crate::{
    blueprints,
    cli::{ListArgs, ListFormat},
    config::AppConfig,
    error::CliResult,
    output::{OutputManager, print_json},
};

pub fn execute(args: ListArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let registry = blueprints::registry(&config)?;
    let service = BlueprintService::new(Box::new(registry));
    let blueprints = service.list()?;

    match args.format {
        ListFormat::Table => {
            output.header("Available blueprints:")?;
            let rows: Vec<(String, String, String)> = blueprints
                .iter()
                .map(|b| (b.id.clone(), b.description.clone(), counts(b)))
                .collect();
            output.rows(&rows)?;
        }

        // JSON bypasses OutputManager so it stays parseable in quiet mode.
        ListFormat::Json => print_json(&blueprints)?,

        ListFormat::List => {
            for b in &blueprints {
                println!("{}", b.id);
            }
        }

        ListFormat::Csv => {
            println!("name,version,variables,files,description");
            for b in &blueprints {
                println!(
                    "{},{},{},{},{}",
                    b.name,
                    b.version,
                    b.variables,
                    b.files,
                    csv_field(&b.description)
                );
            }
        }
    }

    Ok(())
}

fn counts(b: &BlueprintInfo) -> String {
    format!("({} variables, {} files)", b.variables, b.files)
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
