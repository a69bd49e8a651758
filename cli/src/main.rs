use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use medcalc_core::{Assessment, CalcConfig, Registry, UnitConverter, UnitDomain};
use medcalc_fhir::{BundleSource, RestSource};
use medcalc_ui::CalculatorView;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "medcalc",
    about = "Run clinical calculators against manual input or FHIR patient data."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Days after which an auto-populated value is reported as stale.
    #[arg(long, global = true)]
    staleness_days: Option<u32>,

    /// Number of observations requested per FHIR search.
    #[arg(long, global = true)]
    count: Option<u32>,

    /// HTTP timeout in seconds for --fhir-base.
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available calculators.
    List {
        /// Only show calculators whose id, title or description match.
        #[arg(long)]
        search: Option<String>,
    },
    /// Print the markup of a calculator card.
    Html {
        id: String,
        /// Emit a standalone page with styles.
        #[arg(long)]
        page: bool,
    },
    /// Populate and compute a calculator.
    Calc {
        id: String,
        /// Field assignment applied after population, e.g. --set map-sbp=120.
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        /// FHIR Bundle JSON file to populate from.
        #[arg(long, conflicts_with = "fhir_base")]
        bundle: Option<PathBuf>,
        /// Base URL of a FHIR server.
        #[arg(long, requires = "patient")]
        fhir_base: Option<String>,
        #[arg(long)]
        patient: Option<String>,
        /// Bearer token for the FHIR server.
        #[arg(long)]
        token: Option<String>,
        /// Print the assessment as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Convert a value between units of one measurement domain.
    Convert {
        value: f64,
        from: String,
        to: String,
        domain: String,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got \"{raw}\""))
}

impl Args {
    fn config(&self) -> CalcConfig {
        let mut config = CalcConfig::default();
        if let Some(days) = self.staleness_days {
            config.staleness_threshold_days = days;
        }
        if let Some(count) = self.count {
            config.observation_count = count;
        }
        if self.timeout.is_some() {
            config.request_timeout_secs = self.timeout;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config();
    let registry = Registry::standard();

    match args.command {
        Command::List { search } => {
            let summaries = match search {
                Some(query) => registry.search(&query),
                None => registry.summaries(),
            };
            for summary in summaries {
                println!("{:<24} {}", summary.id, summary.title);
            }
        }
        Command::Html { id, page } => {
            let calculator = registry.get(&id)?;
            if page {
                println!("{}", medcalc_ui::generate_page(calculator.as_ref()));
            } else {
                println!("{}", medcalc_ui::generate_html(calculator.as_ref()));
            }
        }
        Command::Calc {
            id,
            set,
            bundle,
            fhir_base,
            patient,
            token,
            json,
        } => {
            let calculator = registry.get(&id)?;
            let mut view = CalculatorView::new(
                calculator,
                Arc::new(UnitConverter::standard()),
                config.clone(),
            );
            view.initialize();

            if let Some(path) = bundle {
                let data = std::fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read bundle {path:?}"))?;
                let source = BundleSource::from_json(&data)
                    .with_context(|| format!("Invalid FHIR bundle {path:?}"))?;
                tracing::debug!(path = ?path, resources = source.len(), "populating from bundle");
                view.populate(&source).await;
            } else if let Some(base) = fhir_base {
                let patient = patient.ok_or_else(|| anyhow!("--patient is required"))?;
                tracing::debug!(%base, %patient, "populating from FHIR server");
                let mut source = RestSource::new(&base, &patient, &config)?;
                if let Some(token) = token {
                    source = source.with_token(&token);
                }
                view.populate(&source).await;
            }

            for (key, value) in &set {
                view.set_value(key, value)
                    .with_context(|| format!("Cannot set {key}"))?;
            }

            if json {
                let report = serde_json::json!({
                    "calculator": id,
                    "assessment": view.assessment(),
                    "population": view.summary(),
                    "stale": view.tracker().stale_items(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&view);
            }
        }
        Command::Convert {
            value,
            from,
            to,
            domain,
        } => {
            let domain: UnitDomain = domain.parse()?;
            let converted = UnitConverter::standard().try_convert(value, &from, &to, domain)?;
            println!("{value} {from} = {converted} {to}");
        }
    }

    Ok(())
}

fn print_report(view: &CalculatorView) {
    println!("{}", view.calculator().title());

    if let Some(summary) = view.summary() {
        if !summary.loaded.is_empty() {
            println!("Loaded from EHR: {}", summary.loaded.join(", "));
        }
        if !summary.missing.is_empty() {
            println!("Not found: {}", summary.missing.join(", "));
        }
    }
    for item in view.tracker().stale_items() {
        println!(
            "Stale: {} recorded {} ({})",
            item.label, item.date_text, item.age_text
        );
    }

    match view.assessment() {
        Assessment::Empty => println!("Not enough input to calculate."),
        Assessment::Invalid { message } | Assessment::Failed { message } => {
            println!("Error: {message}")
        }
        Assessment::Complete { result } => {
            for item in &result.items {
                let unit = item.unit.as_deref().map(|u| format!(" {u}")).unwrap_or_default();
                match &item.interpretation {
                    Some(text) => println!("{}: {}{unit} - {text}", item.label, item.value),
                    None => println!("{}: {}{unit}", item.label, item.value),
                }
            }
            for alert in &result.alerts {
                println!("[{}] {}", alert.severity.as_str(), alert.message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("note=a=b"),
            Ok(("note".to_string(), "a=b".to_string()))
        );
        assert!(parse_assignment("=5").is_err());
        assert!(parse_assignment("map-sbp").is_err());
    }

    #[test]
    fn flags_override_config_defaults() {
        let args = Args::parse_from(["medcalc", "--staleness-days", "30", "list"]);
        let config = args.config();
        assert_eq!(config.staleness_threshold_days, 30);
        assert_eq!(config.observation_count, 1);
    }
}
