use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use nutriproof_core::{load_config, NutriproofConfig, ProductService, ResearchService};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

#[derive(Parser)]
#[command(
    name = "nutriproof",
    version,
    about = "Evidence-backed food ingredient research"
)]
struct Cli {
    #[arg(
        long,
        default_value = "~/.nutriproof",
        help = "Config root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Research an ingredient across all sources and synthesize a recommendation")]
    Research {
        #[arg(help = "Ingredient name")]
        ingredient: String,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    #[command(about = "Literature-only research without web sources or synthesis")]
    Quick {
        #[arg(help = "Ingredient name")]
        ingredient: String,
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },
    #[command(about = "Look up a product by barcode")]
    Product {
        #[arg(help = "Product barcode (digits only)")]
        barcode: String,
        #[arg(long, help = "Quick-research the product's ingredients and rate it")]
        assess: bool,
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },
    #[command(about = "Validate config files")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "nutriproof.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(&cli.config_root.join("config"))?;
    tracing::debug!(config_root = %cli.config_root.display(), "config loaded");

    match command {
        Commands::Validate => {
            println!("{}", validate_message(&config));
        }
        Commands::Research { ingredient, json } => {
            let service = ResearchService::from_config(&config)?;
            let report = service.research(&ingredient).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(report.as_ref())?);
            } else {
                print!("{}", render::report(&report));
            }
        }
        Commands::Quick { ingredient, json } => {
            let service = ResearchService::from_config(&config)?;
            let quick = service.quick(&ingredient).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(quick.as_ref())?);
            } else {
                print!("{}", render::quick(&quick));
            }
        }
        Commands::Product {
            barcode,
            assess,
            json,
        } => {
            let products = ProductService::from_config(&config);
            let Some(product) = (*products.lookup(&barcode).await?).clone() else {
                println!("No product found for barcode {}", barcode.trim());
                return Ok(());
            };

            let safety = if assess {
                let service = ResearchService::from_config(&config)?;
                Some(service.assess_product(&product).await)
            } else {
                None
            };

            if json {
                let value = serde_json::json!({ "product": product, "safety": safety });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", render::product(&product));
                if let Some(safety) = &safety {
                    print!("{}", render::product_safety(safety));
                }
            }
        }
    }

    Ok(())
}

fn validate_message(config: &NutriproofConfig) -> String {
    let synthesis = if config.synthesis.provider_config().is_some() {
        config.synthesis.model.as_str()
    } else {
        "disabled"
    };
    let web = if config.sources.exa.api_key.is_empty() {
        "no key"
    } else {
        "configured"
    };
    format!(
        "Config valid. literature limit {}, citation graph limit {}, web search {web}, synthesis {synthesis}.",
        config.limits.literature, config.limits.citation_graph
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_research_with_json_flag() {
        let cli = Cli::try_parse_from(["nutriproof", "research", "aspartame", "--json"]).unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Research { ref ingredient, json: true } if ingredient == "aspartame"
        ));
    }

    #[test]
    fn parses_product_assess() {
        let cli = Cli::try_parse_from(["nutriproof", "product", "737628064502", "--assess"])
            .unwrap();
        assert!(matches!(
            cli.command.unwrap(),
            Commands::Product {
                assess: true,
                json: false,
                ..
            }
        ));
    }

    #[test]
    fn config_root_defaults_to_home_dir() {
        let cli = Cli::try_parse_from(["nutriproof", "validate"]).unwrap();
        assert_eq!(cli.config_root, PathBuf::from("~/.nutriproof"));
        assert!(matches!(cli.command.unwrap(), Commands::Validate));
    }

    #[test]
    fn quick_requires_ingredient() {
        assert!(Cli::try_parse_from(["nutriproof", "quick"]).is_err());
    }

    #[test]
    fn validate_message_reports_disabled_synthesis() {
        let mut config = NutriproofConfig::default();
        config.synthesis.api_key.clear();
        let message = validate_message(&config);
        assert!(message.starts_with("Config valid."));
        assert!(message.contains("synthesis disabled"));
        assert!(message.contains("web search no key"));
    }
}
