mod config;
#[cfg(feature = "web")]
mod web;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use saksham_flows::AdvisoryFlows;
use saksham_forms::{
    AdvisoryForm, ConservationPlanner, CropDoctor, Emphasis, EntrepreneurshipSupport,
    FinancialAdvisory, FormSession, MarketPrices, RawForm, ResultCard, Submission,
    TracingNotifier, Upload,
};
use saksham_llm::{create_provider, ProviderKind};

use config::{CliOverrides, SakshamConfig};

#[derive(Parser)]
#[command(name = "saksham", about = "AI advisory for farmers", version)]
struct Cli {
    /// Model provider: gemini, openai or fake (overrides SAKSHAM_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Model name (overrides SAKSHAM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Config file (default: ~/.config/saksham/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the feature forms and the flow API over HTTP
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind (overrides SAKSHAM_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides SAKSHAM_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Diagnose crop diseases or pests from a photo
    Diagnose {
        /// Path to the crop image
        photo: PathBuf,
    },
    /// Latest market price for a crop, answered in a local dialect
    MarketPrice {
        #[arg(long)]
        crop: String,
        /// Region or dialect, e.g. Punjabi
        #[arg(long)]
        dialect: String,
    },
    /// Water and soil conservation suggestions
    Conserve {
        #[arg(long)]
        region: String,
        #[arg(long)]
        crops: String,
        #[arg(long)]
        soil_type: String,
        #[arg(long)]
        water_availability: String,
        #[arg(long)]
        climate: String,
        /// Environmental data file (sensor readings, soil report, ...)
        #[arg(long)]
        data: PathBuf,
    },
    /// Government financial support schemes for a farmer
    Finance {
        /// Farm size, crops, income and existing loans
        #[arg(long)]
        details: String,
        /// Specific schemes to ask about
        #[arg(long)]
        schemes: Option<String>,
    },
    /// Support pathways for a rural business idea
    Entrepreneur {
        /// Business idea and available resources
        #[arg(long)]
        idea: String,
        /// Specific support of interest, e.g. MUDRA loan
        #[arg(long)]
        support: Option<String>,
    },
    /// List the registered advisory flows
    Flows,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Flows = cli.command {
        print_flows();
        return Ok(());
    }

    let config = SakshamConfig::resolve(&CliOverrides {
        provider: cli.provider,
        model: cli.model.clone(),
        config: cli.config.clone(),
    })?;
    let llm = create_provider(config.provider, config.llm.clone())?;
    let flows = AdvisoryFlows::new(llm).context("failed to build advisory flows")?;

    match cli.command {
        #[cfg(feature = "web")]
        Commands::Serve { bind, port } => {
            let bind = bind.unwrap_or(config.bind);
            let port = port.unwrap_or(config.port);
            web::run_serve(flows, &bind, port).await
        }
        Commands::Diagnose { photo } => {
            let raw = RawForm::new().file("photo", open_upload(&photo).await?);
            run_form(CropDoctor, flows.diagnosis, raw).await
        }
        Commands::MarketPrice { crop, dialect } => {
            let raw = RawForm::new().text("crop", crop).text("dialect", dialect);
            run_form(MarketPrices, flows.market_price, raw).await
        }
        Commands::Conserve {
            region,
            crops,
            soil_type,
            water_availability,
            climate,
            data,
        } => {
            let raw = RawForm::new()
                .text("region", region)
                .text("crops", crops)
                .text("soilType", soil_type)
                .text("waterAvailability", water_availability)
                .text("climate", climate)
                .file("environmentalData", open_upload(&data).await?);
            run_form(ConservationPlanner, flows.conservation, raw).await
        }
        Commands::Finance { details, schemes } => {
            let raw = RawForm::new()
                .text("farmerDetails", details)
                .text("schemeDetails", schemes.unwrap_or_default());
            run_form(FinancialAdvisory, flows.financial, raw).await
        }
        Commands::Entrepreneur { idea, support } => {
            let raw = RawForm::new()
                .text("farmerDetails", idea)
                .text("schemeDetails", support.unwrap_or_default());
            run_form(EntrepreneurshipSupport, flows.financial, raw).await
        }
        Commands::Flows => Ok(()),
    }
}

async fn open_upload(path: &Path) -> Result<Upload> {
    Upload::from_path(path)
        .await
        .with_context(|| format!("cannot open {}", path.display()))
}

async fn run_form<F: AdvisoryForm>(form: F, flow: Arc<F::Flow>, raw: RawForm) -> Result<()> {
    let title = form.id().title();
    let fields = form.fields();
    eprintln!("{} {}", title.cyan().bold(), form.pending_message().dimmed());

    let session = FormSession::new(form, flow, Arc::new(TracingNotifier));
    match session.submit(raw).await {
        Submission::Completed(card) => {
            print_card(&card);
            Ok(())
        }
        Submission::Invalid(errors) => {
            for error in errors.iter() {
                let label = fields
                    .iter()
                    .find(|f| f.name == error.field)
                    .map(|f| f.label)
                    .unwrap_or(error.field);
                eprintln!("  {} {}", format!("{label}:").yellow(), error.message.red());
            }
            bail!("{} field(s) need attention", errors.len())
        }
        Submission::Failed(notification) => {
            bail!("{}: {}", notification.title, notification.description)
        }
        Submission::Busy => bail!("{title} is already running"),
    }
}

fn print_card(card: &ResultCard) {
    println!();
    println!("{}", card.title.green().bold());
    if let Some(description) = &card.description {
        println!("{}", description.italic());
    }
    for section in &card.sections {
        println!();
        println!("{}", section.heading.yellow().bold());
        match section.emphasis {
            Emphasis::Normal => println!("{}", section.body),
            Emphasis::Highlight => println!("{}", section.body.bold()),
            Emphasis::Quote => println!("\"{}\"", section.body.italic()),
        }
    }
}

fn print_flows() {
    println!("{}", "Advisory flows".green().bold());
    for descriptor in AdvisoryFlows::descriptors() {
        let inputs: Vec<&str> = descriptor.input.fields.iter().map(|f| f.name).collect();
        let outputs: Vec<&str> = descriptor.output.fields.iter().map(|f| f.name).collect();
        println!();
        println!("  {}", descriptor.key.cyan().bold());
        println!("    {}", descriptor.description);
        println!("    {} {}", "in: ".dimmed(), inputs.join(", "));
        println!("    {} {}", "out:".dimmed(), outputs.join(", "));
    }
}
