use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sensorthings_hub::aggregator::UnifiedQuery;
use sensorthings_hub::collect::{Collector, HttpUpstreamClient};
use sensorthings_hub::config::{ConfigLoader, ResolvedConfig};
use sensorthings_hub::error::HubError;
use sensorthings_hub::handler::{DataResponse, QueryParams, SensorThingsHandler};
use sensorthings_hub::ontology::Ontology;
use sensorthings_hub::output::JsonOutput;
use sensorthings_hub::store::FsPayloadStore;

#[derive(Parser)]
#[command(name = "st-hub")]
#[command(about = "Unified OGC SensorThings view over air-quality feeds")]
#[command(version, author)]
struct Cli {
    /// Config file (defaults to ./st-hub.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Payload directory, overriding the config file
    #[arg(long, global = true)]
    store_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List Things across sources")]
    Things(SourceArgs),
    #[command(about = "Show one Thing by its namespaced id (e.g. irceline-1234)")]
    Thing(ThingArgs),
    #[command(about = "List Datastreams")]
    Datastreams(FilterArgs),
    #[command(about = "List enriched Observations")]
    Observations(FilterArgs),
    #[command(about = "List distinct ObservedProperties")]
    ObservedProperties(SourceArgs),
    #[command(about = "List registered sources")]
    Sources,
    #[command(about = "Fetch upstream data once and store it as the latest payload")]
    Collect(CollectArgs),
}

#[derive(Args)]
struct SourceArgs {
    #[arg(long)]
    source: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    source: Option<String>,

    /// Comma-separated property terms, e.g. `pm10,no2`
    #[arg(long)]
    property: Option<String>,
}

#[derive(Args)]
struct ThingArgs {
    id: String,
}

#[derive(Args)]
struct CollectArgs {
    /// Sources to collect; all registered sources when empty
    sources: Vec<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<HubError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &HubError) -> u8 {
    match error {
        HubError::ThingNotFound(_) | HubError::UnknownSource(_) => 2,
        HubError::Storage(_)
        | HubError::UpstreamHttp(_)
        | HubError::UpstreamStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = open_store(cli.store_dir, &resolved)?;

    let response = match cli.command {
        Commands::Collect(args) => return run_collect(args, store, &resolved),
        Commands::Things(args) => handler(store, &resolved)?.get_things(&source_params(args.source))?,
        Commands::Thing(args) => handler(store, &resolved)?.get_thing(&args.id)?,
        Commands::Datastreams(args) => {
            handler(store, &resolved)?.get_datastreams(&filter_params(args))?
        }
        Commands::Observations(args) => {
            handler(store, &resolved)?.get_observations(&filter_params(args))?
        }
        Commands::ObservedProperties(args) => {
            handler(store, &resolved)?.get_observed_properties(&source_params(args.source))?
        }
        Commands::Sources => handler(store, &resolved)?.get_sources()?,
    };
    print_response(&response)
}

fn handler(
    store: FsPayloadStore,
    resolved: &ResolvedConfig,
) -> miette::Result<SensorThingsHandler<FsPayloadStore>> {
    let query = UnifiedQuery::new(store, resolved.registry()?, Ontology::standard()?)
        .with_base_url(resolved.base_url.clone());
    Ok(SensorThingsHandler::new(query))
}

fn open_store(flag: Option<String>, resolved: &ResolvedConfig) -> miette::Result<FsPayloadStore> {
    match flag.map(Utf8PathBuf::from).or_else(|| resolved.store_dir.clone()) {
        Some(root) => Ok(FsPayloadStore::new_with_root(root)),
        None => Ok(FsPayloadStore::new()?),
    }
}

fn run_collect(
    args: CollectArgs,
    store: FsPayloadStore,
    resolved: &ResolvedConfig,
) -> miette::Result<ExitCode> {
    let registry = resolved.registry()?;
    let selected = if args.sources.is_empty() {
        registry.iter().collect::<Vec<_>>()
    } else {
        args.sources
            .iter()
            .map(|key| {
                registry
                    .get(key)
                    .ok_or_else(|| HubError::UnknownSource(key.clone()))
            })
            .collect::<Result<Vec<_>, HubError>>()?
    };

    let collector = Collector::new(HttpUpstreamClient::new()?, store);
    let mut reports = Vec::new();
    for source in selected {
        reports.push(collector.collect(source)?);
    }
    JsonOutput::print_collect(&reports).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}

fn source_params(source: Option<String>) -> QueryParams {
    QueryParams {
        source,
        property: None,
    }
}

fn filter_params(args: FilterArgs) -> QueryParams {
    QueryParams {
        source: args.source,
        property: args.property,
    }
}

fn print_response(response: &DataResponse) -> miette::Result<ExitCode> {
    JsonOutput::print_response(response).into_diagnostic()?;
    if response.is_success() {
        Ok(ExitCode::SUCCESS)
    } else if response.status == 404 {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::from(1))
    }
}
