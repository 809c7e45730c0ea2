//! `arbor` command-line driver
//!
//! Loads a JSON snapshot of units and object groups into the in-memory
//! store, then computes ancestor graphs or resolves inherited rules.

use anyhow::{bail, Context, Result};
use arbor_graph::{GraphComputeConfig, GraphComputeService, InMemoryMetadataStore, Selector};
use arbor_model::{Collection, DocumentId, Snapshot};
use arbor_rules::RuleResolver;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("arbor")
        .version(arbor_graph::VERSION)
        .about("Ancestor-graph computation for archival metadata")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("compute")
                .about("Compute derived graph fields and print the run report")
                .arg(input_arg())
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("collection")
                        .long("collection")
                        .value_parser(value_parser!(String))
                        .help("Restrict the run to one collection (unit, objectgroup)"),
                )
                .arg(
                    Arg::new("ids")
                        .long("ids")
                        .value_delimiter(',')
                        .requires("collection")
                        .help("Comma-separated document ids to recompute"),
                )
                .arg(
                    Arg::new("query")
                        .long("query")
                        .requires("collection")
                        .conflicts_with("ids")
                        .help("JSON object filter selecting the documents to recompute"),
                )
                .arg(
                    Arg::new("with-object-groups")
                        .long("with-object-groups")
                        .action(ArgAction::SetTrue)
                        .requires("ids")
                        .help("Also recompute object groups attached to the given units"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the updated snapshot to this file"),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("Resolve the rules in force on a unit")
                .arg(input_arg())
                .arg(
                    Arg::new("unit")
                        .long("unit")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Unit id (repeatable)"),
                ),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .long("input")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON snapshot file")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_store(path: &Path) -> Result<Arc<InMemoryMetadataStore>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    tracing::info!(
        "Loaded {} units and {} object groups from {}",
        snapshot.units.len(),
        snapshot.object_groups.len(),
        path.display()
    );
    Ok(Arc::new(InMemoryMetadataStore::from_snapshot(snapshot)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn parse_query(raw: &str) -> Result<Selector> {
    match serde_json::from_str(raw).context("--query is not valid JSON")? {
        serde_json::Value::Object(filter) => Ok(Selector::Query(filter)),
        other => bail!("--query must be a JSON object, got {other}"),
    }
}

fn compute(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .context("missing --input")?;
    let store = load_store(input)?;

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => GraphComputeConfig::from_path(path)
            .with_context(|| format!("invalid configuration {}", path.display()))?,
        None => GraphComputeConfig::default(),
    };
    let collection = args
        .get_one::<String>("collection")
        .map(|name| name.parse::<Collection>())
        .transpose()?;
    let ids: Option<Vec<String>> = args
        .get_many::<String>("ids")
        .map(|values| values.cloned().collect());
    let query = args
        .get_one::<String>("query")
        .map(|raw| parse_query(raw))
        .transpose()?;

    let service = GraphComputeService::new(store.clone(), config)?;
    match (collection, ids, query) {
        (Some(collection), Some(ids), _) => {
            let outcome = service.build_graph_for_ids(
                collection,
                ids,
                args.get_flag("with-object-groups"),
            )?;
            print_json(&outcome)?;
        }
        (Some(collection), None, selector) => {
            let selector = selector.unwrap_or(Selector::Pending);
            let outcome = service.build_graph_for(collection, &selector)?;
            print_json(&outcome)?;
        }
        (None, _, _) => {
            let outcome = service.build_graph()?;
            print_json(&outcome)?;
        }
    }

    if let Some(output) = args.get_one::<PathBuf>("output") {
        let rendered = serde_json::to_string_pretty(&store.snapshot())
            .context("failed to render snapshot")?;
        std::fs::write(output, rendered)
            .with_context(|| format!("failed to write snapshot {}", output.display()))?;
        tracing::info!("Updated snapshot written to {}", output.display());
    }
    Ok(())
}

fn rules(args: &ArgMatches) -> Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .context("missing --input")?;
    let store = load_store(input)?;
    let unit_ids: Vec<DocumentId> = args
        .get_many::<String>("unit")
        .context("missing --unit")?
        .map(|id| DocumentId::from(id.as_str()))
        .collect();

    let resolver = RuleResolver::new(store);
    let resolved = resolver.resolve_many(&unit_ids)?;
    if resolved.iter().any(|r| !r.is_unambiguous()) {
        tracing::warn!("Some rules have equal-depth conflicts; see the conflicts list");
    }
    print_json(&resolved)
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("compute", args)) => compute(args),
        Some(("rules", args)) => rules(args),
        Some((other, _)) => bail!("unknown command {other}"),
        None => bail!("no command given"),
    }
}
