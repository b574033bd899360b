use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use pingone_core::context::OperationContext;
use pingone_core::diagnostics::{Diagnostics, Severity};
use pingone_core::engine::{Engine, Plan, PlanAction};
use pingone_core::provider::HookResponse;
use pingone_core::resource::{Attributes, Resource, State, Value};
use pingone_core::schema::{AttributeMode, ResourceSchema};
use pingone_provider::product::ProductCatalog;
use pingone_provider::region::RegionTable;
use pingone_provider::{Operation, PingOneProvider, ProviderConfig};

#[derive(Parser)]
#[command(name = "pingone")]
#[command(about = "Drive PingOne resource descriptors from the command line", long_about = None)]
struct Cli {
    /// Provider configuration document (JSON); defaults to PINGONE_* environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resource and data-source types
    Types,
    /// Print the schema of a resource or data-source type
    Schema {
        type_name: String,
    },
    /// List regions
    Regions,
    /// List service products
    Products,
    /// Show what applying a configuration would do
    Plan {
        /// Configuration document
        file: PathBuf,
        /// Current state document
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Create the resource described by a configuration document
    Create {
        file: PathBuf,
    },
    /// Refresh a resource by id
    Read {
        type_name: String,
        id: String,
        /// Extra state attributes, e.g. environment_id=<id>
        #[arg(long = "attribute", short = 'a', value_name = "KEY=VALUE")]
        attributes: Vec<String>,
    },
    /// Apply a configuration document to an existing resource
    Update {
        state: PathBuf,
        file: PathBuf,
    },
    /// Delete the resource recorded in a state document
    Delete {
        state: PathBuf,
    },
    /// Import an existing resource
    Import {
        type_name: String,
        id: String,
    },
    /// Read a data source described by a configuration document
    Lookup {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Types => with_provider(cli.config.as_deref()).map(|p| run_types(&p)),
        Commands::Schema { type_name } => {
            with_provider(cli.config.as_deref()).and_then(|p| run_schema(&p, &type_name))
        }
        Commands::Regions => {
            run_regions();
            Ok(true)
        }
        Commands::Products => {
            run_products();
            Ok(true)
        }
        Commands::Plan { file, state } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_plan(&p, &file, state.as_deref()),
            Err(e) => Err(e),
        },
        Commands::Create { file } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_create(&p, &file).await,
            Err(e) => Err(e),
        },
        Commands::Read {
            type_name,
            id,
            attributes,
        } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_read(&p, &type_name, &id, &attributes).await,
            Err(e) => Err(e),
        },
        Commands::Update { state, file } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_update(&p, &state, &file).await,
            Err(e) => Err(e),
        },
        Commands::Delete { state } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_delete(&p, &state).await,
            Err(e) => Err(e),
        },
        Commands::Import { type_name, id } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_import(&p, &type_name, &id).await,
            Err(e) => Err(e),
        },
        Commands::Lookup { file } => match with_provider(cli.config.as_deref()) {
            Ok(p) => run_lookup(&p, &file).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn with_provider(config: Option<&Path>) -> Result<PingOneProvider, String> {
    let config = match config {
        Some(path) => ProviderConfig::from_json(&read_file(path)?),
        None => ProviderConfig::from_env(),
    }
    .map_err(|e| e.to_string())?;
    PingOneProvider::configure(&config).map_err(|e| e.to_string())
}

// =========================================================================
// Commands
// =========================================================================

fn run_types(provider: &PingOneProvider) -> bool {
    let engine = Engine::new(provider);
    println!("{}", "Resources:".cyan().bold());
    for name in engine.resource_types() {
        println!("  {}", name);
    }
    println!("{}", "Data sources:".cyan().bold());
    for name in engine.data_source_types() {
        println!("  {}", name);
    }
    true
}

fn run_schema(provider: &PingOneProvider, type_name: &str) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let schema = engine
        .resource_schema(type_name)
        .or_else(|| engine.data_source_schema(type_name))
        .ok_or_else(|| format!("Unknown type: {}", type_name))?;
    print_schema(&schema);
    Ok(true)
}

fn run_regions() {
    println!("{}", "Regions:".cyan().bold());
    for region in RegionTable::builtin().all() {
        let marker = if region.selectable { "" } else { " (not selectable)" };
        println!(
            "  {:<14} {:<4} {}{}",
            region.name,
            region.api_code,
            region.host("api"),
            marker
        );
    }
}

fn run_products() {
    println!("{}", "Products:".cyan().bold());
    for product in ProductCatalog::builtin().all() {
        let mut notes = Vec::new();
        if product.has_console {
            notes.push("console");
        }
        if !product.selectable {
            notes.push("internal");
        }
        println!(
            "  {:<16} {:<22} {}",
            product.code,
            product.api_code,
            notes.join(", ")
        );
    }
}

fn run_plan(provider: &PingOneProvider, file: &Path, state: Option<&Path>) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let config = load_resource(file)?;
    let prior = state.map(|path| load_state(&engine, path)).transpose()?;

    let response = engine.plan(prior.as_ref(), &config);
    let ok = print_diagnostics(&response.diagnostics);
    if let Some(plan) = response.plan {
        print_plan(&plan);
    }
    Ok(ok)
}

async fn run_create(provider: &PingOneProvider, file: &Path) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let config = load_resource(file)?;
    let response = engine.plan(None, &config);
    if !print_diagnostics(&response.diagnostics) {
        return Ok(false);
    }
    let Some(plan) = response.plan else {
        return Ok(false);
    };
    print_plan(&plan);

    let ctx = context(provider, &config.resource_type, Operation::Create);
    let response = engine.create(&ctx, &plan.planned).await;
    Ok(finish(response, &config.resource_type))
}

async fn run_read(
    provider: &PingOneProvider,
    type_name: &str,
    id: &str,
    extra: &[String],
) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let mut attributes = Attributes::new();
    attributes.insert("id".to_string(), Value::string(id));
    for pair in extra {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
        attributes.insert(key.to_string(), Value::string(value));
    }
    let current = State::existing(type_name, attributes).with_identifier(id);

    let ctx = context(provider, type_name, Operation::Read);
    let response = engine.read(&ctx, &current).await;
    Ok(finish(response, type_name))
}

async fn run_update(provider: &PingOneProvider, state: &Path, file: &Path) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let prior = load_state(&engine, state)?;
    let config = load_resource(file)?;

    let response = engine.plan(Some(&prior), &config);
    if !print_diagnostics(&response.diagnostics) {
        return Ok(false);
    }
    let Some(plan) = response.plan else {
        return Ok(false);
    };
    print_plan(&plan);
    match plan.action {
        PlanAction::NoChange => return Ok(true),
        PlanAction::Replace => {
            return Err(format!(
                "Changing {} requires replacement; delete and create the resource instead",
                plan.requires_replace.join(", ")
            ));
        }
        PlanAction::Create | PlanAction::Update => {}
    }

    let ctx = context(provider, &config.resource_type, Operation::Update);
    let response = engine.update(&ctx, &prior, &plan.planned).await;
    Ok(finish(response, &config.resource_type))
}

async fn run_delete(provider: &PingOneProvider, state: &Path) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let prior = load_state(&engine, state)?;

    println!(
        "{} {} {}",
        "-".red().bold(),
        prior.resource_type.cyan().bold(),
        prior.identifier.as_deref().unwrap_or("(no id)")
    );
    let ctx = context(provider, &prior.resource_type, Operation::Delete);
    let diagnostics = engine.delete(&ctx, &prior).await;
    let ok = print_diagnostics(&diagnostics);
    if ok {
        println!("{}", "Deleted.".green());
    }
    Ok(ok)
}

async fn run_import(provider: &PingOneProvider, type_name: &str, id: &str) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let ctx = context(provider, type_name, Operation::Import);
    let response = engine.import(&ctx, type_name, id).await;
    Ok(finish(response, type_name))
}

async fn run_lookup(provider: &PingOneProvider, file: &Path) -> Result<bool, String> {
    let engine = Engine::new(provider);
    let config = load_resource(file)?;
    let ctx = context(provider, &config.resource_type, Operation::Read);
    let response = engine.read_data_source(&ctx, &config).await;
    Ok(finish(response, &config.resource_type))
}

/// Context for one operation; Ctrl-C cancels it
fn context(provider: &PingOneProvider, type_name: &str, operation: Operation) -> OperationContext {
    let timeout: Duration = provider.timeout(type_name, operation);
    log::debug!("{:?} {} with timeout {:?}", operation, type_name, timeout);
    let (ctx, handle) = OperationContext::new(timeout);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling...".yellow());
            handle.cancel();
        }
    });
    ctx
}

/// Print diagnostics and the resulting state; true when nothing failed
fn finish(response: HookResponse, type_name: &str) -> bool {
    let ok = print_diagnostics(&response.diagnostics);
    match response.state {
        Some(state) => {
            let document = state_document(type_name, &state);
            match serde_json::to_string_pretty(&document) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            }
        }
        None if ok => println!("{}", "Resource no longer exists.".yellow()),
        None => {}
    }
    ok
}

// =========================================================================
// Documents
// =========================================================================

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn read_json(path: &Path) -> Result<serde_json::Value, String> {
    serde_json::from_str(&read_file(path)?)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn document_parts(
    path: &Path,
    document: &serde_json::Value,
) -> Result<(String, Attributes), String> {
    let type_name = document
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| format!("{}: missing \"type\"", path.display()))?;
    let attributes = match document.get("attributes") {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect(),
        Some(_) => return Err(format!("{}: \"attributes\" must be an object", path.display())),
        None => Attributes::new(),
    };
    Ok((type_name.to_string(), attributes))
}

/// `{ "type": ..., "attributes": {...} }`
fn load_resource(path: &Path) -> Result<Resource, String> {
    let document = read_json(path)?;
    let (resource_type, attributes) = document_parts(path, &document)?;
    Ok(Resource {
        resource_type,
        attributes,
    })
}

/// `{ "type": ..., "id": ..., "attributes": {...} }`; set-typed
/// attributes are restored from their JSON arrays
fn load_state(engine: &Engine, path: &Path) -> Result<State, String> {
    let document = read_json(path)?;
    let (type_name, mut attributes) = document_parts(path, &document)?;
    let schema = engine
        .resource_schema(&type_name)
        .ok_or_else(|| format!("Unknown resource type: {}", type_name))?;
    schema.normalize(&mut attributes);

    let mut state = State::existing(type_name, attributes);
    if let Some(id) = document.get("id").and_then(|v| v.as_str()) {
        state = state.with_identifier(id);
    }
    Ok(state)
}

fn state_document(type_name: &str, state: &State) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = state
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), to_json(v)))
        .collect();
    serde_json::json!({
        "type": type_name,
        "id": state.identifier,
        "attributes": attributes,
    })
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Unknown => serde_json::Value::Null,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Value::from(*n),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::List(items) | Value::Set(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

// =========================================================================
// Output
// =========================================================================

/// Print diagnostics; false when any is an error or the operation was
/// cancelled before it finished
fn print_diagnostics(diagnostics: &Diagnostics) -> bool {
    for diagnostic in diagnostics.iter() {
        let label = match diagnostic.severity {
            Severity::Error => "Error:".red().bold(),
            Severity::Warning => "Warning:".yellow().bold(),
        };
        eprintln!("{} {}", label, diagnostic);
    }
    diagnostics.succeeded()
}

fn print_plan(plan: &Plan) {
    let (symbol, verb) = match plan.action {
        PlanAction::Create => ("+".green().bold(), "create"),
        PlanAction::Update => ("~".yellow().bold(), "update"),
        PlanAction::Replace => ("-/+".red().bold(), "replace"),
        PlanAction::NoChange => {
            println!("{}", "No changes.".green());
            return;
        }
    };
    println!("{}", "Execution Plan:".cyan().bold());
    println!(
        "  {} {} ({})",
        symbol,
        plan.planned.resource_type.cyan().bold(),
        verb
    );
    for name in &plan.changed_attributes {
        let value = plan.planned.get(name);
        let marker = if plan.requires_replace.contains(name) {
            " # forces replacement".red().to_string()
        } else {
            String::new()
        };
        println!("      {}: {}{}", name, value.to_string().green(), marker);
    }
}

fn print_schema(schema: &ResourceSchema) {
    println!("{}", schema.resource_type.cyan().bold());
    if let Some(ref description) = schema.description {
        println!("  {}", description);
    }
    for attribute in schema.attributes.values() {
        let mode = match attribute.mode {
            AttributeMode::Required => "required",
            AttributeMode::Optional => "optional",
            AttributeMode::Computed => "computed",
            AttributeMode::OptionalComputed => "optional, computed",
        };
        let mut flags = vec![mode.to_string()];
        if attribute.requires_replace {
            flags.push("forces replacement".to_string());
        }
        if attribute.sensitive {
            flags.push("sensitive".to_string());
        }
        if let Some(ref default) = attribute.default {
            flags.push(format!("default {}", default));
        }
        println!("  {:<32} {}", attribute.name, flags.join(", ").dimmed());
    }
    if let Some(ref discriminator) = schema.discriminator {
        println!("  variants by {}:", discriminator.attribute);
        for variant in &discriminator.variants {
            println!("    {}: {}", variant.value, variant.attributes.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use pingone_core::diagnostics::Diagnostic;

    use super::*;

    #[test]
    fn state_documents_drop_unknowns_and_flatten_sets() {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), Value::string("env1"));
        attributes.insert("organization_id".to_string(), Value::Unknown);
        attributes.insert(
            "service".to_string(),
            Value::set([Value::object([("type", Value::string("SSO"))])]),
        );
        let state = State::existing("pingone_environment", attributes).with_identifier("A1B2");

        let document = state_document("pingone_environment", &state);
        assert_eq!(document["id"], "A1B2");
        assert_eq!(document["attributes"]["organization_id"], serde_json::Value::Null);
        assert_eq!(
            document["attributes"]["service"],
            serde_json::json!([{"type": "SSO"}])
        );
    }

    #[test]
    fn cancelled_operations_do_not_count_as_done() {
        let diagnostics: Diagnostics = Diagnostic::warning("Operation cancelled")
            .interrupting()
            .into();
        assert!(!print_diagnostics(&diagnostics));
        assert!(!finish(HookResponse::failed(diagnostics), "pingone_environment"));
        assert!(print_diagnostics(&Diagnostics::new()));
    }
}
