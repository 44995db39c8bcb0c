//! surveyd: operator interface to the survey assignment engine.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use survey_dispatch::config::Config;
use survey_dispatch::db::Db;
use survey_dispatch::engine::Dispatcher;
use survey_dispatch::model::{CatalogId, CatalogManifest, DefaultFields, NewCatalog, Payload};
use survey_dispatch::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "surveyd", about = "Distribute survey elements among surveyors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Catalog operations
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Reference dataset operations
    Reference {
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Get the current or next assignment for a surveyor
    Next {
        /// Catalog ID
        catalog: uuid::Uuid,
        /// Surveyor identity
        worker: String,
    },
    /// Submit a payload and close its claim
    Complete {
        /// Surveyor identity
        worker: String,
        /// JSON file holding the payload
        payload: PathBuf,
    },
    /// Dump every claim in a catalog as JSON lines
    Report {
        /// Catalog ID
        catalog: uuid::Uuid,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Create an empty catalog
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Publish work items from a TOML manifest
    Publish {
        /// Catalog ID
        catalog: uuid::Uuid,
        /// Manifest path
        manifest: PathBuf,
    },
    /// Show a catalog and its items
    Show {
        /// Catalog ID
        catalog: uuid::Uuid,
    },
}

#[derive(Subcommand)]
enum ReferenceAction {
    /// Load reference rows from a JSON array
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "surveyd".to_string(),
        default_level: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret(), config.db_max_connections).await?;
    db.migrate().await?;
    let dispatcher = Dispatcher::new(Arc::new(db));

    match cli.command {
        Command::Migrate => {
            println!("Migrations applied.");
            Ok(())
        }
        Command::Catalog { action } => match action {
            CatalogAction::Create { title, description } => {
                if !dispatcher.db().title_available(&title).await? {
                    anyhow::bail!("catalog title {title:?} is already taken");
                }
                let catalog = dispatcher
                    .db()
                    .create_catalog(NewCatalog::new(title).description(description))
                    .await?;
                println!("{}", catalog.id);
                Ok(())
            }
            CatalogAction::Publish { catalog, manifest } => {
                cmd_catalog_publish(&dispatcher, CatalogId(catalog), manifest).await
            }
            CatalogAction::Show { catalog } => cmd_catalog_show(&dispatcher, CatalogId(catalog)).await,
        },
        Command::Reference {
            action: ReferenceAction::Import { file },
        } => {
            let rows: Vec<DefaultFields> = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let written = dispatcher.db().import_reference(&rows).await?;
            println!("Imported {written} reference row(s).");
            Ok(())
        }
        Command::Next { catalog, worker } => {
            let response = dispatcher.assign(CatalogId(catalog), &worker).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Complete { worker, payload } => {
            let payload: Payload = serde_json::from_str(&std::fs::read_to_string(&payload)?)?;
            let claim = dispatcher.complete(&worker, payload).await?;
            println!("Completed claim {}", claim.id);
            Ok(())
        }
        Command::Report { catalog } => {
            for row in dispatcher.db().catalog_report(CatalogId(catalog)).await? {
                println!("{}", serde_json::to_string(&row)?);
            }
            Ok(())
        }
    }
}

async fn cmd_catalog_publish(
    dispatcher: &Dispatcher,
    catalog: CatalogId,
    manifest: PathBuf,
) -> anyhow::Result<()> {
    let manifest = CatalogManifest::load(&manifest)?;
    let items = dispatcher.db().publish_catalog(catalog, manifest.items).await?;
    println!("Published {} item(s) into {catalog}.", items.len());
    Ok(())
}

async fn cmd_catalog_show(dispatcher: &Dispatcher, catalog: CatalogId) -> anyhow::Result<()> {
    let db = dispatcher.db();
    let info = db.get_catalog(catalog).await?;
    let items = db.list_work_items(catalog).await?;

    println!("ID:          {}", info.id);
    println!("Title:       {}", info.title);
    println!("Description: {}", info.description);
    println!("Active:      {}", info.active);
    println!("Created:     {}", info.created_at.format("%Y-%m-%d %H:%M"));
    println!("---");

    if items.is_empty() {
        println!("No items published.");
        return Ok(());
    }

    println!("{:<8}  {:<10}  {:<12}  ID", "ORDER", "KIND", "EXTERNAL");
    println!("{}", "-".repeat(72));
    for item in &items {
        println!(
            "{:<8}  {:<10}  {:<12}  {}",
            item.order_key, item.kind, item.external_ref, item.id
        );
    }
    println!("\n{} item(s)", items.len());
    Ok(())
}
