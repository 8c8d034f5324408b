//! askdb entry point.

use std::sync::Arc;

use tracing::error;

use askdb::app::AppContainer;
use askdb::cli::{AppCommand, Cli};
use askdb::config::Config;
use askdb::db::QueryExecutor;
use askdb::error::Result;
use askdb::logging;
use askdb::models::QueryRequest;
use askdb::session::SessionManager;

#[tokio::main]
async fn main() {
    // Load a .env file when present; real environment variables win.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let config = match Config::from_env() {
        Ok(config) => config.into_shared(),
        Err(e) => {
            eprintln!("{}: {e}", e.category());
            std::process::exit(1);
        }
    };

    let command = cli.into_command();
    match command {
        // Interactive sessions own stdout; logs go to the configured file.
        AppCommand::Interactive => logging::init_file_logging(&config.log_file),
        _ => logging::init_stderr_logging(),
    }

    tracing::info!(env = %config.app_env, "starting askdb");

    if let Err(e) = run(command, config).await {
        error!("{}: {e}", e.category());
        eprintln!("{}: {e}", e.category());
        std::process::exit(1);
    }
}

async fn run(command: AppCommand, config: Arc<Config>) -> Result<()> {
    let container = AppContainer::new(config)?;

    let outcome = match command {
        AppCommand::Interactive => {
            container.warm_up().await;
            let manager = SessionManager::new(container.processor());
            manager.start_new_session().await
        }
        AppCommand::Query { text } => {
            container.warm_up().await;
            let request = QueryRequest::new(text)?;
            let reply = container.processor().process(&request).await;
            println!("{reply}");
            Ok(())
        }
        AppCommand::Health => health_check(&container).await,
    };

    let shutdown = container.shutdown().await;
    outcome.and(shutdown)
}

async fn health_check(container: &AppContainer) -> Result<()> {
    let schema_status = match container.schema().get_schema().await {
        Ok(catalog) if catalog.is_empty() => "warning: schema loaded but empty".to_string(),
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    println!("Schema: {schema_status}");

    if container.config().execute_queries {
        match container.database().ping().await {
            Ok(()) => println!("Engine: ok"),
            Err(e) => println!("Engine: error: {e}"),
        }
    } else {
        println!("Engine: skipped (query execution disabled)");
    }

    Ok(())
}
