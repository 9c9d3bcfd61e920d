use std::sync::Arc;

use clap::Parser;

use center_ingest::cli::{Cli, Commands};
use center_ingest::commands;
use center_ingest::config::RunContext;
use center_ingest::error::PipelineError;
use center_ingest::gateway::{Gateway, InMemoryGateway};
use center_ingest::logging;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let gateway: Arc<dyn Gateway> = Arc::new(InMemoryGateway::new());

    let result = dispatch(&cli, gateway).await;
    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

async fn dispatch(cli: &Cli, gateway: Arc<dyn Gateway>) -> Result<(), PipelineError> {
    match &cli.command {
        Commands::ValidateSingleFile {
            project_id,
            filepath,
            center,
            filetype,
            parentid,
            format_registry_packages,
        } => {
            let _ = project_id;
            let valid = commands::validate_single_file::run(
                gateway.as_ref(),
                commands::validate_single_file::Args {
                    filepaths: filepath.clone(),
                    center: center.clone(),
                    filetype: filetype.clone(),
                    parentid: parentid.clone(),
                    format_registry_packages: format_registry_packages.clone(),
                },
            )
            .await?;
            if !valid {
                return Err(PipelineError::ValidationFailed("submission did not pass validation".to_string()));
            }
            Ok(())
        }
        Commands::BootstrapInfra {
            project_name,
            project_id,
            centers,
            format_registry_packages,
        } => {
            commands::bootstrap_infra::run(
                gateway.as_ref(),
                commands::bootstrap_infra::Args {
                    project_name: project_name.clone(),
                    project_id: project_id.clone(),
                    centers: centers.clone(),
                    format_registry_packages: format_registry_packages.clone(),
                },
            )
            .await
        }
        Commands::Process {
            project_id,
            center,
            only_validate,
            delete_old,
            format_registry_packages,
        } => {
            let ctx = RunContext::new(project_id.clone());
            let outcomes = commands::process::run(
                &ctx,
                Arc::clone(&gateway),
                commands::process::Args {
                    project_id: project_id.clone(),
                    center: center.clone(),
                    only_validate: *only_validate,
                    delete_old: *delete_old,
                    format_registry_packages: format_registry_packages.clone(),
                },
            )
            .await?;

            let mut any_fatal = false;
            for outcome in &outcomes {
                if let Some(fatal) = &outcome.fatal {
                    any_fatal = true;
                    eprintln!("center {} failed: {fatal}", outcome.center);
                } else {
                    println!(
                        "center {}: {} validated, {} invalid",
                        outcome.center, outcome.validated, outcome.invalid
                    );
                }
            }
            if any_fatal {
                return Err(PipelineError::Other("one or more centers failed".to_string()));
            }
            Ok(())
        }
        Commands::ReplaceDb {
            project_id,
            filetype,
            archive_project_id,
            table_name,
        } => {
            commands::replace_db::run(
                gateway.as_ref(),
                commands::replace_db::Args {
                    project_id: project_id.clone(),
                    filetype: filetype.clone(),
                    archive_project_id: archive_project_id.clone(),
                    table_name: table_name.clone(),
                },
            )
            .await
        }
        Commands::GetFileErrors { project_id, center } => {
            let _ = project_id;
            let report = commands::get_file_errors::run(gateway.as_ref(), center).await?;
            print!("{report}");
            Ok(())
        }
    }
}
