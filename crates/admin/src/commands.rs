//! Command execution.

use std::{io::Write, sync::Arc};

use snafu::ResultExt;
use tessera_kv::{DataMigrationService, MigrationStatus, Service};
use tessera_store::{Database, DatabaseConfig, StorageBackend};
use tessera_types::{BucketFilter, Config, Context, config};
use tracing::instrument;

use crate::{
    cli::{BucketsAction, Command, ConfigAction, MigrationAction},
    error::{AdminError, OpenStoreSnafu, OutputSnafu, RenderSnafu, ServiceSnafu},
};

/// Runs `command`, writing its output to `out`.
///
/// # Errors
///
/// Returns an [`AdminError`] if the store cannot be opened or the command fails.
pub fn run(command: &Command, config: &Config, out: &mut dyn Write) -> Result<(), AdminError> {
    if let Command::Config { action } = command {
        return print_config(*action, out);
    }

    let db_config = DatabaseConfig::builder().sync_on_commit(config.storage.sync_on_commit).build();
    match &config.storage.path {
        Some(path) => {
            let db = if is_read_only(command) {
                Database::open_with_config(path, db_config)
            } else {
                Database::open_or_create(path, db_config)
            }
            .context(OpenStoreSnafu)?;
            tracing::info!(path = %path.display(), "Opened store");
            run_with_store(command, config, Service::new(Arc::new(db)), out)
        },
        None => {
            tracing::warn!(
                "Running against an in-memory store. Nothing is persisted. \
                 Set --data or TESSERA__STORAGE__PATH to use a database file."
            );
            let db = Database::open_in_memory_with_config(db_config).context(OpenStoreSnafu)?;
            run_with_store(command, config, Service::new(Arc::new(db)), out)
        },
    }
}

/// Runs a store-backed command against `service`.
///
/// # Errors
///
/// Returns an [`AdminError`] if the command fails.
pub fn run_with_store<B: StorageBackend>(
    command: &Command,
    config: &Config,
    service: Service<B>,
    out: &mut dyn Write,
) -> Result<(), AdminError> {
    let ctx = Context::background();
    if !is_read_only(command) {
        service.initialize(&ctx).context(ServiceSnafu)?;
    }

    match command {
        Command::Migration { action: MigrationAction::Status } => {
            migration_status(&service, &ctx, out)
        },
        Command::Migration { action: MigrationAction::Run { .. } } => {
            migration_run(&service, config, out)
        },
        Command::Buckets { action: BucketsAction::List { org_id, org, name } } => {
            let filter = BucketFilter {
                id: None,
                name: name.clone(),
                organization_id: *org_id,
                org: org.clone(),
            };
            list_buckets(&service, config, &filter, out)
        },
        Command::Config { action } => print_config(*action, out),
    }
}

/// Commands that never write, and so never create the store or its partitions.
fn is_read_only(command: &Command) -> bool {
    matches!(
        command,
        Command::Migration { action: MigrationAction::Status } | Command::Config { .. }
    )
}

fn migration_status<B: StorageBackend>(
    service: &Service<B>,
    ctx: &Context,
    out: &mut dyn Write,
) -> Result<(), AdminError> {
    let status = service.bucket_migration_status(ctx).context(ServiceSnafu)?;
    let line = match status {
        MigrationStatus::Migrated => "migrated".to_string(),
        MigrationStatus::NotMigrated => "not migrated".to_string(),
        MigrationStatus::UnexpectedMarker(value) => {
            format!("not migrated (unexpected flag value {value:02x?})")
        },
    };
    for name in service.migrations() {
        writeln!(out, "{name}: {line}").context(OutputSnafu)?;
    }
    Ok(())
}

#[instrument(skip_all, fields(timeout = %humantime::format_duration(config.migration.timeout)))]
fn migration_run<B: StorageBackend>(
    service: &Service<B>,
    config: &Config,
    out: &mut dyn Write,
) -> Result<(), AdminError> {
    let ctx = Context::background().with_timeout(config.migration.timeout);
    let converted = service.ensure_migrated(&ctx).context(ServiceSnafu)?;
    let line = if converted { "converted" } else { "already migrated" };
    for name in service.migrations() {
        writeln!(out, "{name}: {line}").context(OutputSnafu)?;
    }
    Ok(())
}

fn list_buckets<B: StorageBackend>(
    service: &Service<B>,
    config: &Config,
    filter: &BucketFilter,
    out: &mut dyn Write,
) -> Result<(), AdminError> {
    let ctx = Context::background();
    if !service.is_migrated(&ctx) {
        if !config.migration.auto_migrate {
            return Err(AdminError::NotMigrated);
        }
        let migration_ctx = Context::background().with_timeout(config.migration.timeout);
        service.ensure_migrated(&migration_ctx).context(ServiceSnafu)?;
    }

    let buckets = service.find_buckets(&ctx, filter).context(ServiceSnafu)?;
    tracing::debug!(count = buckets.len(), filter = %filter, "Listed buckets");
    for bucket in &buckets {
        let line = serde_json::to_string(bucket).context(RenderSnafu)?;
        writeln!(out, "{line}").context(OutputSnafu)?;
    }
    Ok(())
}

fn print_config(action: ConfigAction, out: &mut dyn Write) -> Result<(), AdminError> {
    let text = match action {
        ConfigAction::Schema => config::config_schema(),
        ConfigAction::Example => config::config_example(),
    };
    write!(out, "{text}").context(OutputSnafu)
}
