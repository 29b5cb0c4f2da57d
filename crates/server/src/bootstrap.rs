use canteen_core::config::{AppConfig, ConfigError, LoadOptions, StartupConfig};
use canteen_core::numeric::NumericLimits;
use canteen_db::{
    connect_with_settings, migrations, run_legacy_price_policy, DbPool, DemoSeedDataset,
    LegacyPolicySummary, RepositoryError, SqlPurchaseRequestRepository,
};
use thiserror::Error;
use tracing::{error, info};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub limits: NumericLimits,
    pub startup: StartupReport,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub demo_rows_seeded: usize,
    pub legacy_policy: Option<LegacyPolicySummary>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("demo data seeding failed: {0}")]
    Seed(#[source] RepositoryError),
    #[error("legacy price policy failed: {0}")]
    LegacyPolicy(#[source] RepositoryError),
}

pub fn load_config(options: LoadOptions) -> Result<AppConfig, BootstrapError> {
    Ok(AppConfig::load(options)?)
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let startup = run_startup_tasks(&db_pool, &config.startup).await?;
    let limits = config.limits.numeric_limits();

    Ok(Application { config, db_pool, limits, startup })
}

/// Seeds demo data into an empty store, then repairs legacy rows. Any storage
/// failure aborts startup.
pub async fn run_startup_tasks(
    db_pool: &DbPool,
    startup: &StartupConfig,
) -> Result<StartupReport, BootstrapError> {
    let mut report = StartupReport::default();

    if startup.seed_demo_data {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM purchase_request")
            .fetch_one(db_pool)
            .await
            .map_err(|error| BootstrapError::Seed(error.into()))?;
        if existing == 0 {
            let seeded = DemoSeedDataset::load(db_pool).await.map_err(BootstrapError::Seed)?;
            report.demo_rows_seeded = seeded.newly_inserted;
            info!(
                event_name = "system.bootstrap.demo_seeded",
                correlation_id = "bootstrap",
                rows = seeded.newly_inserted,
                "demo purchase requests seeded"
            );
        }
    }

    if startup.apply_legacy_policy {
        let repository = SqlPurchaseRequestRepository::new(db_pool.clone());
        let summary = run_legacy_price_policy(&repository, "bootstrap").await.map_err(|err| {
            error!(
                event_name = "system.bootstrap.legacy_policy_failed",
                correlation_id = "bootstrap",
                error = %err,
                "aborting startup: legacy price policy could not be applied"
            );
            BootstrapError::LegacyPolicy(err)
        })?;
        report.legacy_policy = Some(summary);
    }

    Ok(report)
}
