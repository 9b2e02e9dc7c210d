use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use glr_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, LoadedConfig, ReadinessConfig,
    UnusedKeyPolicy,
};
use glr_daemon::{
    runner::{execute_run, RunContext, RunOverrides},
    state::ODataConnector,
};
use glr_db::{MemorySnapshotStore, PgSnapshotStore, SnapshotStore};
use glr_odata::normalize_base_url;
use tracing::warn;

#[derive(Parser)]
#[command(name = "glr")]
#[command(about = "Go-live readiness CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> tenant -> local)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail instead of warning when a config key is not read by anything
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Run every readiness gate now and store the snapshot
    Run {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Instance URL the snapshot is stored under (overrides scope.instance_url)
        #[arg(long)]
        instance_url: Option<String>,

        /// OData API base URL (overrides directory.api_base_url)
        #[arg(long)]
        api_base_url: Option<String>,

        /// Company id carried into the result (overrides scope.company_id)
        #[arg(long)]
        company_id: Option<String>,

        /// Print the full metrics JSON after the summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the latest stored snapshot
    Latest {
        /// Restrict to one instance URL; latest overall when omitted
        #[arg(long)]
        instance_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = glr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = glr_db::status(&pool).await?;
                    println!("db_ok={} has_snapshots_table={}", s.ok, s.has_snapshots_table);
                }
                DbCmd::Migrate => {
                    glr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths, strict } => {
            let loaded = load_config(&paths, strict)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run {
            config_paths,
            instance_url,
            api_base_url,
            company_id,
            json,
        } => {
            let loaded = load_config(&config_paths, false)?;
            let config = ReadinessConfig::from_config_json(&loaded.config_json)?;
            let secrets = resolve_secrets(&loaded.config_json);
            let store = snapshot_store_from_env().await?;

            let ctx = RunContext {
                config: &config,
                config_hash: &loaded.config_hash,
                secrets: &secrets,
                connector: &ODataConnector,
                store: store.as_ref(),
            };
            let overrides = RunOverrides {
                instance_url,
                api_base_url,
                company_id,
            };
            let outcome = execute_run(&ctx, &overrides).await?;
            let r = &outcome.result;

            println!("snapshot_id={}", outcome.snapshot_id);
            println!("scope_key={}", outcome.scope_key);
            println!("config_hash={}", loaded.config_hash);
            println!("risk_score={}", r.risk_score);
            println!("active_users={} inactive_users={}", r.active_users, r.inactive_users);
            println!(
                "missing_manager={} invalid_org={} missing_email={} duplicate_email={}",
                r.missing_manager_count,
                r.invalid_org_count,
                r.missing_email_count,
                r.duplicate_email_count
            );
            println!("contingent_workers={}", r.contingent_workers);
            if json {
                println!("{}", serde_json::to_string_pretty(r)?);
            }
        }

        Commands::Latest { instance_url } => {
            let pool = glr_db::connect_from_env().await?;
            let store = PgSnapshotStore::new(pool);
            let scope_key = instance_url
                .as_deref()
                .map(normalize_base_url)
                .filter(|s| !s.is_empty());
            match store.load_latest(scope_key.as_deref()).await? {
                None => println!("status=empty"),
                Some(s) => {
                    println!("status=ok");
                    println!("snapshot_id={}", s.snapshot_id);
                    println!("scope_key={}", s.scope_key);
                    println!("taken_at_utc={}", s.taken_at_utc.to_rfc3339());
                    println!("config_hash={}", s.config_hash);
                    println!("{}", serde_json::to_string_pretty(&s.metrics)?);
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn load_config(paths: &[String], strict: bool) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "config key is not read by anything");
    }
    Ok(loaded)
}

/// Postgres when GLR_DATABASE_URL is set; otherwise the snapshot only lives
/// for this process.
async fn snapshot_store_from_env() -> Result<Arc<dyn SnapshotStore>> {
    if std::env::var(glr_db::ENV_DB_URL).is_err() {
        warn!("GLR_DATABASE_URL not set; the snapshot will not be persisted");
        return Ok(Arc::new(MemorySnapshotStore::new()));
    }
    let pool = glr_db::connect_from_env().await?;
    let st = glr_db::status(&pool).await?;
    if !st.has_snapshots_table {
        bail!("readiness_snapshots table missing; run `glr db migrate` first");
    }
    Ok(Arc::new(PgSnapshotStore::new(pool)))
}
