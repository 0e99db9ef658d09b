//! FeatureFlag Kubernetes Operator binary.
//!
//! Watches FeatureFlag custom resources and keeps their status in sync
//! with their spec.

use clap::Parser;
use ff_operator::OperatorConfig;
use ff_operator::controller::{ControllerContext, FeatureFlagReconciler};
use ff_operator::crd::FeatureFlag;
use ff_operator::observability::{TracingConfig, init_tracing};
use ff_operator::registry::KindRegistry;
use ff_operator::runtime::Operator;
use ff_operator::store::KubeStore;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client};
use std::sync::Arc;

/// FeatureFlag operator.
#[derive(Parser)]
#[command(name = "ff-operator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the CRDs of every registered kind as YAML and exit
    #[arg(long)]
    generate_crds: bool,

    /// Namespace to watch (all namespaces when unset)
    #[arg(short, long, env = "FF_OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Number of concurrent reconcile workers
    #[arg(short, long, env = "FF_OPERATOR_WORKERS")]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::from_env())?;

    let registry = KindRegistry::operator_kinds();

    if cli.generate_crds {
        generate_crds(&registry)?;
        return Ok(());
    }

    let mut config = OperatorConfig::from_env();
    if let Some(namespace) = cli.namespace {
        config = config.with_namespace(namespace);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        workers = config.workers,
        "Starting FeatureFlag operator"
    );

    // Connect to Kubernetes
    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    let store = Arc::new(KubeStore::new(client.clone(), config.store_timeout));
    let ctx = Arc::new(ControllerContext::new(store, config.clone()));
    let reconciler = FeatureFlagReconciler::new(ctx);

    let flags: Api<FeatureFlag> = match &config.namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    Operator::new(&registry, reconciler, config)?
        .run(flags, WatcherConfig::default())
        .await;

    tracing::info!("FeatureFlag operator stopped");
    Ok(())
}

/// Generate CRD YAML documents.
fn generate_crds(registry: &KindRegistry) -> anyhow::Result<()> {
    for crd in registry.crds() {
        println!("---");
        println!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
