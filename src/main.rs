use robonav::config::ServerConfig;
use robonav::robonav_interface::navigation_service_server::NavigationServiceServer;
use robonav::service::NavigationServer;
use robonav::{DecisionEngine, EngineConfig, TimedPolicy};
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("robonav=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[cfg(feature = "rl")]
fn load_policy(config: &ServerConfig) -> Option<TimedPolicy> {
    use burn::backend::NdArray;
    use robonav::planners::policy::{NetworkPolicy, PolicyNetworkConfig};

    let path = config.model_path.as_ref()?;
    let policy = match NetworkPolicy::<NdArray>::load(
        path,
        &PolicyNetworkConfig::default(),
        Default::default(),
    ) {
        Ok(policy) => policy,
        Err(err) => {
            warn!("{}; continuing with path planning only", err);
            return None;
        }
    };

    match TimedPolicy::spawn(policy, config.policy_timeout) {
        Ok(policy) => Some(policy),
        Err(err) => {
            warn!("Could not start policy worker: {}", err);
            None
        }
    }
}

#[cfg(not(feature = "rl"))]
fn load_policy(config: &ServerConfig) -> Option<TimedPolicy> {
    if let Some(path) = &config.model_path {
        warn!(
            "Ignoring policy {}: built without the rl feature",
            path.display()
        );
    }
    None
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    init_logging();

    let mut engine = DecisionEngine::new(EngineConfig::default());
    if let Some(policy) = load_policy(&config) {
        engine = engine.with_policy(policy);
    }
    let engine = Arc::new(engine);

    info!(
        "Navigation engine ready on {} (policy: {}, timeout: {:?})",
        config.listen_addr,
        engine.policy_name(),
        config.policy_timeout
    );

    Server::builder()
        .add_service(NavigationServiceServer::new(NavigationServer::new(engine)))
        .serve(config.listen_addr)
        .await?;

    Ok(())
}
