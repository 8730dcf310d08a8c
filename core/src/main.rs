use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokeneasy_core::api::{self, AppState};
use tokeneasy_core::args;
use tokeneasy_core::contract::{ContractCall, SorobanContractClient};
use tokeneasy_core::contract_write::ContractWriteProtocol;
use tokeneasy_core::networks::{self, FeeSchedule};
use tokeneasy_core::orchestrator::DeploymentOrchestrator;
use tokeneasy_core::plan::{Chain, DeploymentPlan, Network};
use tokeneasy_core::progress::TracingSink;
use tokeneasy_core::settings::{self, AppConfig, Runtime};
use tokeneasy_core::stellar_rpc::{StellarEndpoint, StellarRpcClient};
use tokeneasy_core::submitter::{SubmissionEndpoint, TransactionSubmitter};
use tokeneasy_core::wallet::KeypairWallet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-chain asset issuance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Execute a deployment plan with the configured wallet
    Deploy {
        /// Path to a plan JSON file
        plan: PathBuf,
    },
    /// Call a Soroban contract method, initializing the contract if needed
    Invoke {
        /// `testnet` or `mainnet`
        network: String,
        contract_id: String,
        method: String,
        /// Method arguments, e.g. `G…`, `i128:100`, `:symbol`, `'"text"'`
        args: Vec<String>,
    },
    /// Print a fresh Stellar keypair
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = settings::load_config().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.rust_log)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Deploy { plan } => deploy(config, plan).await,
        Command::Invoke {
            network,
            contract_id,
            method,
            args,
        } => invoke(config, &network, contract_id, method, &args).await,
        Command::Keygen => {
            let wallet = KeypairWallet::generate();
            println!("Public key: {}", wallet.public_address());
            println!("Secret seed: {}", wallet.secret_seed());
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!("TokenEasy API starting...");
    let runtime = Runtime::build(&config)?;
    runtime.spawn_health_checkers(config.health_check_interval());

    let app = api::router(AppState::new(runtime.registries));

    let bind_addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    let local = listener.local_addr()?;
    tracing::info!("Server listening on http://{}", local);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", local);

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}

async fn deploy(config: AppConfig, path: PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let plan: DeploymentPlan = serde_json::from_str(&raw).context("Malformed deployment plan")?;
    plan.validate()?;

    let runtime = Runtime::build(&config)?;
    let mut orchestrator = DeploymentOrchestrator::for_plan(&runtime.environment, &plan);

    let result = orchestrator.run(plan, &TracingSink).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        bail!("deployment ended in state {}", orchestrator.state());
    }
    Ok(())
}

async fn invoke(
    config: AppConfig,
    network: &str,
    contract_id: String,
    method: String,
    raw_args: &[String],
) -> Result<()> {
    let network: Network = network.parse()?;
    if network.chain() != Chain::Stellar {
        bail!("contract writes are only supported on Stellar networks, got {network}");
    }
    let args = args::parse_args(raw_args)?;

    let runtime = Runtime::build(&config)?;
    let wallet = runtime
        .environment
        .stellar_wallet
        .clone()
        .context("STELLAR_SECRET_SEED is not configured")?;
    let registry = runtime
        .registries
        .get(&network)
        .with_context(|| format!("no RPC provider configured for {network}"))?;
    let profile = networks::profile(network);
    let passphrase = profile
        .passphrase
        .clone()
        .with_context(|| format!("{network} has no network passphrase"))?;

    let client = Arc::new(StellarRpcClient::new(Arc::clone(registry)));
    let endpoint: Arc<dyn StellarEndpoint> = client.clone();
    let submission: Arc<dyn SubmissionEndpoint> = client;

    let mut invoker = SorobanContractClient::connect(endpoint, wallet, passphrase).await?;
    if let FeeSchedule::PerOperation { base_fee_stroops } = profile.fee {
        invoker = invoker.with_base_fee(base_fee_stroops);
    }
    let init_call = ContractCall::initialize(&contract_id, invoker.source())?;
    let call = ContractCall::new(contract_id, method, args);

    let protocol = ContractWriteProtocol::new(
        Arc::new(invoker),
        TransactionSubmitter::new(submission, config.submitter_config()),
    );
    let outcome = protocol.run(call, init_call).await?;

    if let Some(init) = &outcome.initialization {
        println!("Initialization: {init:?}");
    }
    println!("Transaction: {}", outcome.hash);
    if let Some(value) = &outcome.return_value {
        println!("Return value: {value:?}");
    }
    Ok(())
}
