use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use smartape_client::bytecode::{BytecodeLoader, BytecodeLocation};
use smartape_client::config::ClientConfig;
use smartape_client::ledger::{LedgerClient, MemoryLedger, RpcLedgerClient};
use smartape_client::{ApeRecord, DeployForm, Document, ProgressEvent, SmartApeService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "smartape", version, about = "Deploy and look up SmartAPE property certificates")]
struct Cli {
    /// Configuration file (YAML); SMARTAPE_* variables override it
    #[arg(long, env = "SMARTAPE_CONFIG", default_value = "config/smartape.yaml")]
    config: PathBuf,

    /// Use an in-process ledger instead of the gateway
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new certificate
    Deploy(DeployArgs),
    /// Read a certificate back from its contract
    Find {
        /// Contract id, e.g. 0.0.1234
        contract_id: String,
        /// Print the record as JSON
        #[arg(long, conflicts_with = "yaml")]
        json: bool,
        /// Print the record as YAML
        #[arg(long)]
        yaml: bool,
    },
}

#[derive(Args)]
struct DeployArgs {
    /// Certificate number
    #[arg(long)]
    id: String,
    /// YYYY-MM-DD or RFC 3339; must be in the future
    #[arg(long)]
    expiration_date: String,
    /// Decimal degrees, at most 8 decimal places
    #[arg(long, allow_hyphen_values = true)]
    latitude: String,
    /// Decimal degrees, at most 8 decimal places
    #[arg(long, allow_hyphen_values = true)]
    longitude: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long)]
    year_of_construction: String,
    /// 0 new construction, 1 changed property, 2 leased, 3 renovation,
    /// 4 energy requalification, 5 other
    #[arg(long, default_value = "0")]
    reason: String,
    /// Required when the reason is "other"
    #[arg(long, default_value = "")]
    other_reason: String,
    /// Certification document to hash
    #[arg(long)]
    document: PathBuf,
    /// Certificate this one supersedes (0.0.N or an address)
    #[arg(long, default_value = "")]
    previous: String,
    /// Overrides bytecode.location from the configuration
    #[arg(long)]
    bytecode: Option<String>,
}

impl DeployArgs {
    fn form(&self) -> DeployForm {
        DeployForm {
            id: self.id.clone(),
            expiration_date: self.expiration_date.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
            address: self.address.clone(),
            year_of_construction: self.year_of_construction.clone(),
            reason: self.reason.clone(),
            other_reason: self.other_reason.clone(),
            previous: self.previous.clone(),
        }
    }
}

async fn print_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        eprintln!("[{:>3}%] {}", event.percent(), event.message);
    }
}

fn print_record(record: &ApeRecord, json: bool, yaml: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&record.view())?);
    } else if yaml {
        print!("{}", serde_yaml::to_string(&record.view())?);
    } else {
        println!("{}", record);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ClientConfig::load(Some(cli.config.as_path()))
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let operator = config.operator()?;
    let settings = config.workflow_settings(&operator)?;
    let timeout = config.request_timeout();

    let ledger: Arc<dyn LedgerClient> = if cli.dry_run {
        info!("dry run: using an in-process ledger");
        Arc::new(MemoryLedger::with_payer(operator.account_id))
    } else {
        info!("using ledger gateway {} as {}", config.ledger.endpoint, operator.account_id);
        Arc::new(RpcLedgerClient::new(&config.ledger.endpoint, operator, timeout)?)
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_progress(rx));

    match cli.command {
        Commands::Deploy(args) => {
            let location = args
                .bytecode
                .clone()
                .unwrap_or_else(|| config.bytecode.location.clone());
            let bytecode = BytecodeLoader::new(BytecodeLocation::parse(&location)?, timeout)?;
            let service = SmartApeService::new(ledger, Arc::new(bytecode), settings);
            let result = service
                .deploy(&args.form(), &Document::File(args.document.clone()), &tx)
                .await;
            drop(tx);
            printer.await?;
            let contract_id = result.context("deploy failed")?;
            println!("{}", contract_id);
        }
        Commands::Find {
            contract_id,
            json,
            yaml,
        } => {
            let service = SmartApeService::reader(ledger, settings);
            let result = service.find(&contract_id, &tx).await;
            drop(tx);
            printer.await?;
            let record = result.with_context(|| format!("reading {} failed", contract_id))?;
            print_record(&record, json, yaml)?;
        }
    }
    Ok(())
}
