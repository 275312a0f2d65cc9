//! MPECDH Party CLI
//!
//! Command-line participant for ring ceremonies hosted on a board:
//! - Identity generation
//! - Ceremony creation and inspection
//! - Stepping or running a participant to the shared secret
//! - Co-signed resets

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mpecdh_board::wire::CreateRequest;
use mpecdh_board_client::BoardClient;
use mpecdh_core::group::{GroupOperation, Modp2048, X25519};
use mpecdh_core::{
    auth, Channel, Driver, Ed25519Identity, Error, IdentitySigner, InstanceId, ParticipantId,
    SharedSecret, Step, Suite, ThresholdApproval,
};
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// MPECDH Party - ring ceremony participant
#[derive(Parser, Debug)]
#[command(name = "mpecdh-party")]
#[command(about = "Multi-party ECDH ceremony participant")]
#[command(version)]
struct Cli {
    /// Board service URL
    #[arg(short, long, env = "BOARD_URL", default_value = "http://127.0.0.1:8080")]
    board: String,

    /// Ceremony instance id
    #[arg(short, long, env = "MPECDH_INSTANCE")]
    instance: Option<InstanceId>,

    /// File holding the hex encoded identity seed
    #[arg(short, long, env = "MPECDH_KEY", default_value = "./data/identity.key")]
    key: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Parameters fixing a ceremony instance
#[derive(Args, Debug, Clone)]
struct CeremonyArgs {
    /// Hex encoded master address
    #[arg(short, long)]
    master: String,

    /// Participant ids (comma-separated)
    #[arg(short, long, value_delimiter = ',', required = true)]
    roster: Vec<ParticipantId>,

    /// Group backend
    #[arg(short, long, default_value = "x25519")]
    suite: Suite,

    /// Approvals needed to reset, majority by default
    #[arg(short, long)]
    threshold: Option<usize>,
}

impl CeremonyArgs {
    fn request(&self) -> CreateRequest {
        CreateRequest::new(
            self.master.clone(),
            self.roster.clone(),
            self.suite,
            self.threshold,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new identity seed
    Keygen {
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print this identity's participant id
    Id,

    /// Co-sign the creation of a ceremony instance
    ApproveCreate {
        #[command(flatten)]
        ceremony: CeremonyArgs,

        /// Write the approval here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Create a ceremony instance on the board
    Create {
        #[command(flatten)]
        ceremony: CeremonyArgs,

        /// Approval files produced by approve-create
        #[arg(required = true)]
        approvals: Vec<PathBuf>,
    },

    /// Show ceremony info
    Info,

    /// Show this participant's status
    Status,

    /// Participants holding up the current round
    Blocking,

    /// Take one step of the ceremony
    Step,

    /// Step until the shared secret is available
    Run {
        /// Poll interval while waiting, in milliseconds
        #[arg(long, default_value = "1000")]
        poll_ms: u64,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Co-sign a reset of the current epoch
    ApproveReset {
        /// Write the approval here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Reset the ceremony with collected approvals
    Reset {
        /// Approval files produced by approve-reset
        #[arg(required = true)]
        approvals: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen { force } => keygen(&cli.key, *force)?,
        Commands::Id => {
            let identity = load_identity(&cli.key)?;
            println!("{}", identity.participant_id());
        }
        Commands::ApproveCreate { ceremony, out } => {
            let identity = load_identity(&cli.key)?;
            let mut req = ceremony.request();
            req.approve(&identity)?;
            let instance = req.config()?.instance;
            write_approval(&req.approval, out.as_deref())?;
            info!(%instance, "Creation approved");
        }
        Commands::Create {
            ceremony,
            approvals,
        } => create(&cli, ceremony, approvals).await?,
        Commands::Info => show_info(&client(&cli)?).await?,
        Commands::Status => {
            let identity = load_identity(&cli.key)?;
            let prep = client(&cli)?.prep(&identity.participant_id()).await?;
            println!("Status: {} ({})", prep.status, prep.status.code());
            println!("Round: {}", prep.round);
            println!("Epoch: {}", prep.epoch);
        }
        Commands::Blocking => {
            for participant in client(&cli)?.blocking().await? {
                println!("{}", participant);
            }
        }
        Commands::Step => {
            let identity = load_identity(&cli.key)?;
            let client = client(&cli)?;
            let step = match client.info().await?.suite {
                Suite::X25519 => step_once::<X25519>(&client, &identity).await?,
                Suite::Modp2048 => step_once::<Modp2048>(&client, &identity).await?,
            };
            match step {
                Step::Submitted { round } => println!("Submitted round {}", round),
                Step::Waiting => println!("Waiting for predecessor"),
                Step::Finished(secret) => println!("Shared secret: {}", secret.to_hex()),
            }
        }
        Commands::Run { poll_ms, timeout } => {
            let identity = load_identity(&cli.key)?;
            let client = client(&cli)?;
            let poll = Duration::from_millis(*poll_ms);
            let limit = timeout.map(Duration::from_secs);
            let secret = match client.info().await?.suite {
                Suite::X25519 => run_to_end::<X25519>(&client, &identity, poll, limit).await?,
                Suite::Modp2048 => run_to_end::<Modp2048>(&client, &identity, poll, limit).await?,
            };
            println!("Shared secret: {}", secret.to_hex());
        }
        Commands::ApproveReset { out } => {
            let identity = load_identity(&cli.key)?;
            let info = client(&cli)?.info().await?;
            let mut approval = ThresholdApproval::new();
            approval.approve(&identity, &auth::reset_message(&info.instance, info.epoch))?;

            write_approval(&approval, out.as_deref())?;
            info!(instance = %info.instance, epoch = info.epoch, "Reset approved");
        }
        Commands::Reset { approvals } => {
            let approval = merge_approvals(approvals)?;
            let client = client(&cli)?;
            client.reset(&approval).await?;
            let info = client.info().await?;
            info!(instance = %info.instance, epoch = info.epoch, "Ceremony reset");
            println!("Reset to epoch {}", info.epoch);
        }
    }

    Ok(())
}

fn client(cli: &Cli) -> Result<BoardClient> {
    let instance = cli
        .instance
        .context("no ceremony instance given, pass --instance or set MPECDH_INSTANCE")?;
    Ok(BoardClient::new(&cli.board, instance))
}

fn keygen(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut seed = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut *seed);
    std::fs::write(path, hex::encode(&*seed))?;

    let identity = Ed25519Identity::from_seed(&seed);
    info!(participant = %identity.participant_id(), path = ?path, "Identity generated");
    println!("{}", identity.participant_id());

    Ok(())
}

fn load_identity(path: &Path) -> Result<Ed25519Identity> {
    let hex = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading identity from {}", path.display()))?,
    );
    Ok(Ed25519Identity::from_hex(&hex)?)
}

async fn create(cli: &Cli, ceremony: &CeremonyArgs, approvals: &[PathBuf]) -> Result<()> {
    let mut req = ceremony.request();
    req.approval = merge_approvals(approvals)?;
    let (_, info) = BoardClient::create(&cli.board, &req).await?;

    info!(instance = %info.instance, suite = %info.suite, "Ceremony created");
    println!("Instance: {}", info.instance);
    println!("Ring:");
    for (i, participant) in info.ring.iter().enumerate() {
        println!("  {}: {}", i, participant);
    }

    Ok(())
}

fn write_approval(approval: &ThresholdApproval, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(approval)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path = ?path, "Approval written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn show_info(client: &BoardClient) -> Result<()> {
    let info = client.info().await?;

    println!("Ceremony Info:");
    println!("  Instance: {}", info.instance);
    println!("  Suite: {}", info.suite);
    println!("  Reset threshold: {}", info.reset_threshold);
    println!("  Epoch: {}", info.epoch);
    println!("  Round: {}", info.round);
    println!("  Complete: {}", info.complete);
    println!("  Ring:");
    for (i, participant) in info.ring.iter().enumerate() {
        println!("    {}: {}", i, participant);
    }

    Ok(())
}

async fn step_once<G: GroupOperation>(client: &BoardClient, identity: &Ed25519Identity) -> Result<Step> {
    let driver = Driver::<G, _, _>::connect(client, identity).await?;
    Ok(driver.step().await?)
}

async fn run_to_end<G: GroupOperation>(
    client: &BoardClient,
    identity: &Ed25519Identity,
    poll: Duration,
    limit: Option<Duration>,
) -> Result<SharedSecret> {
    let driver = Driver::<G, _, _>::connect(client, identity).await?;
    info!(participant = %driver.participant(), "Running ceremony");

    let secret = match limit {
        Some(limit) => tokio::time::timeout(limit, driver.run(poll))
            .await
            .map_err(|_| Error::Timeout(format!("shared secret after {:?}", limit)))??,
        None => driver.run(poll).await?,
    };
    Ok(secret)
}

fn merge_approvals(paths: &[PathBuf]) -> Result<ThresholdApproval> {
    let mut merged = ThresholdApproval::new();
    for path in paths {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading approval {}", path.display()))?;
        let approval: ThresholdApproval = serde_json::from_str(&json)?;
        for a in approval.approvals {
            merged.approvals.retain(|m| m.participant != a.participant);
            merged.approvals.push(a);
        }
    }
    Ok(merged)
}
