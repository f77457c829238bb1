// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 SwapperD Desktop Contributors

// SwapperD Desktop - CLI
// Terminal UI peer: account setup, unlocking, swap approvals and wallet views

mod config;
mod display;

use std::collections::HashSet;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use tokio::sync::mpsc;
use tracing::debug;
use zeroize::Zeroizing;

use swapperd_desktop_common::ipc::{
    ApprovalDecision, CheckSetup, CreateAccount, CreateAccountRequest, GetNetwork, GetPassword,
    InstallProgress, Lock, Notify, NotifyRequest, PendingSwap, PendingSwaps, SetNetwork, SwapDecision,
    SwapRequested, SwapResponse, UpdateReady, UpdateSwapperD, UpdateSwapperDRequest, VerifyPassword,
    VerifyPasswordRequest,
};
use swapperd_desktop_common::{Bridge, Error, Network, SwapperdClient, QUERY_TIMEOUT};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "swapperd-desktop")]
#[command(about = "SwapperD Desktop CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an account has been created
    Setup,

    /// Install SwapperD and create the account
    CreateAccount {
        /// Restore an existing wallet from its mnemonic
        #[arg(long)]
        restore: bool,
    },

    /// Unlock the wallet
    Unlock,

    /// Lock the wallet
    Lock,

    /// Show the selected network, or switch to another one
    Network {
        /// mainnet or testnet
        network: Option<Network>,
    },

    /// Show a desktop notification through the host
    Notify {
        body: String,

        #[arg(short, long)]
        title: Option<String>,
    },

    /// Reinstall SwapperD, or install a downloaded app update
    Update {
        /// Install the downloaded app update and restart
        #[arg(long)]
        restart: bool,
    },

    /// Answer swap approval prompts
    Approve {
        /// Exit after the first decision
        #[arg(long)]
        once: bool,
    },

    /// Show SwapperD version and supported tokens
    Info(ViewArgs),

    /// Show balances
    Balances(ViewArgs),

    /// Show swap history
    Swaps(ViewArgs),

    /// Show transfer history
    Transfers(ViewArgs),
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Network to query instead of the selected one
    #[arg(short, long)]
    network: Option<Network>,

    /// Output as JSON for scripting
    #[arg(short, long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = CliConfig::load()?;
    let bridge = connect(&config).await?;

    match cli.command {
        Commands::Setup => check_setup(&bridge).await?,
        Commands::CreateAccount { restore } => create_account(&bridge, restore).await?,
        Commands::Unlock => unlock(&bridge, &config).await?,
        Commands::Lock => {
            bridge.call_bounded::<Lock>((), QUERY_TIMEOUT).await?;
            println!("{}", "✓ Wallet locked".green().bold());
        }
        Commands::Network { network } => select_network(&bridge, network).await?,
        Commands::Notify { body, title } => {
            bridge
                .call_bounded::<Notify>(NotifyRequest { title, body }, QUERY_TIMEOUT)
                .await?;
        }
        Commands::Update { restart } => update(&bridge, restart).await?,
        Commands::Approve { once } => approve(&bridge, &config, once).await?,
        Commands::Info(args) => show_info(&bridge, &config, args).await?,
        Commands::Balances(args) => show_balances(&bridge, &config, args).await?,
        Commands::Swaps(args) => show_swaps(&bridge, &config, args).await?,
        Commands::Transfers(args) => show_transfers(&bridge, &config, args).await?,
    }

    Ok(())
}

#[cfg(unix)]
async fn connect(config: &CliConfig) -> Result<Bridge> {
    debug!("Connecting to host at {}", config.host_socket.display());
    Bridge::connect(&config.host_socket).await.with_context(|| {
        format!(
            "Could not reach the SwapperD Desktop host at {}. Is swapperd-desktop-host running?",
            config.host_socket.display()
        )
    })
}

#[cfg(not(unix))]
async fn connect(_config: &CliConfig) -> Result<Bridge> {
    anyhow::bail!("The SwapperD Desktop host is only reachable over Unix domain sockets")
}

fn show_install_progress(bridge: &Bridge) {
    bridge.subscribe::<InstallProgress, _>(|progress| match progress {
        Some(percent) => eprintln!("{}", format!("Installing SwapperD... {}%", percent).dimmed()),
        None => eprintln!("{}", "Installation finished".dimmed()),
    });
}

async fn check_setup(bridge: &Bridge) -> Result<()> {
    if bridge.call_bounded::<CheckSetup>((), QUERY_TIMEOUT).await? {
        println!("{}", "✓ Account is set up".green().bold());
    } else {
        println!(
            "{}",
            "No account yet. Run `swapperd-desktop create-account`.".yellow()
        );
    }
    Ok(())
}

async fn create_account(bridge: &Bridge, restore: bool) -> Result<()> {
    println!("{}", "Creating SwapperD account".bold().green());
    println!();

    if bridge.call_bounded::<CheckSetup>((), QUERY_TIMEOUT).await? {
        let replace = Confirm::new()
            .with_prompt("An account already exists. Replace it?")
            .default(false)
            .interact()?;
        if !replace {
            return Ok(());
        }
    }

    let mnemonic = if restore {
        let words: String = Input::new()
            .with_prompt("Mnemonic")
            .interact_text()?;
        Some(words.trim().to_string())
    } else {
        None
    };

    let password = Zeroizing::new(
        Password::new()
            .with_prompt("New password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    );

    show_install_progress(bridge);
    let mnemonic = bridge
        .call_unbounded::<CreateAccount>(CreateAccountRequest {
            mnemonic,
            password: password.to_string(),
        })
        .await?;

    println!();
    println!("{}", "✓ Account created".green().bold());
    println!("Write down your mnemonic and keep it somewhere safe:");
    println!();
    println!("  {}", mnemonic.yellow().bold());
    println!();
    Ok(())
}

async fn unlock(bridge: &Bridge, config: &CliConfig) -> Result<()> {
    let password = Zeroizing::new(Password::new().with_prompt("Password").interact()?);

    let verified = bridge
        .call_bounded::<VerifyPassword>(
            VerifyPasswordRequest {
                password: password.to_string(),
            },
            QUERY_TIMEOUT,
        )
        .await?;
    if !verified {
        anyhow::bail!("Incorrect password");
    }

    let client = SwapperdClient::new(config.daemons.clone())?;
    let bootloaded = client.bootload(&password).await;
    println!("{}", "✓ Wallet unlocked".green().bold());
    if !bootloaded {
        println!("{}", "⚠️  SwapperD could not be bootloaded on every network".yellow());
    }
    Ok(())
}

async fn select_network(bridge: &Bridge, network: Option<Network>) -> Result<()> {
    match network {
        Some(network) => {
            bridge.call_bounded::<SetNetwork>(network, QUERY_TIMEOUT).await?;
            println!("{}", format!("✓ Switched to {}", network.label()).green().bold());
        }
        None => {
            let network = bridge.call_bounded::<GetNetwork>((), QUERY_TIMEOUT).await?;
            println!("{} ({})", network.label(), network);
        }
    }
    Ok(())
}

async fn update(bridge: &Bridge, restart: bool) -> Result<()> {
    show_install_progress(bridge);
    bridge
        .call_unbounded::<UpdateSwapperD>(UpdateSwapperDRequest {
            swapperd: !restart,
            restart,
        })
        .await?;
    if !restart {
        println!("{}", "✓ SwapperD updated".green().bold());
    }
    Ok(())
}

async fn confirm(prompt: &'static str, default: bool) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::new().with_prompt(prompt).default(default).interact()
    })
    .await?;
    Ok(answer?)
}

async fn prompt_password() -> Result<Zeroizing<String>> {
    let password =
        tokio::task::spawn_blocking(|| Password::new().with_prompt("Password").interact()).await?;
    Ok(Zeroizing::new(password?))
}

async fn approve(bridge: &Bridge, config: &CliConfig, once: bool) -> Result<()> {
    let (tx, mut prompts) = mpsc::unbounded_channel();
    let listener = tx.clone();
    bridge.subscribe::<SwapRequested, _>(move |swap| {
        let _ = listener.send(swap);
    });
    // Prompts opened before this peer subscribed
    for swap in bridge.call_bounded::<PendingSwaps>((), QUERY_TIMEOUT).await? {
        let _ = tx.send(swap);
    }
    drop(tx);
    bridge.subscribe::<UpdateReady, _>(|version| {
        println!(
            "{}",
            format!(
                "SwapperD Desktop {} is ready to install. Run `swapperd-desktop update --restart`.",
                version
            )
            .cyan()
        );
    });
    let client = SwapperdClient::new(config.daemons.clone())?;

    println!("{}", "Waiting for swap requests... (Ctrl+C to stop)".dimmed());

    let mut answered = HashSet::new();
    loop {
        let swap = tokio::select! {
            swap = prompts.recv() => match swap {
                Some(swap) => swap,
                None => break,
            },
            _ = bridge.closed() => anyhow::bail!("Lost connection to the host"),
        };
        if !answered.insert(swap.approval_id) {
            continue;
        }

        let decision = decide(bridge, &client, &swap).await?;
        bridge.notify::<SwapResponse>(SwapDecision {
            approval_id: swap.approval_id,
            decision,
        })?;

        if once {
            break;
        }
        println!("{}", "Waiting for swap requests...".dimmed());
    }

    Ok(())
}

/// Ask the user about one swap. Accepted swaps are submitted to SwapperD
/// here, and SwapperD's answer becomes the decision's status and body.
async fn decide(bridge: &Bridge, client: &SwapperdClient, swap: &PendingSwap) -> Result<ApprovalDecision> {
    println!();
    println!("{}", "Swap approval requested".bold().green());
    println!("{}", display::swap_prompt_table(swap));

    loop {
        if !confirm("Approve this swap?", false).await? {
            println!("{}", "✗ Swap rejected".red().bold());
            return Ok(ApprovalDecision::Rejected);
        }

        let password = match bridge.call_bounded::<GetPassword>((), QUERY_TIMEOUT).await? {
            Some(password) => Zeroizing::new(password),
            None => {
                println!("{}", "The wallet is locked.".yellow());
                let password = prompt_password().await?;
                let verified = bridge
                    .call_bounded::<VerifyPassword>(
                        VerifyPasswordRequest {
                            password: password.to_string(),
                        },
                        QUERY_TIMEOUT,
                    )
                    .await?;
                if !verified {
                    println!("{}", "Incorrect password".red());
                    continue;
                }
                password
            }
        };

        let network = match swap.request.network {
            Some(network) => network,
            None => bridge.call_bounded::<GetNetwork>((), QUERY_TIMEOUT).await?,
        };

        match client.submit_swap(network, &password, &swap.request.body).await {
            Ok(submission) => {
                println!("{}", "✓ Swap submitted".green().bold());
                return Ok(ApprovalDecision::Accepted {
                    status: Some(submission.status),
                    response: submission.body,
                });
            }
            Err(e) => {
                println!("{}", format!("Failed to submit swap: {}", e).red());
                if !confirm("Try again?", true).await? {
                    return Ok(ApprovalDecision::Rejected);
                }
            }
        }
    }
}

/// Password and network for a SwapperD query
async fn daemon_session(bridge: &Bridge, network: Option<Network>) -> Result<(Network, Zeroizing<String>)> {
    let password = bridge
        .call_bounded::<GetPassword>((), QUERY_TIMEOUT)
        .await?
        .map(Zeroizing::new)
        .ok_or(Error::Unauthorized)
        .context("Run `swapperd-desktop unlock` first")?;

    let network = match network {
        Some(network) => network,
        None => bridge.call_bounded::<GetNetwork>((), QUERY_TIMEOUT).await?,
    };
    Ok((network, password))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn show_info(bridge: &Bridge, config: &CliConfig, args: ViewArgs) -> Result<()> {
    let (network, password) = daemon_session(bridge, args.network).await?;
    let client = SwapperdClient::new(config.daemons.clone())?;
    let info = client.info(network, &password).await?;

    if args.json {
        return print_json(&info);
    }

    println!("{}", format!("SwapperD on {}", network.label()).bold());
    println!("  Version:    {}", info.version);
    println!(
        "  Bootloaded: {}",
        if info.bootloaded { "yes".green() } else { "no".yellow() }
    );
    let tokens: Vec<_> = info
        .supported_tokens
        .iter()
        .map(|t| format!("{} ({})", t.name, t.blockchain))
        .collect();
    println!("  Tokens:     {}", tokens.join(", "));
    Ok(())
}

async fn show_balances(bridge: &Bridge, config: &CliConfig, args: ViewArgs) -> Result<()> {
    let (network, password) = daemon_session(bridge, args.network).await?;
    let client = SwapperdClient::new(config.daemons.clone())?;
    let balances = client.balances(network, &password).await?;

    if args.json {
        return print_json(&balances);
    }
    if balances.is_empty() {
        println!("{}", "No balances".dimmed());
        return Ok(());
    }
    println!("{}", display::balances_table(&balances));
    Ok(())
}

async fn show_swaps(bridge: &Bridge, config: &CliConfig, args: ViewArgs) -> Result<()> {
    let (network, password) = daemon_session(bridge, args.network).await?;
    let client = SwapperdClient::new(config.daemons.clone())?;
    let mut swaps = client.swaps(network, &password).await?.swaps.unwrap_or_default();
    swaps.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if args.json {
        return print_json(&swaps);
    }
    if swaps.is_empty() {
        println!("{}", "No swaps".dimmed());
        return Ok(());
    }
    println!("{}", display::swaps_table(&swaps));
    Ok(())
}

async fn show_transfers(bridge: &Bridge, config: &CliConfig, args: ViewArgs) -> Result<()> {
    let (network, password) = daemon_session(bridge, args.network).await?;
    let client = SwapperdClient::new(config.daemons.clone())?;
    let mut transfers = client
        .transfers(network, &password)
        .await?
        .transfers
        .unwrap_or_default();
    transfers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    if args.json {
        return print_json(&transfers);
    }
    if transfers.is_empty() {
        println!("{}", "No transfers".dimmed());
        return Ok(());
    }
    println!("{}", display::transfers_table(&transfers));
    Ok(())
}
