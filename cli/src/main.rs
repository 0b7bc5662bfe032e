//! Nutcracker CLI - binary entry point.
//!
//! `run` drives the guess engine and streams its log to stdout until
//! Ctrl-C; every other subcommand is a one-shot read against the explorer.
//! Output is plain lines so the tool composes with grep and watch.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use nutcracker_client::StatsClient;
use nutcracker_engine::{Engine, NutcrackerConfig};
use nutcracker_types::{
    BoxDetail, EngineEvent, EngineState, SortBy, SortOrder, elapsed_hms, short_wallet,
};
use std::{env, io};
use tracing_subscriber::EnvFilter;

/// Row count for the list screens. The explorer pages beyond this, but the
/// screens deliberately show a single fixed window.
const LIST_LIMIT: u32 = 20;

const USAGE: &str = "\
nutcracker - guess engine and stats browser for the erwin box game

Usage:
  nutcracker run            start the guess loop (Ctrl-C stops it)
  nutcracker box            show the box currently in play
  nutcracker box <id>       show one box and its contributors
  nutcracker boxes          list recent boxes
  nutcracker leaderboard [sort] [order]
                            show the top contributors; sort is one of
                            guesses, opens, burns, contributions, tokens
  nutcracker wallet [addr]  show wallet stats (default: configured wallet)
  nutcracker help           show this text

Configuration lives at ~/.nutcracker/config.toml.";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    // Diagnostics go to stderr; stdout carries only screen output and the
    // engine log stream.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = NutcrackerConfig::load()?.unwrap_or_default();

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) => (command.as_str(), rest),
        None => ("run", &[][..]),
    };

    match command {
        "run" => {
            if !rest.is_empty() {
                return usage_error("run takes no arguments");
            }
            run_engine(config).await
        }
        "box" => match rest {
            [] => show_latest_box(&stats_client(&config)?).await,
            [id] => show_box_detail(&stats_client(&config)?, id).await,
            _ => usage_error("box takes at most one id"),
        },
        "boxes" => show_boxes(&stats_client(&config)?).await,
        "leaderboard" => show_leaderboard(&stats_client(&config)?, rest).await,
        "wallet" => show_wallet(&config, rest).await,
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => usage_error(&format!("unknown command: {other}")),
    }
}

fn usage_error(message: &str) -> Result<()> {
    eprintln!("{USAGE}\n");
    bail!("{message}");
}

fn stats_client(config: &NutcrackerConfig) -> Result<StatsClient> {
    StatsClient::new(config.engine_config().stats_url).context("building explorer client")
}

fn config_location() -> String {
    NutcrackerConfig::path().map_or_else(
        || "~/.nutcracker/config.toml".to_string(),
        |path| path.display().to_string(),
    )
}

fn parse_sort_column(value: &str) -> Result<SortBy> {
    SortBy::parse(value).with_context(|| {
        format!("unknown sort column: {value} (guesses, opens, burns, contributions, tokens)")
    })
}

fn parse_sort_order(value: &str) -> Result<SortOrder> {
    SortOrder::parse(value).with_context(|| format!("unknown sort order: {value} (asc or desc)"))
}

// ============================================================================
// run - the guess engine
// ============================================================================

async fn run_engine(config: NutcrackerConfig) -> Result<()> {
    let credentials = config.credentials();
    if !credentials.has_api_key() {
        bail!(
            "no API key configured; add an [account] api_key entry to {}",
            config_location()
        );
    }

    let engine_config = config.engine_config();
    tracing::info!(oracle = %engine_config.oracle_url, "starting guess engine");
    let (engine, mut events) = Engine::new(engine_config, credentials)?;
    engine.spawn_background();
    engine.start()?;

    let mut stop_requested = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if stop_requested {
                    // Second Ctrl-C: leave without waiting out the drain.
                    break;
                }
                stop_requested = true;
                engine.stop();
                eprintln!("stopping; waiting for the current cycle (Ctrl-C again to quit now)");
            }
            () = engine.wait_until_stopped(), if stop_requested => {
                while let Ok(event) = events.try_recv() {
                    print_event(&event);
                }
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                if let EngineEvent::StateChanged(EngineState::Stopped) = event
                    && !stop_requested
                {
                    engine.wait_until_stopped().await;
                    while let Ok(event) = events.try_recv() {
                        print_event(&event);
                    }
                    bail!("the oracle rejected the configured API key");
                }
            }
        }
    }
    Ok(())
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::Log(entry) => println!("{}", entry.format()),
        EngineEvent::StateChanged(state) => tracing::debug!(%state, "engine state changed"),
        EngineEvent::BoxUpdate(info) => {
            println!("📦 Box in play: {} ({})", info.box_id, info.state_str);
        }
        EngineEvent::WalletUpdate(stats) => {
            println!(
                "👛 Wallet: {} guesses, {:.2} tokens earned",
                stats.guess_count, stats.tokens_earned
            );
        }
    }
}

// ============================================================================
// Stats screens
// ============================================================================

async fn show_latest_box(stats: &StatsClient) -> Result<()> {
    let info = stats.latest_box().await?;
    println!("Box in play: {}", info.box_id);
    println!("  state:   {}", info.state_str);
    match info.spawned_at_utc() {
        Some(spawned) => println!(
            "  spawned: {} ({} ago)",
            info.spawned_at,
            elapsed_hms(spawned, Utc::now())
        ),
        None => println!("  spawned: {}", info.spawned_at),
    }
    Ok(())
}

async fn show_box_detail(stats: &StatsClient, box_id: &str) -> Result<()> {
    let detail = stats.box_detail(box_id).await?;

    println!("Box {}", detail.box_id);
    println!("  state:        {}", detail.state_str);
    if detail.is_burned {
        println!("  burned:       yes");
    }
    println!("  spawned:      {}", detail.spawned_at);
    if let Some(opened_at) = &detail.opened_at {
        match &detail.opener_wallet {
            Some(opener) => println!("  opened:       {opened_at} by {}", short_wallet(opener)),
            None => println!("  opened:       {opened_at}"),
        }
        if let (Some(spawned), Some(opened)) = (detail.spawned_at_utc(), detail.opened_at_utc()) {
            println!("  open time:    {}", elapsed_hms(spawned, opened));
        }
    } else if let Some(spawned) = detail.spawned_at_utc() {
        println!("  open for:     {}", elapsed_hms(spawned, Utc::now()));
    }
    if let Some(contents) = detail.contents {
        println!("  contents:     {contents:.2} tokens");
    }
    if let Some(password) = &detail.password {
        println!("  password:     {password}");
    }
    if let Some(decay) = detail.decay_number {
        println!("  decay:        {decay}");
    }

    println!("  contributors: {}", detail.contributor_count);
    if !detail.contributors.is_empty() {
        println!();
        println!("  {:<16} {:>8} {:>10}", "WALLET", "GUESSES", "REWARD");
        for contributor in &detail.contributors {
            println!(
                "  {:<16} {:>8} {:>10.2}",
                short_wallet(&contributor.wallet_id),
                contributor.guess_count,
                contributor.reward
            );
        }
    }
    Ok(())
}

async fn show_boxes(stats: &StatsClient) -> Result<()> {
    let page = stats.recent_boxes(LIST_LIMIT, 0, false).await?;
    println!("Recent boxes ({} total):", page.total);
    println!("{:<14} {:<12} {:<22} {}", "ID", "STATE", "SPAWNED", "OPENER");
    for item in &page.boxes {
        let opener = item
            .opener_wallet
            .as_deref()
            .map_or_else(String::new, short_wallet);
        println!(
            "{:<14} {:<12} {:<22} {opener}",
            item.box_id,
            state_label(item),
            item.spawned_at
        );
    }
    Ok(())
}

fn state_label(item: &BoxDetail) -> String {
    if item.is_burned {
        format!("{} 🔥", item.state_str)
    } else {
        item.state_str.clone()
    }
}

async fn show_leaderboard(stats: &StatsClient, rest: &[String]) -> Result<()> {
    // Sorting happens remotely; these arguments only pick the column and
    // direction the explorer is asked for.
    let (sort_by, order) = match rest {
        [] => (SortBy::default(), SortOrder::default()),
        [sort] => (parse_sort_column(sort)?, SortOrder::default()),
        [sort, order] => (parse_sort_column(sort)?, parse_sort_order(order)?),
        _ => return usage_error("leaderboard takes at most a sort column and an order"),
    };

    let page = stats.leaderboard(sort_by, order, LIST_LIMIT, 0).await?;
    println!("Leaderboard ({} contributors):", page.total);
    println!(
        "{:>3}  {:<16} {:>8} {:>7} {:>7} {:>8} {:>10}",
        "#", "WALLET", "GUESSES", "OPENED", "BURNED", "CONTRIB", "TOKENS"
    );
    for (rank, row) in page.contributors.iter().enumerate() {
        println!(
            "{:>3}  {:<16} {:>8} {:>7} {:>7} {:>8} {:>10.2}",
            rank + 1,
            short_wallet(&row.wallet_id),
            row.guess_count,
            row.open_count,
            row.burn_count,
            row.contribution_count,
            row.tokens_earned
        );
    }
    Ok(())
}

async fn show_wallet(config: &NutcrackerConfig, rest: &[String]) -> Result<()> {
    let address = match rest {
        [] => config
            .credentials()
            .wallet_address
            .context("no wallet address given and none configured")?,
        [address] => address.clone(),
        _ => return usage_error("wallet takes at most one address"),
    };

    let stats = stats_client(config)?;
    let wallet = stats.wallet_stats(&address).await?;

    println!("Wallet {}", short_wallet(&address));
    println!("  guesses:        {}", wallet.guess_count);
    println!("  boxes opened:   {}", wallet.open_count);
    println!("  boxes burned:   {}", wallet.burn_count);
    println!("  contributions:  {}", wallet.contribution_count);
    println!("  tokens earned:  {:.2}", wallet.tokens_earned);

    let history = stats.wallet_boxes(&address, LIST_LIMIT, 0).await?;
    if history.boxes.is_empty() {
        return Ok(());
    }
    println!();
    println!("Contribution history ({} boxes):", history.total);
    println!(
        "{:<14} {:<12} {:>8} {:>10}  {}",
        "ID", "STATE", "GUESSES", "REWARDS", "OPENED"
    );
    for item in &history.boxes {
        println!(
            "{:<14} {:<12} {:>8} {:>10.2}  {}",
            item.box_id,
            item.state_str,
            item.guesses,
            item.rewards,
            item.opened_at.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_sort_arguments_accept_friendly_names() {
        assert_eq!(parse_sort_column("tokens").unwrap(), SortBy::TokensEarned);
        assert_eq!(parse_sort_column("open_count").unwrap(), SortBy::OpenCount);
        assert_eq!(parse_sort_order("asc").unwrap(), SortOrder::Asc);
    }

    #[test]
    fn leaderboard_sort_arguments_reject_unknown_values() {
        assert!(parse_sort_column("alphabetical").is_err());
        assert!(parse_sort_order("sideways").is_err());
    }
}
