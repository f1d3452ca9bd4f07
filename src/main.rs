use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use halberd::cli::{AgentArgs, Cli, CluereaderArgs, Command, ScanArgs};
use halberd::config::Config;
use halberd::core::analysis::{reanalyze, PipelineConfig, ReanalysisConfig};
use halberd::core::clue::file::{load_clues, save_clues};
use halberd::core::clue::Clue;
use halberd::core::distributed::{run_agent, run_distributed_scan};
use halberd::core::probe::url;
use halberd::core::scan::{ScanStats, ScanTask};
use halberd::error::{HalberdError, Result};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse_args();
    match cli.command {
        Command::Scan(args) => run_scan_command(args).await?,
        Command::Agent(args) => run_agent_command(args).await?,
        Command::Cluereader(args) => run_cluereader_command(args)?,
    }

    Ok(())
}

async fn run_scan_command(mut args: ScanArgs) -> Result<()> {
    if let Some(config_path) = &args.config {
        let config = Config::load(config_path)?;
        if args.agents.is_empty() {
            args.agents = config.rpcclient.servers;
        }
    }

    if let Some(targets_path) = &args.targets {
        let contents = std::fs::read_to_string(targets_path)?;
        for line in contents.lines() {
            let target = line.trim();
            if target.is_empty() {
                continue;
            }
            match scan_one_target(target, &args).await {
                Ok((report, _)) => println!("{target}: {report}"),
                Err(e) => eprintln!("{target}: scan failed: {e}"),
            }
        }
        return Ok(());
    }

    let target = args
        .url
        .as_deref()
        .ok_or_else(|| HalberdError::InvalidUrl("no URL or --targets given".to_string()))?;
    let (report, clues) = scan_one_target(target, &args).await?;

    if let Some(output) = &args.output {
        std::fs::write(output, &report)?;
    } else {
        println!("{report}");
    }

    if let Some(save_path) = &args.save {
        save_clues(save_path, &clues)?;
    }

    Ok(())
}

async fn scan_one_target(target: &str, args: &ScanArgs) -> Result<(String, Vec<Clue>)> {
    let address = resolve_target(target).await?;

    let task = ScanTask::new(
        target,
        address,
        Duration::from_secs(args.scantime),
        args.parallel.max(1),
    )
    .with_verbose(args.verbose)
    .with_agents(args.agents.clone());

    log::info!("scanning {target} ({address}) for {}s", args.scantime);
    let (clues, stats) = if task.is_distributed() {
        run_distributed_scan(&task).await?
    } else {
        halberd::core::scan::scan(&task).await?
    };

    let outcome = reanalyze(&clues, &PipelineConfig::default(), &ReanalysisConfig::default());
    let report = render_report(target, &outcome.result, &outcome.ignored_fields, &stats);
    Ok((report, clues))
}

async fn run_agent_command(mut args: AgentArgs) -> Result<()> {
    if let Some(config_path) = &args.config {
        let config = Config::load(config_path)?;
        if args.address == AgentArgs::default_address() {
            args.address = config.rpcserver.address;
        }
        if args.port == AgentArgs::default_port() {
            args.port = config.rpcserver.port;
        }
    }
    let addr = SocketAddr::new(args.address, args.port);
    run_agent(addr, args.verbose).await
}

fn run_cluereader_command(args: CluereaderArgs) -> Result<()> {
    let clues = load_clues(&args.file)?;
    let outcome = reanalyze(&clues, &PipelineConfig::default(), &ReanalysisConfig::default());
    let stats = ScanStats {
        replies: clues.iter().map(|c| c.count as u64).sum(),
        missed: 0,
        interrupted: false,
    };
    let report = render_report(
        &args.file.display().to_string(),
        &outcome.result,
        &outcome.ignored_fields,
        &stats,
    );
    println!("{report}");
    Ok(())
}

/// Resolve the target URL's host to a connectable address: a thin wrapper
/// over the system resolver via tokio, not part of the core detection logic.
async fn resolve_target(target: &str) -> Result<IpAddr> {
    let parsed = url::parse(target)?;
    if let Ok(addr) = parsed.host.parse::<IpAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host((parsed.host.as_str(), parsed.port))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| HalberdError::InvalidUrl(format!("could not resolve {}", parsed.host)))
}

fn render_report(
    label: &str,
    clues: &[Clue],
    ignored_fields: &[String],
    stats: &ScanStats,
) -> String {
    let mut out = format!(
        "{label}: {} inferred back-end server(s) ({} replies, {} missed)",
        clues.len(),
        stats.replies,
        stats.missed
    );
    if !ignored_fields.is_empty() {
        out.push_str(&format!(
            "\n  reanalysis ignored: {}",
            ignored_fields.join(", ")
        ));
    }
    for clue in clues {
        out.push_str(&format!(
            "\n  diff={:>4}s count={:<3} digest={}",
            clue.diff,
            clue.count,
            &clue.digest[..clue.digest.len().min(12)]
        ));
    }
    out
}
