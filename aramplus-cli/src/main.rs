//! AramPlus CLI: daily signal, backtest report, and config scaffolding.
//!
//! Commands:
//! - `run`: fetch, compute the latest signal, backtest, write the output files
//! - `backtest`: same computation, prints the report without touching outputs
//! - `init-config`: write a TOML config with every default spelled out

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use aramplus_core::broker::{DryRunExecutor, OrderExecutor};
use aramplus_runner::export::{save_exports, save_result};
use aramplus_runner::{
    build_provider, run_report, run_signal, BrokerMode, BrokerOutcome, RunConfig, RunResult,
    SourceKind,
};

#[derive(Parser)]
#[command(
    name = "aramplus",
    version,
    about = "AramPlus: daily MA/RSI/ATR trading signal with causal backtest"
)]
struct Cli {
    /// Debug logging (overrides RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by `run` and `backtest`.
#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbol override (e.g., BTC-USD).
    #[arg(long)]
    symbol: Option<String>,

    /// Data source override: yahoo, csv, synthetic.
    #[arg(long)]
    source: Option<SourceKind>,

    /// CSV file with price history. Implies --source csv.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Output directory override.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute today's signal and write the output files.
    Run {
        #[command(flatten)]
        args: ConfigArgs,

        /// Send the order intent to the dry-run executor.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Also save the full run result as JSON at this path.
        #[arg(long)]
        save_result: Option<PathBuf>,
    },
    /// Backtest the rule over the full history and print the report.
    Backtest {
        #[command(flatten)]
        args: ConfigArgs,

        /// Write equity.csv and trades.csv into the output directory.
        #[arg(long, default_value_t = false)]
        export: bool,
    },
    /// Write a config file with all defaults.
    InitConfig {
        /// Destination path.
        #[arg(default_value = "aramplus.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            args,
            dry_run,
            save_result,
        } => run_cmd(&args, dry_run, save_result.as_deref()),
        Commands::Backtest { args, export } => backtest_cmd(&args, export),
        Commands::InitConfig { path, force } => init_config_cmd(&path, force),
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp_secs().init();
}

fn load_config(args: &ConfigArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(symbol) = &args.symbol {
        config.market.symbol = symbol.clone();
    }
    if let Some(source) = args.source {
        config.market.source = source;
    }
    if let Some(csv) = &args.csv {
        if args.source.is_some_and(|s| s != SourceKind::Csv) {
            bail!("--csv conflicts with --source {:?}", config.market.source);
        }
        config.market.source = SourceKind::Csv;
        config.market.csv_path = Some(csv.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run_cmd(args: &ConfigArgs, dry_run: bool, save_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(args)?;
    if dry_run {
        config.broker.mode = BrokerMode::DryRun;
    }

    let provider = build_provider(&config.market)?;
    let executor = DryRunExecutor::new();
    let executor_ref: Option<&dyn OrderExecutor> = match config.broker.mode {
        BrokerMode::Disabled => None,
        BrokerMode::DryRun => Some(&executor),
    };

    let result = run_signal(&config, provider.as_ref(), executor_ref)?;
    print_decision(&result);
    print_summary(&result);
    print_broker(&result.broker);

    for path in save_exports(&result, &config.output)? {
        println!("Exported: {}", path.display());
    }
    if let Some(path) = save_path {
        save_result(&result, path)?;
        println!("Result saved to: {}", path.display());
    }
    println!("Signal & price saved to: {}", config.output.dir.display());

    Ok(())
}

fn backtest_cmd(args: &ConfigArgs, export: bool) -> Result<()> {
    let mut config = load_config(args)?;
    config.backtest.enabled = true;
    if export {
        config.output.export_equity_csv = true;
        config.output.export_trades_csv = true;
    }

    let provider = build_provider(&config.market)?;
    let result = run_report(&config, provider.as_ref())?;
    print_decision(&result);
    print_summary(&result);
    print_trades(&result);

    if export {
        for path in save_exports(&result, &config.output)? {
            println!("Exported: {}", path.display());
        }
    }
    Ok(())
}

fn init_config_cmd(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let text = RunConfig::default().to_toml()?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.decimals$}"))
}

fn print_decision(result: &RunResult) {
    let d = &result.decision;
    println!();
    println!(
        "{} | {} | Price: ${:.2}",
        result.symbol,
        d.timestamp.date_naive(),
        d.close
    );
    println!(
        "MA({}): ${} | RSI({}): {} | ATR({}): {}",
        result.indicators.ma_window,
        fmt_opt(d.row.ma, 2),
        result.indicators.rsi_window,
        fmt_opt(d.row.rsi, 1),
        result.indicators.atr_window,
        fmt_opt(d.row.atr, 2),
    );
    println!("Signal: {}", d.signal);
    if let Some(risk) = d.risk {
        println!(
            "Stop Loss: ${:.2} | Take Profit: ${:.2} | R:R {}",
            risk.stop_loss,
            risk.take_profit,
            fmt_opt(risk.reward_to_risk(d.close), 2)
        );
    }
}

fn print_summary(result: &RunResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!("Bars:           {}", result.bar_count);
    println!("Source:         {}", result.source);

    match (&result.backtest, &result.metrics) {
        (Some(report), Some(metrics)) => {
            println!("Warmup Bars:    {}", report.warmup_bars);
            println!("Trades:         {}", metrics.trade_count);
            if metrics.open_trades > 0 {
                println!("Open Position:  yes");
            }
            println!();
            println!("--- Performance ---");
            println!("Total Return:   {:.2}%", metrics.total_return * 100.0);
            println!("Final Equity:   ${:.2}", metrics.final_equity);
            println!("CAGR:           {:.2}%", metrics.cagr * 100.0);
            println!("Sharpe:         {:.3}", metrics.sharpe);
            println!("Max Drawdown:   {:.2}%", metrics.max_drawdown * 100.0);
            println!("Win Rate:       {:.1}%", metrics.win_rate * 100.0);
            println!("Profit Factor:  {:.2}", metrics.profit_factor);
            println!("Fees Paid:      ${:.2}", metrics.fees_paid);
        }
        _ => println!("Backtest:       disabled"),
    }

    if result.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    let report = &result.data_report;
    if !report.is_clean() {
        println!(
            "WARNING: input cleaned ({} duplicates, {} missing dropped, {} forward-filled, {} insane dropped)",
            report.duplicates_dropped,
            report.missing_dropped,
            report.forward_filled,
            report.insane_dropped
        );
    }
    println!();
}

fn print_trades(result: &RunResult) {
    let Some(report) = &result.backtest else {
        return;
    };
    if report.trades.is_empty() {
        println!("No trades.");
        return;
    }
    println!(
        "{:<12} {:>12} {:<12} {:>12} {:>12} {:<12}",
        "Entry", "Price", "Exit", "Price", "P&L", "Reason"
    );
    println!("{}", "-".repeat(78));
    for t in &report.trades {
        println!(
            "{:<12} {:>12.2} {:<12} {:>12.2} {:>12.2} {:<12}",
            t.entry_time.date_naive().to_string(),
            t.entry_price,
            t.exit_time.date_naive().to_string(),
            t.exit_price,
            t.pnl,
            format!("{:?}", t.exit_reason)
        );
    }
    println!();
}

fn print_broker(outcome: &BrokerOutcome) {
    match outcome {
        BrokerOutcome::Disabled => {}
        BrokerOutcome::NoIntent => println!("Broker: no order for this signal"),
        BrokerOutcome::Submitted { report } => println!(
            "Broker: order {} {:?} ({} x {:.6})",
            report.order_id, report.status, report.intent.symbol, report.intent.quantity
        ),
        BrokerOutcome::Failed { error, .. } => println!("Broker: FAILED ({error})"),
    }
}
