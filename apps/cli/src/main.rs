#![deny(warnings)]

//! Headless front end: play Startup Tycoon against a local SQLite save.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use data_pipeline::StaffSplit;
use sim_core::{quarter_label, GameConfig, GameOutcome, SettlementRecord};
use sim_runtime::{AdvanceTurnRequest, Dashboard, GameError, GameService};
use std::str::FromStr;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: startup-tycoon [--db URL] [--config FILE] [--user NAME] [--json] <command>

commands:
  new                         create your game if you do not have one
  show                        current quarter, cash, staff and recent history
  turn [--price P] [--engineers N] [--sales N] [--salary PCT] [--max-capacity N]
                              resolve one quarter
  reset                       restart from the beginning
  history [--export FILE]     every settled quarter, optionally as JSON lines
  version";

#[derive(Debug, PartialEq)]
enum Command {
    New,
    Show,
    Turn(AdvanceTurnRequest),
    Reset,
    History { export: Option<String> },
    Version,
}

#[derive(Debug)]
struct Args {
    db: Option<String>,
    config: Option<String>,
    user: Option<String>,
    json: bool,
    command: Command,
}

fn value<I: Iterator<Item = String>>(it: &mut I, flag: &str) -> Result<String> {
    it.next().with_context(|| format!("{flag} needs a value"))
}

fn decimal(s: &str, flag: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("{flag}: not a number: {s}"))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut db = None;
    let mut config = None;
    let mut user = None;
    let mut json = false;
    let mut command = None;
    let mut req = AdvanceTurnRequest {
        unit_price: Decimal::new(100, 0),
        new_engineers: 0,
        new_sales: 0,
        salary_pct: Decimal::new(100, 0),
        max_capacity: 24,
    };
    let mut export = None;

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--db" => db = Some(value(&mut it, "--db")?),
            "--config" => config = Some(value(&mut it, "--config")?),
            "--user" => user = Some(value(&mut it, "--user")?),
            "--json" => json = true,
            "--price" => req.unit_price = decimal(&value(&mut it, "--price")?, "--price")?,
            "--salary" => req.salary_pct = decimal(&value(&mut it, "--salary")?, "--salary")?,
            "--engineers" => req.new_engineers = value(&mut it, "--engineers")?.parse()?,
            "--sales" => req.new_sales = value(&mut it, "--sales")?.parse()?,
            "--max-capacity" => req.max_capacity = value(&mut it, "--max-capacity")?.parse()?,
            "--export" => export = Some(value(&mut it, "--export")?),
            "-h" | "--help" => bail!("{USAGE}"),
            other if other.starts_with("--") => bail!("unknown flag {other}\n\n{USAGE}"),
            other => {
                if command.replace(other.to_string()).is_some() {
                    bail!("only one command may be given\n\n{USAGE}");
                }
            }
        }
    }

    let command = match command.as_deref() {
        Some("new") => Command::New,
        Some("show") | None => Command::Show,
        Some("turn") => Command::Turn(req),
        Some("reset") => Command::Reset,
        Some("history") => Command::History { export },
        Some("version") => Command::Version,
        Some(other) => bail!("unknown command {other}\n\n{USAGE}"),
    };
    Ok(Args {
        db,
        config,
        user,
        json,
        command,
    })
}

/// The caller's identity: `--user`, then `$STARTUP_TYCOON_USER`, then `$USER`.
fn identity(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("STARTUP_TYCOON_USER").ok())
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "local".to_string())
}

fn staff_line(s: &StaffSplit) -> String {
    format!(
        "staff: {} engineers / {} sales ({:.0}% engineering)",
        s.engineers,
        s.sales_staff,
        s.engineer_share * 100.0
    )
}

fn extremes_line(history: &[SettlementRecord]) -> Option<String> {
    let (best, worst) = data_pipeline::extremes(history)?;
    Some(format!(
        "best: {} (${}) | worst: {} (${})",
        best.label, best.net_income, worst.label, worst.net_income
    ))
}

fn print_dashboard(d: &Dashboard) {
    println!(
        "{} | cash: ${} | engineers: {} | sales: {} | desks: {}/{} ({} free) | {}",
        d.quarter_label,
        d.state.cash,
        d.state.engineers,
        d.state.sales_staff,
        d.occupancy.filled,
        d.occupancy.capacity,
        d.occupancy.available,
        d.outcome
    );
    match d.outcome {
        GameOutcome::Bankrupt => println!(
            "Bankrupt! Cash ran out in {}. Run `reset` to start over.",
            d.quarter_label
        ),
        GameOutcome::Victory => println!(
            "Victory! Final cash: ${}. Run `reset` to play again.",
            d.state.cash
        ),
        GameOutcome::Ongoing => {}
    }
    println!("{}", staff_line(&d.staff));
    for h in &d.history {
        println!(
            "  Q{:>3} | revenue: ${} | net income: ${} | cash: ${}",
            h.quarter, h.revenue, h.net_income, h.cash
        );
    }
}

async fn run(args: Args) -> Result<()> {
    if args.command == Command::Version {
        println!("startup-tycoon {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => sim_runtime::load_config(path)?,
        None => GameConfig::default(),
    };
    let url = args
        .db
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| persistence::default_sqlite_url().to_string());
    if let Some(path) = url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
    }
    let pool = persistence::init_db(&url).await?;
    let service = GameService::new(pool, config)?;
    let user = identity(args.user);
    info!(user = %user, url = %url, "session started");

    match args.command {
        Command::New => {
            let d = service.start_game(&user).await?;
            emit(args.json, &d, || print_dashboard(&d))?;
        }
        Command::Show => {
            let d = service.dashboard(&user).await?;
            emit(args.json, &d, || print_dashboard(&d))?;
        }
        Command::Turn(req) => {
            let res = service.advance_turn(&user, &req).await?;
            emit(args.json, &res, || {
                println!(
                    "Settled {} | revenue: ${} | net income: ${} | cash: ${} | cumulative profit: ${}",
                    quarter_label(res.settlement.quarter.saturating_sub(1)),
                    res.settlement.revenue,
                    res.settlement.net_income,
                    res.new_cash,
                    res.cumulative_profit
                );
                match res.outcome {
                    GameOutcome::Victory => println!(
                        "Victory! You survived {} quarters with cash to spare.",
                        service.config().victory_quarter
                    ),
                    GameOutcome::Bankrupt => println!("Bankrupt! The startup has folded."),
                    GameOutcome::Ongoing => {}
                }
            })?;
        }
        Command::Reset => {
            let s = service.reset_game(&user).await?;
            emit(args.json, &s, || {
                println!(
                    "Restarted at {} with ${} cash, {} engineers and {} sales staff.",
                    quarter_label(s.current_quarter),
                    s.cash,
                    s.engineers,
                    s.sales_staff
                )
            })?;
        }
        Command::History { export } => {
            let history = service.history(&user).await?;
            if let Some(path) = export {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {path}"))?;
                let n = data_pipeline::export_jsonl(&history, std::io::BufWriter::new(file))?;
                println!("exported {n} quarters to {path}");
            } else {
                let series = data_pipeline::chart_series(&history);
                emit(args.json, &series, || {
                    for p in &series {
                        println!(
                            "{} | revenue: ${} | net income: ${} | cash: ${}",
                            p.label, p.revenue, p.net_income, p.cash
                        );
                    }
                    if let Some(line) = extremes_line(&history) {
                        println!("{line}");
                    }
                    println!(
                        "cumulative profit: ${}",
                        data_pipeline::cumulative_profit(&history)
                    );
                })?;
            }
        }
        Command::Version => {}
    }
    Ok(())
}

fn emit<T: serde::Serialize>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    match run(args).await {
        Err(e) => {
            if let Some(GameError::Validation(v)) = e.downcast_ref::<GameError>() {
                eprintln!("{v}");
                std::process::exit(2);
            }
            Err(e)
        }
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::Visibility;

    fn args(s: &str) -> Result<Args> {
        parse_args(s.split_whitespace().map(String::from))
    }

    #[test]
    fn defaults_to_show() {
        let a = args("").unwrap();
        assert_eq!(a.command, Command::Show);
        assert!(!a.json);
    }

    #[test]
    fn parses_turn_flags() {
        let a = args("--user alice turn --price 120.5 --engineers 2 --sales 1 --salary 90 --json")
            .unwrap();
        assert_eq!(a.user.as_deref(), Some("alice"));
        assert!(a.json);
        match a.command {
            Command::Turn(req) => {
                assert_eq!(req.unit_price, Decimal::new(1205, 1));
                assert_eq!(req.new_engineers, 2);
                assert_eq!(req.new_sales, 1);
                assert_eq!(req.salary_pct, Decimal::new(90, 0));
                assert_eq!(req.max_capacity, 24);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn negative_hires_reach_validation() {
        let a = args("turn --engineers -3").unwrap();
        let Command::Turn(req) = a.command else {
            panic!("expected turn");
        };
        assert!(req.to_decisions().is_err());
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(args("fly").is_err());
        assert!(args("show --bogus").is_err());
        assert!(args("show reset").is_err());
        assert!(args("turn --price").is_err());
        assert!(args("turn --price abc").is_err());
    }

    #[test]
    fn history_export_path() {
        let a = args("history --export out.jsonl").unwrap();
        assert_eq!(
            a.command,
            Command::History {
                export: Some("out.jsonl".to_string())
            }
        );
    }

    #[test]
    fn staff_and_extremes_lines() {
        let split = StaffSplit {
            engineers: 3,
            sales_staff: 1,
            engineer_share: 0.75,
        };
        assert_eq!(
            staff_line(&split),
            "staff: 3 engineers / 1 sales (75% engineering)"
        );

        let rec = |quarter: u32, net: i64| SettlementRecord {
            quarter,
            revenue: Decimal::new(80_000, 0),
            net_income: Decimal::new(net, 0),
            cash: Decimal::new(100_000, 0),
            visibility: Visibility::Visible,
        };
        assert_eq!(extremes_line(&[]), None);
        assert_eq!(
            extremes_line(&[rec(2, 15_000), rec(3, -2_000), rec(5, 20_000)]).as_deref(),
            Some("best: Year 2 Q1 ($20000) | worst: Year 1 Q3 ($-2000)")
        );
    }
}
