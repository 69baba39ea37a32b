use clap::Parser;
use formcheck::{Params, Runner, Suite, SuiteReport};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "formcheck")]
#[command(about = "Browser-driven form submission checks")]
#[command(version)]
struct Cli {
    /// Suite files to run
    #[arg(required = true)]
    suites: Vec<PathBuf>,

    /// Run in headless mode (overrides suite)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Only run cases whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate suites without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> formcheck::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = Params::from_args(&cli.params)?;

    // Load everything up front so a broken file fails before any browser starts
    let mut suites = Vec::with_capacity(cli.suites.len());
    for path in &cli.suites {
        suites.push(Suite::load_with_params(path, &params)?);
    }

    if cli.check {
        for suite in &suites {
            print_check(suite);
        }
        return Ok(());
    }

    let mut all_passed = true;
    for mut suite in suites {
        if cli.headless {
            suite.browser.headless = true;
        }

        println!("Running: {}", suite.name);
        let runner = Runner::new(&suite.browser).await?;
        let report = runner.run_filtered(&suite, cli.filter.as_deref()).await;
        runner.close().await?;

        print_report(&report);
        all_passed &= report.success();
    }

    if !all_passed {
        std::process::exit(1);
    }

    Ok(())
}

fn print_check(suite: &Suite) {
    println!("Suite valid: {}", suite.name);
    println!("  Start URL: {}", suite.start_url);
    println!("  Cases: {}", suite.cases.len());
    for case in &suite.cases {
        println!("    - {} ({} steps)", case.name, case.steps.len());
    }
    if !suite.params.is_empty() {
        println!("  Parameters: {}", suite.params.len());
        for (name, def) in &suite.params {
            let req = if def.required { " (required)" } else { "" };
            let desc = def.description.as_deref().unwrap_or("");
            println!("    - {}{}: {}", name, req, desc);
        }
    }
}

fn print_report(report: &SuiteReport) {
    println!();
    for case in &report.cases {
        if case.passed {
            println!("✓ {} ({}ms)", case.name, case.duration_ms);
        } else {
            println!("✗ {} ({}ms)", case.name, case.duration_ms);
            if let Some(ref error) = case.error {
                for line in error.lines() {
                    println!("    {}", line);
                }
            }
        }
    }
    println!();
    println!(
        "  {} passed, {} failed ({}ms)",
        report.passed(),
        report.failed(),
        report.duration_ms
    );
}
