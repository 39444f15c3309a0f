use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use varnish_health::collectors::VarnishStatCollector;
use varnish_health::config::{DEFAULT_TMPDIR, DEFAULT_UTILITY_PATH};
use varnish_health::metrics::Metric;
use varnish_health::storage::SqliteSampleStore;
use varnish_health::{Check, CheckConfig, CheckResult};

#[derive(Parser, Debug)]
#[command(author, version, about = "Check plugin for monitoring a Varnish instance", long_about = None)]
struct Args {
    /// Return warning if the value is outside RANGE, e.g. 5:25, :30 or 95:
    #[arg(short, long, value_name = "RANGE", default_value = "")]
    warning: String,

    /// Return critical if the value is outside RANGE, e.g. 5:25, :30 or 95:
    #[arg(short, long, value_name = "RANGE", default_value = "")]
    critical: String,

    /// Path to the varnishstat utility
    #[arg(
        short = 'u',
        long,
        alias = "varnishlog-utility-path",
        env = "VARNISH_UTILITY_PATH",
        default_value = DEFAULT_UTILITY_PATH
    )]
    utility_path: PathBuf,

    /// Varnish instance name, hostname by default
    #[arg(short = 'n', long, alias = "varnish-instance-name", env = "VARNISH_INSTANCE_NAME")]
    instance_name: Option<String>,

    /// Directory holding the samples used for rate metrics
    #[arg(short, long, env = "VARNISH_CHECK_TMPDIR", default_value = DEFAULT_TMPDIR)]
    tmpdir: PathBuf,

    /// Maximum value for performance data
    #[arg(long)]
    max: Option<f64>,

    /// Minimum value for performance data
    #[arg(long)]
    min: Option<f64>,

    #[arg(long, help = format!("Supported keywords: {}", Metric::catalog()))]
    metric: String,

    /// Increase output verbosity (use up to 2 times)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl From<Args> for CheckConfig {
    fn from(args: Args) -> Self {
        Self {
            metric: args.metric,
            warning: args.warning,
            critical: args.critical,
            utility_path: args.utility_path,
            instance_name: args.instance_name,
            tmpdir: args.tmpdir,
            min: args.min,
            max: args.max,
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

// Status output must stay on one line, so fold clap's report and drop its hints.
fn usage_error(report: &str) -> String {
    report
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("Usage:") && !line.starts_with("For more information")
        })
        .map(|line| line.trim_start_matches("error: "))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let result = CheckResult::unknown(usage_error(&e.to_string()));
            println!("{}", result);
            process::exit(result.exit_code());
        }
    };

    init_logging(args.verbose);

    let config = CheckConfig::from(args);
    let collector = VarnishStatCollector::new(
        config.utility_path.clone(),
        config.instance_name.clone(),
    );
    let store = SqliteSampleStore::new(&config.tmpdir);

    let result = Check::new(config, Box::new(collector), Box::new(store)).run();

    println!("{}", result);
    process::exit(result.exit_code());
}
