use clap::{value_parser, Arg, Command};
use hotpath_core::sim::{run_simulator, SimulatorConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("hotpath")
        .version(hotpath_core::VERSION)
        .about("Iterative profile-guided optimization loop for native executables")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Drive a full optimization run with scripted collaborators")
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Root directory for the run's audit tree"),
                )
                .arg(
                    Arg::new("source-root")
                        .long("source-root")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of real source files to load as units (synthesized when omitted)"),
                )
                .arg(
                    Arg::new("units")
                        .long("units")
                        .default_value("2")
                        .value_parser(value_parser!(usize))
                        .help("Number of synthesized units when no source root is given"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Iteration budget per source unit"),
                )
                .arg(
                    Arg::new("variants")
                        .long("variants")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Candidate variants per batch"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Seed for all scripted randomness"),
                )
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .default_value("5.0")
                        .value_parser(value_parser!(f64))
                        .help("Significance threshold in percentage points"),
                )
                .arg(
                    Arg::new("workers")
                        .long("workers")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Bound on concurrent variant compile+profile tasks"),
                ),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let mut config =
                SimulatorConfig::new(args.get_one::<PathBuf>("output-dir").unwrap().clone());
            config.source_root = args.get_one::<PathBuf>("source-root").cloned();
            config.units = *args.get_one::<usize>("units").unwrap();
            config.iterations = *args.get_one::<usize>("iterations").unwrap();
            config.variants_per_batch = *args.get_one::<usize>("variants").unwrap();
            config.seed = *args.get_one::<u64>("seed").unwrap();
            config.threshold = *args.get_one::<f64>("threshold").unwrap();
            config.max_profile_workers = *args.get_one::<usize>("workers").unwrap();

            match run_simulator(config).await {
                Ok(report) => {
                    println!("{}", report.generate_text());
                    // Exit code tells operators whether anything was
                    // actually promoted versus a no-op run.
                    std::process::exit(if report.any_promotion() { 0 } else { 1 });
                }
                Err(err) => {
                    eprintln!("run failed: {err:#}");
                    std::process::exit(2);
                }
            }
        }
        _ => {}
    }
}
