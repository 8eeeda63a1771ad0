//! foil self test: writes, loads and connects with a database config file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use foil::{Config, Mongo, MongoSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILENAME: &str = ".foilmongo";

/// Foil library self test
#[derive(Parser, Debug)]
#[command(name = "foil-selftest", version, about, long_about = None)]
struct Args {
    /// Test number to run (see --list)
    #[arg(short = 'n', long)]
    testnum: Option<usize>,

    /// Generate the default config file
    #[arg(short, long)]
    init: bool,

    /// Config filename to use
    #[arg(short, long, default_value = DEFAULT_FILENAME)]
    filename: PathBuf,

    /// List available tests to run
    #[arg(short, long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

type Test = fn(&Args) -> foil::Result<()>;

const TESTS: &[(&str, Test)] = &[
    ("init_config_file", init_config_file),
    ("load_config_file", load_config_file),
    ("connect_mongodb", connect_mongodb),
];

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.list {
        println!("Available tests:");
        for (i, (name, _)) in TESTS.iter().enumerate() {
            println!("{i}: {name}");
        }
        return ExitCode::SUCCESS;
    }

    if let Some(num) = args.testnum {
        let Some((name, test)) = TESTS.get(num) else {
            error!(
                requested = num,
                available = TESTS.len(),
                "requested test num is out of range"
            );
            return ExitCode::FAILURE;
        };
        info!(test = %name, "running test");
        if let Err(e) = test(&args) {
            error!(test = %name, error = %e, "test failed");
            return ExitCode::FAILURE;
        }
    }

    if args.init {
        if let Err(e) = init_config_file(&args) {
            error!(error = %e, "could not write config file");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn init_config_file(args: &Args) -> foil::Result<()> {
    MongoSettings::template().write(&args.filename, false)?;
    println!("Wrote {}", args.filename.display());
    Ok(())
}

fn load_config_file(args: &Args) -> foil::Result<()> {
    let config = Config::load(&args.filename)?;
    println!("Config load was successful");

    println!("Sections:");
    for section in config.sections() {
        println!("[{section}]");
        for (option, value) in config.options(section) {
            match value.as_str() {
                Some(s) => println!("{option}={s}"),
                None => println!("{option}={value}"),
            }
        }
    }
    Ok(())
}

fn connect_mongodb(args: &Args) -> foil::Result<()> {
    let db = Mongo::from_file(&args.filename)?;
    println!(
        "Connected to {}:{} (database '{}')",
        db.settings().address,
        db.settings().port,
        db.settings().database_name
    );
    db.disconnect();
    Ok(())
}
