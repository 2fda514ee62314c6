//! jpegresize CLI - resize a directory of JPEG images for viewing and the web
//!
//! Usage: jpegresize [-w=X] [-H=Y] [-c=QUALITY] [-q=N] [-i=DIR] [-o=DIR]

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};
use tracing::debug;

use jpegresize::parallel::ConsoleProgressReporter;
use jpegresize::{BatchConfig, BatchDriver, BatchReport, Config, ProcessingStrategy};

const ATTENTION: &str = "ATTENTION: ";

/// jpegresize - batch JPEG resizer
#[derive(Parser)]
#[command(
    name = "jpegresize",
    version,
    about = "Resize every *.jpg in a directory for viewing and the web",
    long_about = "Resizes every *.jpg file directly inside the input directory to the target width \
                  (aspect ratio preserved), re-encodes it at the given JPEG quality and writes it \
                  under the same name into the output directory. The first image that fails \
                  aborts the whole run.",
    after_help = "Example: jpegresize -w 1920 -H 1280 -c 70 -q 8 -i originals -o web"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Resized image max width
    #[arg(short, long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Resized image max height (accepted, width alone drives the scale)
    #[arg(short = 'H', long, value_name = "PIXELS")]
    height: Option<u32>,

    /// JPEG compression rate (10-100)
    #[arg(short = 'c', long, value_name = "QUALITY")]
    quality: Option<u32>,

    /// Number of concurrent resizing routines (default: CPU count)
    #[arg(short = 'q', long, value_name = "COUNT")]
    quota: Option<usize>,

    /// Input directory of original images
    #[arg(short, long, value_name = "DIR")]
    input: Option<PathBuf>,

    /// Output directory for resized images, created if missing
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Use a dedicated thread pool instead of async tasks
    #[arg(long)]
    threaded: bool,

    /// Configuration file (.toml or .yaml)
    #[arg(long, value_name = "FILE", env = "JPEGRESIZE_CONFIG")]
    config: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path (.toml or .yaml)
        #[arg(short, long, default_value = "jpegresize.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let no_flags = std::env::args_os().len() <= 1;
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        if let Err(e) = handle_subcommand(command) {
            fail(format!("{:#}", e));
        }
        return;
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(e.user_message()),
    };

    if let Err(e) = jpegresize::init(&config.logging) {
        fail(e.user_message());
    }

    let chatty = !cli.json && !cli.quiet;
    if no_flags && chatty {
        println!("{}", style(format!("{}No Flags. We use defaults.", ATTENTION)).green());
    }
    if chatty {
        print_settings(&config.batch);
    }

    if let Err(e) = config.validate() {
        fail(e.user_message());
    }

    let driver = BatchDriver::new(config.batch.clone());
    let reporter = chatty.then(|| {
        let show_bar = Term::stdout().is_term();
        tokio::spawn(ConsoleProgressReporter::new(driver.progress(), show_bar).start_reporting())
    });

    let result = driver.run().await;
    if let Some(handle) = reporter {
        if let Err(e) = handle.await {
            debug!("Progress reporter ended abnormally: {}", e);
        }
    }

    match result {
        Ok(report) => print_summary(&report, cli.json),
        Err(e) => fail(e.user_message()),
    }
}

/// Report a fatal error and exit
fn fail(message: impl Display) -> ! {
    eprintln!("{}", style(format!("{}{}", ATTENTION, message)).red());
    process::exit(1);
}

/// Handle subcommands
fn handle_subcommand(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::ExampleConfig { output } => generate_example_config(output),
    }
}

/// Defaults, then the config file, then command line flags
fn build_config(cli: &Cli) -> jpegresize::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let batch = &mut config.batch;
    if let Some(width) = cli.width {
        batch.export.max_width = width;
    }
    if let Some(height) = cli.height {
        batch.export.max_height = height;
    }
    if let Some(quality) = cli.quality {
        batch.export.quality = quality;
    }
    if let Some(quota) = cli.quota {
        batch.quota = quota;
    }
    if let Some(input) = &cli.input {
        batch.input_dir = input.clone();
    }
    if let Some(output) = &cli.output {
        batch.output_dir = output.clone();
    }
    if cli.threaded {
        batch.strategy = ProcessingStrategy::Threaded;
    }

    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path) -> anyhow::Result<()> {
    Config::default()
        .to_file(output_path)
        .with_context(|| format!("Failed to generate {}", output_path.display()))?;

    println!("{}: Generated example configuration: {}",
             style("Success").green().bold(),
             output_path.display());
    Ok(())
}

fn print_settings(batch: &BatchConfig) {
    let value = |v: &dyn Display| style(v.to_string()).yellow();

    println!("resized image max width: {}, resized image max height: {}",
             value(&batch.export.max_width), value(&batch.export.max_height));
    println!("input directory of original images: {}", value(&batch.input_dir.display()));
    println!("output directory for resized images: {}", value(&batch.output_dir.display()));
    println!("jpeg compression rate: {}%", value(&batch.export.quality));
    println!("concurrent resizing routines: {}", value(&batch.quota));
    println!();
}

/// Print processing summary
fn print_summary(report: &BatchReport, json_output: bool) {
    if json_output {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("Failed to serialize report: {}", e)),
        }
        return;
    }

    println!();
    println!("{}", report.summary_line());
    if report.statistics.files_processed > 0 {
        println!("  {}: {:.1}x ({:.1}% reduction)",
                 style("Compression").cyan(),
                 report.statistics.compression_ratio(),
                 report.statistics.size_reduction());
    }
}
