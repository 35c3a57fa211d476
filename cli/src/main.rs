//! pdfsheet CLI - PDF to workbook conversion tool

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfsheet::{
    discover_inputs, ConversionPipeline, ConversionResult, MetadataKey, PageRange, PdfSheet,
    StrategyKind, WarningSection,
};

#[derive(Parser)]
#[command(name = "pdfsheet")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert PDF documents into multi-sheet Excel workbooks", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output workbook
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one PDF into a workbook
    Convert {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output workbook (defaults to <FILE stem>.xlsx)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Convert many PDFs, one workbook each
    Batch {
        /// Input files or directories (searched recursively for .pdf files)
        #[arg(value_name = "PATH", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Documents converted at the same time
        #[arg(short = 'j', long, value_name = "N")]
        jobs: Option<usize>,

        /// Do not write summary.json
        #[arg(long)]
        no_summary: bool,

        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Show document information without converting
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Document password
        #[arg(long, env = "PDFSHEET_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show version information
    Version,
}

/// Options shared by `convert` and `batch`.
#[derive(Args)]
struct ConversionArgs {
    /// Page range (e.g., "all", "3", "2-5")
    #[arg(long)]
    pages: Option<String>,

    /// Document password
    #[arg(long, env = "PDFSHEET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip image extraction
    #[arg(long)]
    no_images: bool,

    /// Skip table detection
    #[arg(long)]
    no_tables: bool,

    /// Table strategy order (e.g., "ruled_line,whitespace")
    #[arg(long, value_name = "LIST")]
    strategies: Option<String>,

    /// Directory for extracted images (defaults to the workbook's directory)
    #[arg(long, value_name = "DIR")]
    image_dir: Option<PathBuf>,

    /// Maximum column width in characters
    #[arg(long, default_value = "50")]
    max_column_width: f64,

    /// Per-document time limit in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Extract page sections one after another
    #[arg(long)]
    sequential: bool,
}

impl Default for ConversionArgs {
    fn default() -> Self {
        Self {
            pages: None,
            password: None,
            no_images: false,
            no_tables: false,
            strategies: None,
            image_dir: None,
            max_column_width: 50.0,
            timeout: None,
            sequential: false,
        }
    }
}

impl ConversionArgs {
    fn builder(&self) -> Result<PdfSheet, Box<dyn std::error::Error>> {
        let mut sheet = PdfSheet::new()
            .with_images(!self.no_images)
            .with_tables(!self.no_tables)
            .with_max_column_width(self.max_column_width);

        if let Some(ref pages) = self.pages {
            sheet = sheet.with_pages(PageRange::parse(pages)?);
        }
        if let Some(ref password) = self.password {
            sheet = sheet.with_password(password.clone());
        }
        if let Some(ref order) = self.strategies {
            sheet = sheet.with_strategy_order(&StrategyKind::parse_order(order)?)?;
        }
        if let Some(ref dir) = self.image_dir {
            sheet = sheet.with_image_dir(dir.clone());
        }
        if let Some(secs) = self.timeout {
            sheet = sheet.with_timeout(Duration::from_secs(secs));
        }
        if self.sequential {
            sheet = sheet.sequential();
        }
        Ok(sheet)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            conversion,
        }) => cmd_convert(&input, output.as_deref(), &conversion),
        Some(Commands::Batch {
            inputs,
            output,
            jobs,
            no_summary,
            conversion,
        }) => cmd_batch(&inputs, &output, jobs, no_summary, &conversion),
        Some(Commands::Info { input, password }) => cmd_info(&input, password.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), &ConversionArgs::default())
            } else {
                println!("{}", "Usage: pdfsheet <FILE> [OUTPUT]".yellow());
                println!("       pdfsheet --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    PathBuf::from(format!("{}.xlsx", stem))
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    args: &ConversionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input));
    let sheet = args.builder()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Converting {}...", input.display()));

    let result = sheet.convert(input, &output);
    pb.finish_and_clear();
    let result = result?;

    println!("{} {}", "Saved to".green(), output.display());
    print_result_summary(&result);
    Ok(())
}

fn print_result_summary(result: &ConversionResult) {
    println!("  {} {} pages", "├─".dimmed(), result.pages.len());
    println!("  {} {} tables", "├─".dimmed(), result.tables.len());
    println!("  {} {} images", "├─".dimmed(), result.images.len());
    println!("  {} {} warnings", "└─".dimmed(), result.warnings.len());

    for warning in &result.warnings {
        println!("    {} {}", "!".yellow(), warning);
    }
}

fn cmd_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    jobs: Option<usize>,
    no_summary: bool,
    args: &ConversionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = discover_inputs(inputs);
    if inputs.is_empty() {
        return Err("no PDF files found".into());
    }

    let sheet = args.builder()?;
    let mut options = pdfsheet::BatchOptions::new()
        .with_convert(sheet.convert_options().clone())
        .with_assemble(sheet.assemble_options().clone())
        .with_summary(!no_summary);
    if let Some(jobs) = jobs {
        options = options.with_concurrency_limit(jobs)?;
    }

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let result = pdfsheet::BatchRunner::new().run(&inputs, output_dir, &options, |progress| {
        pb.set_position(progress.completed as u64);
        let name = progress
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if progress.ok {
            pb.set_message(name);
        } else {
            pb.println(format!("{} {}", "failed".red(), progress.input.display()));
        }
    });
    pb.finish_and_clear();

    println!(
        "{} {} converted, {} failed",
        "Batch complete:".green().bold(),
        result.succeeded(),
        result.failed()
    );
    for (input, err) in result.failures() {
        println!(
            "  {} {} [{}] {}",
            "✗".red(),
            input.display(),
            err.kind(),
            err
        );
    }
    if let Some(ref path) = result.summary_path {
        println!("{} {}", "Summary:".bold(), path.display());
    }

    if result.failed() > 0 {
        return Err(format!("{} of {} documents failed", result.failed(), result.total()).into());
    }
    Ok(())
}

fn cmd_info(input: &Path, password: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    pdfsheet::validate_input(input)?;
    let info = ConversionPipeline::new().inspect(input, password)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), info.page_count);

    for (key, value) in info.metadata.iter() {
        if matches!(key, MetadataKey::PageCount | MetadataKey::FileName) {
            continue;
        }
        println!("{}: {}", key.label().bold(), value);
    }

    let warnings: Vec<_> = info.warnings_for(WarningSection::Metadata).collect();
    if !warnings.is_empty() {
        println!();
        for warning in warnings {
            println!("{} {}", "!".yellow(), warning);
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfsheet".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF to workbook converter");
    println!();
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
}
