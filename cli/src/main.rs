//! reportdeck CLI - batch health-check report generation
//!
//! A command-line tool that builds one PowerPoint report per employee from
//! a slide template, a roster spreadsheet and a folder of attachments.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use reportdeck::workflow::{BatchConfig, BatchRunner, BatchSummary, DeliveryConfig, Outcome};
use reportdeck::{Placeholders, Position, SlideRequest};
use std::fs;
use std::path::PathBuf;

/// Personalized PowerPoint reports by slide injection
#[derive(Parser)]
#[command(
    name = "reportdeck",
    version,
    about = "Generate per-employee PowerPoint reports",
    long_about = "reportdeck - batch generation of personalized health-check reports.\n\n\
                  Copies template slides into a report deck per employee, fills in\n\
                  placeholders, places result images and optionally converts and\n\
                  delivers the finished reports."
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reports for every employee in the roster
    Run {
        /// TOML batch configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Template presentation
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Base deck the template slides are injected into
        #[arg(long)]
        base_deck: Option<PathBuf>,

        /// Employee roster (.xlsx)
        #[arg(short, long)]
        employees: Option<PathBuf>,

        /// Attachment root directory
        #[arg(short, long)]
        attachments: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Employees processed in parallel
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Convert every report to PDF
        #[arg(long)]
        pdf: bool,

        /// Append the identity number to file names
        #[arg(long)]
        id_suffix: bool,

        /// Display width of summary text per slide
        #[arg(long)]
        summary_chars: Option<usize>,

        /// Account lookup endpoint (requires --delivery-url)
        #[arg(long, requires = "delivery_url")]
        lookup_url: Option<String>,

        /// File delivery endpoint (requires --lookup-url)
        #[arg(long, requires = "lookup_url")]
        delivery_url: Option<String>,

        /// Write the batch summary as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Inject template slides into an existing deck
    Inject {
        /// Template presentation
        template: PathBuf,

        /// Deck to inject into
        deck: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Template slide numbers, in injection order
        #[arg(short, long = "slide", required = true, num_args = 1..)]
        slides: Vec<u32>,

        /// Where the new slides go
        #[arg(short, long, value_enum, default_value = "end")]
        position: PositionArg,

        /// Placeholder value as KEY=VALUE (repeatable)
        #[arg(long = "set", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },

    /// Show a presentation's structure and repair issues
    Inspect {
        /// Input presentation
        input: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    /// Before the existing slides
    Start,
    /// After the existing slides
    Middle,
    /// After everything else
    End,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Start => Position::Start,
            PositionArg::Middle => Position::Middle,
            PositionArg::End => Position::End,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the command and returns the process exit code.
fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            config,
            template,
            base_deck,
            employees,
            attachments,
            output,
            concurrency,
            pdf,
            id_suffix,
            summary_chars,
            lookup_url,
            delivery_url,
            summary_json,
        } => {
            let mut config = match config {
                Some(path) => BatchConfig::load(path)?,
                None => BatchConfig::new(),
            };
            if let Some(path) = template {
                config = config.with_template(path);
            }
            if let Some(path) = base_deck {
                config = config.with_base_deck(path);
            }
            if let Some(path) = employees {
                config = config.with_employees(path);
            }
            if let Some(path) = attachments {
                config = config.with_attachments(path);
            }
            if let Some(path) = output {
                config = config.with_output_dir(path);
            }
            if let Some(n) = concurrency {
                config = config.with_concurrency(n);
            }
            if pdf {
                config = config.with_pdf(true);
            }
            if id_suffix {
                config = config.with_id_suffix(true);
            }
            if let Some(width) = summary_chars {
                config = config.with_summary_chars(width);
            }
            if let (Some(lookup), Some(delivery)) = (lookup_url, delivery_url) {
                config = config.with_delivery(DeliveryConfig::new(lookup, delivery));
            }
            config.validate()?;

            let pb = create_spinner("Reading roster...");
            let roster = reportdeck::load_employees(&config.employees)?;
            pb.finish_and_clear();

            if roster.is_empty() {
                println!("{} No employees found in roster", "!".yellow().bold());
                return Ok(0);
            }

            let runner = BatchRunner::from_config(config)?;
            let pb = create_progress(roster.len() as u64)?;
            let summary = runner.run_with_progress(&roster, |report| {
                pb.set_message(report.name.clone());
                pb.inc(1);
            })?;
            pb.finish_and_clear();

            print_summary(&summary);

            if let Some(path) = summary_json {
                fs::write(&path, summary.to_json()?)?;
                println!(
                    "{} Summary written to {}",
                    "✓".green().bold(),
                    path.display()
                );
            }

            return Ok(if summary.failed > 0 { 1 } else { 0 });
        }

        Commands::Inject {
            template,
            deck,
            output,
            slides,
            position,
            values,
        } => {
            let mut placeholders = Placeholders::new();
            for (key, value) in values {
                placeholders.insert(key, value);
            }
            let requests: Vec<SlideRequest> = slides
                .iter()
                .map(|&n| {
                    SlideRequest::new(n, position.into()).with_placeholders(placeholders.clone())
                })
                .collect();

            let records = reportdeck::inject_into_file(&template, &deck, &output, &requests)?;

            for record in &records {
                println!(
                    "  {} template slide {} -> {}",
                    "+".green(),
                    record.template_slide,
                    record.part_name
                );
            }
            let missing = slides.len() - records.len();
            if missing > 0 {
                println!(
                    "{} {} requested slide(s) not in template",
                    "!".yellow().bold(),
                    missing
                );
            }
            println!(
                "{} Injected {} slide(s) into {}",
                "✓".green().bold(),
                records.len(),
                output.display()
            );
        }

        Commands::Inspect { input, json } => {
            let report = reportdeck::inspect(&input)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(if report.is_clean() { 0 } else { 2 });
            }

            println!("{}", "Presentation".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Slides".bold(), report.slides.len());
            for slide in &report.slides {
                println!(
                    "  {:>10}  {:<6}  {}",
                    slide.id,
                    slide.rel_id,
                    slide.part.as_deref().unwrap_or("-")
                );
            }
            println!("{}: {}", "Masters".bold(), report.masters.len());
            for master in &report.masters {
                println!("  {}", master);
            }
            println!("{}: {}", "Layouts".bold(), report.layouts.len());
            println!("{}: {}", "Themes".bold(), report.themes.len());
            let media_bytes: usize = report.media.values().sum();
            println!(
                "{}: {} ({} bytes)",
                "Media".bold(),
                report.media.len(),
                media_bytes
            );

            println!("\n{}", "Issues".cyan().bold());
            println!("{}", "─".repeat(40));
            if report.is_clean() {
                println!("{} No issues found", "✓".green().bold());
            } else {
                for issue in &report.issues {
                    println!("  {} {}", "✗".red(), issue);
                }
                return Ok(2);
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(0)
}

fn print_summary(summary: &BatchSummary) {
    println!("{}", "Batch Summary".cyan().bold());
    println!("{}", "─".repeat(40));

    for report in &summary.reports {
        match &report.outcome {
            Outcome::Succeeded {
                output,
                pdf,
                delivered,
                warnings,
            } => {
                let mut line = format!("{} {} -> {}", "✓".green(), report.name, output.display());
                if pdf.is_some() {
                    line.push_str(" [pdf]");
                }
                if *delivered {
                    line.push_str(" [delivered]");
                }
                println!("{}", line);
                for warning in warnings {
                    println!("    {} {}", "!".yellow(), warning);
                }
            }
            Outcome::Skipped { reason } => {
                println!("{} {} (row {}): {}", "-".yellow(), report.name, report.row, reason);
            }
            Outcome::Failed { reason, .. } => {
                println!("{} {} (row {}): {}", "✗".red(), report.name, report.row, reason);
            }
        }
    }

    println!("{}", "─".repeat(40));
    println!(
        "{} {}  {} {}  {} {}  (total {})",
        "succeeded".green().bold(),
        summary.succeeded,
        "skipped".yellow().bold(),
        summary.skipped,
        "failed".red().bold(),
        summary.failed,
        summary.total()
    );
}

fn print_version() {
    println!("{} {}", "reportdeck".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Batch generation of personalized PowerPoint reports");
    println!();
    println!("Inputs: PPTX template, XLSX roster, DOCX summaries, PDF/image attachments");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn create_progress(len: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}
