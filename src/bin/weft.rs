//! Weft CLI - render token templates from files or stdin

#[cfg(feature = "cli")]
use clap::Parser;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use weft::{DelimiterStyle, MissingTokenPolicy, RenderOptions, Renderer, TemplateError, Variables};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "weft")]
#[command(version)]
#[command(about = "Weft - render streaming token templates", long_about = None)]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input_file: Option<PathBuf>,

    /// Output file path (writes to stdout if not provided)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON object file with initial values
    #[arg(long, value_name = "FILE")]
    vars: Option<PathBuf>,

    /// Set a value (repeatable), applied after --vars
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Options file (.json or .toml); flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Delimiter style: double-brace, dollar-brace, angle-percent,
    /// double-bracket, or LEFT,RIGHT
    #[arg(long)]
    delimiters: Option<String>,

    /// Render undefined tokens as nothing instead of error markers
    #[arg(long)]
    ignore_missing: bool,

    /// Resolve unknown names from environment variables
    #[arg(long)]
    env_fallback: bool,

    /// Maximum nested expansion depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Read buffer size in characters
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> Result<(), TemplateError> {
    let options = build_options(&cli)?;
    let mut vars = load_vars(&cli)?;
    let mut renderer = Renderer::new(options)?;

    let reader: Box<dyn Read> = match &cli.input_file {
        Some(path) => Box::new(BufReader::new(fs::File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(fs::File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    renderer.render(reader, writer, &mut vars)
}

#[cfg(feature = "cli")]
fn build_options(cli: &Cli) -> Result<RenderOptions, TemplateError> {
    let mut options = match &cli.config {
        Some(path) => RenderOptions::from_file(path)?,
        None => RenderOptions::default(),
    };
    if let Some(spec) = &cli.delimiters {
        options.delimiters = DelimiterStyle::parse(spec)?;
    }
    if cli.ignore_missing {
        options.missing_tokens = MissingTokenPolicy::Ignore;
    }
    if cli.env_fallback {
        options.environment_fallback = true;
    }
    if let Some(depth) = cli.max_depth {
        options.max_recursion_depth = depth;
    }
    if let Some(size) = cli.buffer_size {
        options.buffer_size = size;
    }
    options.validate()?;
    Ok(options)
}

#[cfg(feature = "cli")]
fn load_vars(cli: &Cli) -> Result<Variables, TemplateError> {
    let mut vars = match &cli.vars {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Variables::from_json(&text).map_err(|e| {
                TemplateError::config(format!("invalid --vars file '{}': {}", path.display(), e))
            })?
        }
        None => Variables::new(),
    };
    for assignment in &cli.set {
        let Some((name, value)) = assignment.split_once('=') else {
            return Err(TemplateError::config(format!(
                "--set expects NAME=VALUE, got '{}'",
                assignment
            )));
        };
        vars.insert(name.trim(), value);
    }
    Ok(vars)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
}
