mod binding;
mod config;
mod export;
mod html;
mod table;
mod util;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use binding::Sorter;
use config::Config;
use html::Document;

/// A header click replayed from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
struct Click {
    table: String,
    column: usize,
}

#[derive(Debug, Default)]
struct Options {
    file_path: Option<PathBuf>,
    output: Option<PathBuf>,
    in_place: bool,
    config_path: Option<PathBuf>,
    clicks: Vec<Click>,
    csv: Option<String>,
    preview: Option<String>,
}

/// Parse an `ID:COL` click argument
fn parse_click(s: &str) -> Option<Click> {
    let (table, column) = s.rsplit_once(':')?;
    if table.is_empty() {
        return None;
    }
    Some(Click { table: table.to_string(), column: column.trim().parse().ok()? })
}

/// Value for an option that takes an argument
fn option_value(args: &[String], i: usize, name: &str) -> Result<String, String> {
    args.get(i + 1)
        .cloned()
        .ok_or_else(|| format!("{} requires an argument", name))
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--click" => {
                let value = option_value(args, i, "--click")?;
                let click = parse_click(&value).ok_or_else(|| {
                    format!("Invalid click: '{}'. Use TABLE_ID:COLUMN, e.g. results:2", value)
                })?;
                opts.clicks.push(click);
                i += 2;
            }
            "-o" | "--output" => {
                opts.output = Some(PathBuf::from(option_value(args, i, "--output")?));
                i += 2;
            }
            "-i" | "--in-place" => {
                opts.in_place = true;
                i += 1;
            }
            "--config" => {
                opts.config_path = Some(PathBuf::from(option_value(args, i, "--config")?));
                i += 2;
            }
            "--csv" => {
                opts.csv = Some(option_value(args, i, "--csv")?);
                i += 2;
            }
            "--preview" => {
                opts.preview = Some(option_value(args, i, "--preview")?);
                i += 2;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                opts.file_path = Some(PathBuf::from(&args[i]));
                i += 1;
            }
        }
    }

    if opts.in_place && opts.output.is_some() {
        return Err("--in-place and --output cannot be used together".to_string());
    }

    Ok(opts)
}

fn print_help() {
    eprintln!("tablesort - Make HTML tables sortable and replay header clicks");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    tablesort [OPTIONS] FILE");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --click <ID:COL>   Click header COL of table ID (repeatable, applied in order)");
    eprintln!("    -o, --output <PATH>    Write the resulting HTML to PATH (default: stdout)");
    eprintln!("    -i, --in-place         Rewrite FILE (not combinable with --output)");
    eprintln!("    --config <PATH>        Load settings from a TOML file");
    eprintln!("    --csv <ID>             Print table ID as CSV instead of HTML");
    eprintln!("    --preview <ID>         Print table ID as an aligned text preview");
    eprintln!("    -h, --help             Print this help message");
    eprintln!();
    eprintln!("Tables opt in with class=\"sortable\" and an id attribute.");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=debug) for diagnostics on stderr.");
}

/// Replace `path` atomically with `content`
fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    // The temp file is created 0600; keep the mode of the file being replaced
    if let Ok(metadata) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(metadata.permissions())?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Apply every click in order. Rejected clicks are logged and skipped.
fn replay_clicks(sorter: &mut Sorter, doc: &mut Document, clicks: &[Click]) -> usize {
    let mut applied = 0;
    for click in clicks {
        match sorter.click(doc, &click.table, click.column) {
            Ok(outcome) => {
                debug!(table = %click.table, column = click.column, rows = outcome.rows, "Click applied");
                applied += 1;
            }
            Err(e) => warn!(table = %click.table, column = click.column, error = %e, "Click ignored"),
        }
    }
    applied
}

fn missing_table(id: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("Unable to locate table '{}'", id))
}

fn run(opts: Options) -> io::Result<()> {
    let Some(file_path) = opts.file_path else {
        print_help();
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "No input file given"));
    };

    let config = match &opts.config_path {
        Some(path) => Config::from_file(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
        None => Config::default(),
    };
    let max_preview_width = config.max_preview_width;

    let source = std::fs::read_to_string(&file_path)?;
    let mut doc = Document::parse(&source)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut sorter = Sorter::new(config);
    sorter.install(&mut doc);
    let applied = replay_clicks(&mut sorter, &mut doc, &opts.clicks);
    info!(file = %file_path.display(), clicks = applied, "Document processed");

    if let Some(id) = &opts.csv {
        let table = doc.find(id).ok_or_else(|| missing_table(id))?;
        return export::write_csv(table, io::stdout().lock());
    }
    if let Some(id) = &opts.preview {
        let table = doc.find(id).ok_or_else(|| missing_table(id))?;
        let mut stdout = io::stdout().lock();
        return stdout.write_all(export::preview(table, max_preview_width).as_bytes());
    }

    let html = doc.render();
    if opts.in_place {
        write_atomic(&file_path, &html)
    } else if let Some(output) = &opts.output {
        write_atomic(output, &html)
    } else {
        io::stdout().lock().write_all(html.as_bytes())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    info!("tablesort started");

    let args: Vec<String> = std::env::args().collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(opts) {
        error!(error = %e, "tablesort failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
