use clap::Parser;
use sheaf::{DiagnosticKind, HtmlConverter, SheafError};
use std::path::PathBuf;
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Converts an HTML file with CSS into a PDF.
#[derive(Parser, Debug)]
#[command(name = "sheaf", version, about)]
struct Args {
    /// HTML input file
    input: PathBuf,

    /// PDF output file
    output: PathBuf,

    /// Extra author stylesheet; may be given several times, later ones win ties
    #[arg(long = "css", value_name = "FILE")]
    stylesheets: Vec<PathBuf>,

    /// JSON conversion config with camelCase keys
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use fonts installed on this machine
    #[arg(long)]
    system_fonts: bool,
}

fn run(args: &Args) -> Result<(), SheafError> {
    let mut builder = HtmlConverter::builder().with_system_fonts(args.system_fonts);
    if let Some(config) = &args.config {
        builder = builder.with_config_file(config)?;
    }
    if let Some(dir) = args.input.parent() {
        builder = builder.with_base_dir(dir);
    }
    for sheet in &args.stylesheets {
        builder = builder.with_stylesheet_file(sheet);
    }
    let converter = builder.build()?;

    let report = converter.convert_file(&args.input, &args.output)?;
    let problems = report
        .diagnostics
        .iter()
        .filter(|d| d.kind != DiagnosticKind::Unsupported)
        .count();
    println!(
        "Wrote {} ({} pages, {} blocks, {} bookmarks, {} problems)",
        args.output.display(),
        report.pages,
        report.blocks,
        report.bookmarks,
        problems
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sheaf: {}", err);
            ExitCode::FAILURE
        }
    }
}
