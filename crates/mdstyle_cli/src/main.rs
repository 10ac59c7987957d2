use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use mdstyle_core::{PreparedConfig, StyleConfig, load_config, load_config_file};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mdstyle")]
#[command(about = "Convert Markdown into styled text blocks as JSON")]
struct Cli {
    /// Input Markdown file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// TOML style sheet layered over the built-in styles
    #[arg(short, long)]
    styles: Option<PathBuf>,

    /// Output JSON file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Print the built-in style sheet and exit
    #[arg(long)]
    dump_default_styles: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mdstyle=info,mdstyle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.dump_default_styles {
        let sheet = StyleConfig::embedded().and_then(|sheet| sheet.to_toml());
        match sheet {
            Ok(text) => print!("{text}"),
            Err(e) => fail(format!("Error: {e}")),
        }
        return;
    }

    let config = match load_styles(cli.styles.as_ref()) {
        Ok(config) => config,
        Err(e) => fail(format!("Error: {e}")),
    };

    let source = match read_input(cli.input.as_ref()) {
        Ok(bytes) => bytes,
        Err(message) => fail(message),
    };
    debug!(bytes = source.len(), "read markdown");

    let blocks = match mdstyle_core::bytes_to_blocks(&source, &config) {
        Ok(blocks) => blocks,
        Err(e) => fail(format!("Error: {e}")),
    };

    let json = if cli.compact {
        serde_json::to_string(&blocks)
    } else {
        serde_json::to_string_pretty(&blocks)
    };
    let mut json = match json {
        Ok(json) => json,
        Err(e) => fail(format!("Error serializing blocks: {e}")),
    };
    json.push('\n');

    match cli.output {
        Some(output) => {
            if let Err(e) = fs::write(&output, json) {
                fail(format!("Error writing {}: {}", output.display(), e));
            }
            info!(blocks = blocks.len(), path = %output.display(), "wrote blocks");
        }
        None => {
            if let Err(e) = io::stdout().lock().write_all(json.as_bytes()) {
                fail(format!("Error writing output: {e}"));
            }
        }
    }
}

fn load_styles(path: Option<&PathBuf>) -> mdstyle_core::Result<PreparedConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading style sheet");
            load_config_file(path)
        }
        None => load_config(None),
    }
}

fn read_input(path: Option<&PathBuf>) -> Result<Vec<u8>, String> {
    match path {
        Some(path) => {
            fs::read(path).map_err(|e| format!("Error reading {}: {}", path.display(), e))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .map_err(|e| format!("Error reading stdin: {e}"))?;
            Ok(buffer)
        }
    }
}

fn fail(message: String) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}
