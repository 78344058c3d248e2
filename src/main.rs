use std::io::Read;

use clap::Parser;
use mermaid_ascii::{LayoutConfig, Placement, RenderOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mermaid-ascii", about = "Render Mermaid flowcharts as ASCII art")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    file: Option<std::path::PathBuf>,

    /// Place nodes on a square grid instead of the level layout
    #[arg(long)]
    grid: bool,

    /// Minimum empty cells between nodes
    #[arg(long, default_value_t = 1)]
    spacing: usize,

    /// Rows between levels (columns for LR/RL)
    #[arg(long)]
    rank_gap: Option<usize>,

    /// Columns between nodes of one level (rows for LR/RL)
    #[arg(long)]
    node_gap: Option<usize>,

    /// Log to stderr; repeat for more detail. RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn render_options(&self) -> RenderOptions {
        let mut layout = LayoutConfig::default();
        if let Some(gap) = self.rank_gap {
            layout.rank_gap = gap;
            layout.lr_rank_gap = gap;
        }
        if let Some(gap) = self.node_gap {
            layout.node_gap = gap;
            layout.lr_node_gap = gap;
        }
        RenderOptions {
            layout,
            placement: if self.grid {
                Placement::Grid
            } else {
                Placement::Relax
            },
            min_spacing: self.spacing,
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };

    match mermaid_ascii::render_with_options(&input, &cli.render_options()) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
