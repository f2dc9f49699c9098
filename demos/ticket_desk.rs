//! Demo ticket desk working on a data directory.
//!
//! Run with:
//! ```bash
//! cargo run --example ticket_desk --features demo -- --help
//! cargo run --example ticket_desk --features demo -- issue FORTINA JAGUAR
//! cargo run --example ticket_desk --features demo -- adjust COCA -- -3
//! cargo run --example ticket_desk --features demo -- show --format compact
//! cargo run --example ticket_desk --features demo -- watch recuento
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use turnero::config::EngineConfig;
use turnero::desk::{NullPrinter, TicketDesk};
use turnero::document::{CounterDocument, Topic};
use turnero::engine::CounterEngine;
use turnero::service::Service;
use turnero::views::table::{TableRenderer, TableStyle};
use turnero::views::DocumentView;

/// Output format for documents.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty table, one counter per row
    Table,
    /// Compact table with multiple columns
    Compact,
    /// Display values as JSON
    Json,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Demo ticket desk for turnero - daily ticket counters shared between stations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Table style
    #[arg(short, long, value_enum, default_value = "rounded", global = true)]
    style: StyleChoice,

    /// Number of columns (for compact format)
    #[arg(short, long, default_value = "4", global = true)]
    columns: usize,

    /// Show stored values next to displayed ones
    #[arg(long, global = true)]
    stored: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue tickets by button name (FORTINA, FORTINB, ..., JAGUAR, BAR)
    Issue {
        /// Buttons to press, in order
        #[arg(required = true)]
        buttons: Vec<String>,

        /// Press the buttons this many times
        #[arg(long, default_value = "1")]
        repeat: usize,
    },
    /// Move an inventory item by a delta
    Adjust {
        /// Item name, e.g. COCA
        item: String,
        /// Signed delta
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
    /// Print both documents
    Show,
    /// Follow a topic and print every update
    Watch {
        /// Topic or room name (visits, inventory, recuento, barra)
        #[arg(default_value = "visits")]
        topic: String,
    },
}

fn render(args: &Args, topic: Topic, document: &CounterDocument) -> String {
    let view = DocumentView::new(topic, document);
    match args.format {
        OutputFormat::Table => TableRenderer::new()
            .with_style(args.style.into())
            .with_stored(args.stored)
            .render(&view),
        OutputFormat::Compact => TableRenderer::new()
            .compact(true)
            .columns(args.columns)
            .with_style(args.style.into())
            .with_stored(args.stored)
            .render(&view),
        OutputFormat::Json => serde_json::to_string_pretty(&view)
            .unwrap_or_else(|e| format!("Error: {}", e)),
    }
}

async fn run(args: &Args) -> turnero::Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config = config.with_data_dir(dir);
    }

    match &args.command {
        Command::Issue { buttons, repeat } => {
            let desk = TicketDesk::new(
                CounterEngine::new(config.store()),
                NullPrinter,
                config.stations.clone(),
            );
            for _ in 0..*repeat {
                for button in buttons {
                    println!("{}", desk.issue_named(button).await?);
                }
            }
            let visits = desk.engine().snapshot(Topic::Visits).await?;
            println!("{}", render(args, Topic::Visits, &visits));
        }
        Command::Adjust { item, delta } => {
            let service = Service::from_config(&config);
            let level = service.adjust_inventory(item, *delta).await?;
            println!("{item} = {level}");
            let inventory = service.engine().snapshot(Topic::Inventory).await?;
            println!("{}", render(args, Topic::Inventory, &inventory));
        }
        Command::Show => {
            let service = Service::from_config(&config);
            for topic in Topic::ALL {
                let document = service.engine().snapshot(topic).await?;
                println!("{}\n", render(args, topic, &document));
            }
        }
        Command::Watch { topic } => {
            let service = Service::from_config(&config);
            let (client, mut updates) = service.connect();
            service.subscribe_named(client, topic).await?;
            while let Some(update) = updates.recv().await {
                // Clear screen (ANSI escape code)
                print!("\x1B[2J\x1B[1;1H");
                println!("{}", render(args, update.topic, &update.document));
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
