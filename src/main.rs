use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

mod catalog;
mod controller;
mod dataset;
mod domain;
mod export;
mod filter;
mod inputter;
mod loader;
mod logging;
mod model;
mod session;
mod ui;

use catalog::Catalog;
use controller::Controller;
use domain::{ViewerConfig, ViewerError};
use model::{Model, Status};
use ui::TableUI;

/// Browse the CSV files of a results folder, filter them and export what you see.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// A CSV file, a folder with CSV files, or a folder of timestamped output folders
    #[arg(default_value = "output")]
    path: String,

    /// Column shown as a checkbox group filter (repeatable)
    #[arg(long = "group-column", default_values_t = vec!["Round".to_string()])]
    group_columns: Vec<String>,

    /// Column shown as a dropdown filter (repeatable)
    #[arg(long = "select-column", default_values_t = vec!["Team".to_string()])]
    select_columns: Vec<String>,

    /// Column pinned to the left edge of the table
    #[arg(long, default_value = "Name")]
    identity_column: String,

    /// Folder exported CSV files are written to
    #[arg(long, default_value = ".")]
    export_dir: String,

    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file, defaults to resview.log in the temp folder
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}

impl Args {
    fn config(&self) -> ViewerConfig {
        ViewerConfig::default()
            .with_event_poll_time(self.poll_ms)
            .with_max_column_width(self.max_column_width)
            .with_grouped_columns(self.group_columns.clone())
            .with_select_columns(self.select_columns.clone())
            .with_identity_column(self.identity_column.clone())
            .with_export_dir(expand(&self.export_dir))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = run(&args);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), ViewerError> {
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("resview.log"));
    logging::init(&log_file)?;
    info!("Starting resview with {args:?}");

    let cfg = args.config();
    let catalog = Catalog::discover(&expand(&args.path))?;
    info!("Browsing {}", catalog.folder().display());

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(&cfg, catalog, size.width as usize, size.height as usize);
    let mut ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Without a key event the model still polls for finished loads
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
