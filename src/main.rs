use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use log::info;
use serde_json::json;

use rusty_curves::data::sources::scan_folder;
use rusty_curves::{Session, SessionOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Load .csv/.plt files, save curves and evaluate formulas", long_about = None)]
struct Cli {
    /// JSON file with session options
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the columns shared by all files
    Columns {
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },
    /// Print a file's rows as JSON records
    Table {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// List the loadable files of a folder
    Scan {
        #[arg(value_hint = ValueHint::DirPath)]
        dir: PathBuf,
        #[arg(long, default_value = ".plt")]
        extension: String,
    },
    /// Save x/y curves from files, then optionally evaluate a formula
    Eval {
        #[arg(long, required = true, num_args = 1.., value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        x: String,
        /// May be repeated; each column becomes its own set of curves
        #[arg(short, long, required = true)]
        y: Vec<String>,
        /// e.g. "C1 / C2"
        #[arg(long)]
        formula: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = match &cli.config {
        Some(path) => SessionOptions::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionOptions::default(),
    };
    let mut session = Session::new(options);

    match cli.command {
        Command::Columns { files } => {
            let keys = register(&mut session, files);
            let columns = session.common_columns(&keys)?;
            println!("{}", serde_json::to_string_pretty(&columns)?);
        }
        Command::Table { file } => {
            let keys = register(&mut session, vec![file]);
            let records = session.records(&keys)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Scan { dir, extension } => {
            for path in scan_folder(&dir, &extension) {
                println!("{}", path.display());
            }
        }
        Command::Eval {
            files,
            x,
            y,
            formula,
        } => {
            let keys = register(&mut session, files);
            for y_column in &y {
                session
                    .save_selection(&keys, &x, y_column)
                    .with_context(|| format!("saving `{x}` vs `{y_column}`"))?;
            }
            info!("{} curves saved", session.curves().len());

            let derived = formula
                .as_deref()
                .map(|f| session.evaluate_formula(f))
                .transpose()
                .context("evaluating formula")?;

            let report = json!({
                "curves": session.curves().records(),
                "derived": derived,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Add files to the session and return their keys as full paths.
fn register(session: &mut Session, files: Vec<PathBuf>) -> Vec<String> {
    let keys = files.iter().map(|p| p.display().to_string()).collect();
    session.add_sources(files);
    keys
}
