use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use ifc_quantity_viewer::api::{ApiClient, ModelApi};
use ifc_quantity_viewer::config::Config;
use ifc_quantity_viewer::export::{export_csv, export_json};
use ifc_quantity_viewer::logging;
use ifc_quantity_viewer::parser::StepDecoder;
use ifc_quantity_viewer::store::ModelStore;
use ifc_quantity_viewer::table::QuantityTable;
use ifc_quantity_viewer::ui::App;
use ifc_quantity_viewer::upload::upload_with;

#[derive(Parser, Debug)]
#[command(name = "ifc-quantity-viewer")]
#[command(about = "IFC Quantity Viewer - browse element quantities per level and highlight them in the model")]
#[command(version)]
struct Args {
    /// Backend origin (overrides IFC_VIEWER_API_URL)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Model to open (or export) by id
    #[arg(long, value_name = "ID")]
    model: Option<String>,

    /// Write logs to this file (overrides IFC_VIEWER_LOG)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Upload an IFC file and exit
    #[arg(long, value_name = "FILE")]
    upload: Option<PathBuf>,

    /// Export the quantity table of --model to CSV
    #[arg(long, value_name = "FILE", requires = "model")]
    csv: Option<PathBuf>,

    /// Export the quantity table of --model to JSON
    #[arg(long, value_name = "FILE", requires = "model")]
    json: Option<PathBuf>,
}

impl Args {
    fn is_one_shot(&self) -> bool {
        self.upload.is_some() || self.csv.is_some() || self.json.is_some()
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(url) = &args.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if args.log_file.is_some() {
        config.log_file.clone_from(&args.log_file);
    }

    logging::init(config.log_file.as_deref(), !args.is_one_shot())?;
    tracing::debug!(?config, "Starting");

    let client = ApiClient::new(&config)?;

    if let Some(path) = &args.upload {
        let mut store = ModelStore::new(config.model_cap);
        store.set_models(client.list_models()?);
        let model = upload_with(&client, path, &mut store)?;
        println!("Uploaded {} (id {})", model.name, model.id);
    }

    if args.csv.is_some() || args.json.is_some() {
        let id = args.model.as_deref().ok_or_else(|| eyre!("--model is required for export"))?;
        let table = QuantityTable::from_data(&client.fetch_quantities(id)?);

        if let Some(csv_path) = &args.csv {
            export_csv(&table, csv_path)?;
            println!("Exported to CSV: {}", csv_path.display());
        }

        if let Some(json_path) = &args.json {
            export_json(&table, json_path)?;
            println!("Exported to JSON: {}", json_path.display());
        }
    }

    if args.is_one_shot() {
        return Ok(());
    }

    let app = App::new(Arc::new(client), Arc::new(StepDecoder), config.model_cap)
        .with_initial_model(args.model);

    let terminal = ratatui::init();
    let result = app.run(terminal);
    ratatui::restore();
    result
}
