//! # IFC Quantity Viewer
//!
//! A terminal client for an IFC quantity backend: pick an uploaded model,
//! browse its aggregated quantities per building level and highlight the
//! selected elements in the model.
//!
//! ## Features
//!
//! - List, fetch and upload models over the backend REST API
//! - Quantity table with per-level counts, summary row and sorting
//! - Row and level selection synced to the model viewer
//! - Export to CSV and JSON
//!
//! ## Example
//!
//! ```no_run
//! use ifc_quantity_viewer::api::{ApiClient, ModelApi};
//! use ifc_quantity_viewer::config::Config;
//! use ifc_quantity_viewer::table::QuantityTable;
//!
//! let client = ApiClient::new(&Config::from_env()).expect("client");
//! let data = client.fetch_quantities("1").expect("quantities");
//! let table = QuantityTable::from_data(&data);
//! println!("Total elements: {}", table.summary().total);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod parser;
pub mod store;
pub mod table;
pub mod tasks;
pub mod ui;
pub mod upload;
pub mod viewer;
