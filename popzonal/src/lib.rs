//! # popzonal
//!
//! Comptes de population par unité administrative à partir de rasters.
//!
//! ## Features
//!
//! - Runs décrits par un fichier JSON (limites, lots de rasters, tri, sorties)
//! - Export CSV et GeoJSON écrits seulement si tout le calcul a réussi
//! - Rapport de run avec checksums blake3 des entrées
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Run complet décrit par un fichier de configuration
//! popzonal run --config run.json
//!
//! # Un seul lot, sans fichier de configuration
//! popzonal sum --boundaries communes.geojson --raster ./worldpop/ --prefix wp_ \
//!     --keep nom --sort-by nom --total --output out/communes.csv
//!
//! # Décrire un raster
//! popzonal inspect ./worldpop/fra_ppp_2020.asc
//! ```

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;
pub mod sources;

pub use config::{BatchSpec, Coverage, OnFailure, RunConfig};
pub use pipeline::{execute, run, RunOutput};
pub use report::{RunReport, RunStatus};
