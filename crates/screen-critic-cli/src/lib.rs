//! ScreenCritic command-line support: configuration and pipeline wiring.

pub mod config;
pub mod run;

pub use config::{load_dotenv, Overrides, Settings};
pub use run::{build_pipeline, run_once, HostedPipeline};
