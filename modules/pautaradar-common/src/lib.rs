pub mod anchors;
pub mod config;
pub mod deltas;
pub mod error;
pub mod lanes;
pub mod profile;
pub mod scoring;
pub mod simhash;
pub mod state;
pub mod types;

pub use config::Config;
pub use error::RadarError;
pub use profile::{ApiContract, Cadence, Pool, SourceProfile, Strategy};
pub use types::{AnchorType, EditorialAction, EntityLabel, ErrorClass, EventStatus};
