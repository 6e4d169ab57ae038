pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod model;
pub mod store;

pub use config::{AppConfig, DisplayConfig, GroupsConfig, LoggingConfig};
pub use error::{LesionError, LesionResult};
pub use graph::{
    build_connection_map, lesion_trajectory, related_segments, ConnectionMap, LineageGraph,
    StudyGroup,
};
pub use model::*;
pub use store::Catalog;
