pub mod api;
pub mod playlist;

pub use api::{ApiServer, ApiServerConfig, AppState};
pub use playlist::{load_playlist, parse_playlist};
