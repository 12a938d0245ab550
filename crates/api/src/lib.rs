mod env;
mod global_state;
mod response;
mod routes;
mod utils;

pub use env::ApiServerEnv;
pub use global_state::GlobalState;
pub use response::{ApiResponse, AppError};
pub use routes::{misc_routes, package_routes, team_routes, user_routes};
pub use utils::setup_tracing;
