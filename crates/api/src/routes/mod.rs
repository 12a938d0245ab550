mod misc;
mod packages;
mod team;
mod user;

pub use misc::misc_routes;
pub use packages::package_routes;
pub use team::team_routes;
pub use user::user_routes;
