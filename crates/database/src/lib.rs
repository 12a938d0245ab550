mod db;
mod db_object;
mod env;

pub use db::{get_db, is_duplicate_key_error};
pub use db_object::{DbError, MongoDbObject};
pub use env::MongoDbEnv;
