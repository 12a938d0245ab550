use anyhow::Result;
use mongodb::Database;

use sbal_common::EnvVars;
use sbal_database::{get_db, MongoDbEnv};

#[derive(Clone)]
pub struct GlobalState {
    pub db: Database,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let env = MongoDbEnv::load();
        let db = get_db(&env.mongodb_uri, &env.mongodb_db_name).await?;
        Ok(Self { db })
    }
}
