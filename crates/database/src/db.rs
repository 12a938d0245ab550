use anyhow::Result;
use mongodb::error::{Error as MongoDbError, ErrorKind, WriteFailure};
use mongodb::{Client, Database};

pub async fn get_db(uri: &str, db_name: &str) -> Result<Database> {
    let client = Client::with_uri_str(uri).await?;
    Ok(client.database(db_name))
}

/// Server-side code 11000: an insert collided with a unique index. Callers
/// that assign sequential ids use this to detect a lost race and retry.
pub fn is_duplicate_key_error(err: &MongoDbError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}
