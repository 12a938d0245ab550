use mongodb::bson::{self, Document};
use mongodb::error::Error as MongoDbError;
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::Database;

use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("mongodb error: {0}")]
    Mongo(#[from] MongoDbError),
    #[error("bson serialize error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("bson deserialize error: {0}")]
    BsonDe(#[from] bson::de::Error),
}

#[allow(async_fn_in_trait)]
pub trait MongoDbObject:
    Sized + Serialize + DeserializeOwned + Sync + Unpin + Send + Clone
{
    const COLLECTION_NAME: &'static str;
    type Error: From<MongoDbError> + From<bson::ser::Error> + From<bson::de::Error>;

    /// Filter selecting this record's unique key, used by `update` and `delete`.
    fn primary_filter(&self) -> Document;

    async fn insert_many(db: &Database, objs: Vec<Self>) -> Result<(), Self::Error> {
        let col = db.collection::<Self>(Self::COLLECTION_NAME);
        col.insert_many(objs, None).await?;
        Ok(())
    }

    async fn insert(self, db: &Database) -> Result<(), Self::Error> {
        Self::insert_many(db, vec![self]).await
    }

    async fn update(&self, db: &Database) -> Result<(), Self::Error> {
        let col = db.collection(Self::COLLECTION_NAME);
        col.replace_one(
            self.primary_filter(),
            bson::to_document(&self).map_err(Self::Error::from)?,
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete(self, db: &Database) -> Result<(), Self::Error> {
        let col = db.collection::<Document>(Self::COLLECTION_NAME);
        let _ = col.delete_one(self.primary_filter(), None).await?;
        Ok(())
    }

    async fn find_one(db: &Database, filter: Document) -> Result<Option<Self>, Self::Error> {
        let col = db.collection::<Document>(Self::COLLECTION_NAME);
        let doc = col.find_one(filter, None).await?;
        match doc {
            Some(d) => Ok(Some(bson::from_document(d).map_err(Self::Error::from)?)),
            None => Ok(None),
        }
    }

    async fn find_one_sorted(
        db: &Database,
        filter: Document,
        sort: Document,
    ) -> Result<Option<Self>, Self::Error> {
        let col = db.collection::<Document>(Self::COLLECTION_NAME);
        let options = FindOneOptions::builder().sort(sort).build();
        let doc = col.find_one(filter, Some(options)).await?;
        match doc {
            Some(d) => Ok(Some(bson::from_document(d).map_err(Self::Error::from)?)),
            None => Ok(None),
        }
    }

    async fn find_many_simple(db: &Database, filter: Document) -> Result<Vec<Self>, Self::Error> {
        Self::find_many(db, filter, None, None, None).await
    }

    async fn find_many(
        db: &Database,
        filter: Document,
        limit: Option<i64>,
        skip: Option<u64>,
        sort: Option<Document>,
    ) -> Result<Vec<Self>, Self::Error> {
        let col = db.collection::<Document>(Self::COLLECTION_NAME);
        let options = FindOptions::builder().limit(limit).skip(skip).sort(sort).build();

        let mut docs = col.find(filter, Some(options)).await?;
        let mut vec = Vec::new();
        while let Some(doc) = docs.next().await {
            vec.push(bson::from_document(doc?).map_err(Self::Error::from)?);
        }
        Ok(vec)
    }

    async fn total_count(db: &Database, filter: Document) -> Result<u64, Self::Error> {
        let col = db.collection::<Document>(Self::COLLECTION_NAME);
        let total_count = col.count_documents(filter, None).await?;
        Ok(total_count)
    }
}
