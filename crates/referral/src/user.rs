use mongodb::bson::{doc, Document};
use mongodb::Database;
use serde::{Deserialize, Serialize};

use sbal_common::get_current_timestamp;
use sbal_database::{DbError, MongoDbObject};

/// `sponsorId` value marking a user with no sponsor. The very first
/// registered user (the admin) carries it and owns `userId` 0.
pub const ROOT_SPONSOR_ID: i64 = 0;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Package already recorded for this transaction")]
    DuplicatePackage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedPackage {
    pub package_id: i64,
    pub package_name: String,
    pub price: String,
    pub transaction_hash: String,
    pub purchase_date: i64,
}

/// One record of the referral forest. `sponsor_id`/`sponsor_wallet` are set
/// once at registration and never re-validated afterwards; sponsor identity
/// is permanent in this model.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub sponsor_id: i64,
    pub sponsor_wallet: String,
    pub wallet_address: String,
    #[serde(default)]
    pub purchased_packages: Vec<PurchasedPackage>,
    pub created_at: i64,
}

impl MongoDbObject for User {
    const COLLECTION_NAME: &'static str = "users";
    type Error = DbError;

    fn primary_filter(&self) -> Document {
        doc! { "walletAddress": &self.wallet_address }
    }
}

impl User {
    pub fn new(
        user_id: i64,
        username: String,
        sponsor_id: i64,
        sponsor_wallet: String,
        wallet_address: String,
    ) -> Self {
        Self {
            user_id,
            username,
            sponsor_id,
            sponsor_wallet,
            wallet_address,
            purchased_packages: Vec::new(),
            created_at: get_current_timestamp(),
        }
    }

    /// Appends a purchase. `transaction_hash` is the natural dedup key; a
    /// hash already on file is rejected rather than recorded twice.
    pub fn add_purchased_package(
        &mut self,
        package_id: i64,
        package_name: String,
        price: String,
        transaction_hash: String,
    ) -> Result<(), UserError> {
        let already_recorded = self
            .purchased_packages
            .iter()
            .any(|pkg| pkg.transaction_hash == transaction_hash);
        if already_recorded {
            return Err(UserError::DuplicatePackage);
        }

        self.purchased_packages.push(PurchasedPackage {
            package_id,
            package_name,
            price,
            transaction_hash,
            purchase_date: get_current_timestamp(),
        });
        Ok(())
    }

    pub async fn find_by_wallet(db: &Database, wallet_address: &str) -> Result<Option<Self>, DbError> {
        Self::find_one(db, doc! { "walletAddress": wallet_address }).await
    }

    pub async fn find_by_user_id(db: &Database, user_id: i64) -> Result<Option<Self>, DbError> {
        Self::find_one(db, doc! { "userId": user_id }).await
    }

    pub async fn find_by_username(db: &Database, username: &str) -> Result<Option<Self>, DbError> {
        Self::find_one(db, doc! { "username": username }).await
    }

    /// One complete snapshot of the forest, sufficient to build any team
    /// tree without further queries.
    pub async fn list_all(db: &Database) -> Result<Vec<Self>, DbError> {
        Self::find_many_simple(db, doc! {}).await
    }

    /// Next sequential id: current max + 1, or 0 for the very first user.
    /// Two concurrent registrations can read the same max; the unique index
    /// on `userId` makes the loser fail with a duplicate-key error, which
    /// the registration path retries.
    pub async fn next_user_id(db: &Database) -> Result<i64, DbError> {
        let highest = Self::find_one_sorted(db, doc! {}, doc! { "userId": -1 }).await?;
        Ok(highest.map(|user| user.user_id + 1).unwrap_or(0))
    }
}
