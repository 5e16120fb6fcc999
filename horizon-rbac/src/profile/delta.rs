//! DeltaProfileStore: profiles persisted in the `users` Delta table

use std::sync::Arc;

use async_trait::async_trait;
use deltalake::arrow::array::{ArrayRef, RecordBatch, StringArray};
use tracing::debug;

use crate::error::{PortalError, Result};
use crate::role::Role;
use crate::schema::{self, sql_quote};
use crate::store::{rows, str_col, DeltaStore};

use super::store::{Profile, ProfileStore};

/// Profile store on top of a shared [`DeltaStore`]
pub struct DeltaProfileStore {
    store: Arc<DeltaStore>,
}

impl DeltaProfileStore {
    pub fn new(store: Arc<DeltaStore>) -> Self {
        Self { store }
    }

    fn batch_for(profile: &Profile) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Arc::new(schema::users_arrow_schema()),
            vec![
                Arc::new(StringArray::from(vec![profile.uid.as_str()])) as ArrayRef,
                Arc::new(StringArray::from(vec![profile.email.as_str()])),
                Arc::new(StringArray::from(vec![profile.display_name.as_str()])),
                Arc::new(StringArray::from(vec![profile.role.as_str()])),
            ],
        )?;
        Ok(batch)
    }

    fn extract(batch: &RecordBatch, i: usize) -> Result<Profile> {
        let raw_role = str_col(batch, "role", i)?;
        let role = raw_role
            .parse::<Role>()
            .map_err(|_| PortalError::Serialization(format!("Invalid profile role '{raw_role}'")))?;
        Ok(Profile {
            uid: str_col(batch, "uid", i)?,
            email: str_col(batch, "email", i)?,
            display_name: str_col(batch, "display_name", i)?,
            role,
        })
    }

    fn uid_predicate(uid: &str) -> String {
        format!("uid = {}", sql_quote(uid))
    }
}

#[async_trait]
impl ProfileStore for DeltaProfileStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<Profile>> {
        let batches = self
            .store
            .query(schema::TABLE_USERS, &Self::uid_predicate(uid))
            .await?;
        let found = rows(&batches).next().map(|(b, i)| Self::extract(b, i)).transpose();
        found
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let batches = self.store.scan(schema::TABLE_USERS).await?;
        rows(&batches).map(|(b, i)| Self::extract(b, i)).collect()
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        let _writer = self.store.writer().await;
        if self.get_profile(&profile.uid).await?.is_some() {
            self.store
                .update(
                    schema::TABLE_USERS,
                    &Self::uid_predicate(&profile.uid),
                    &[
                        ("email", sql_quote(&profile.email)),
                        ("display_name", sql_quote(&profile.display_name)),
                        ("role", sql_quote(profile.role.as_str())),
                    ],
                )
                .await?;
        } else {
            self.store
                .append(schema::TABLE_USERS, Self::batch_for(profile)?)
                .await?;
        }
        debug!(uid = %profile.uid, role = %profile.role, "Profile written");
        Ok(())
    }

    async fn update_role(&self, uid: &str, role: Role) -> Result<()> {
        let _writer = self.store.writer().await;
        if self.get_profile(uid).await?.is_none() {
            return Err(PortalError::UserNotFound(uid.to_string()));
        }
        self.store
            .update(
                schema::TABLE_USERS,
                &Self::uid_predicate(uid),
                &[("role", sql_quote(role.as_str()))],
            )
            .await?;
        debug!(uid, role = %role, "Profile role updated");
        Ok(())
    }

    async fn delete_profile(&self, uid: &str) -> Result<()> {
        let _writer = self.store.writer().await;
        // Deletes are only issued against rows that exist
        if self.get_profile(uid).await?.is_none() {
            return Ok(());
        }
        let metrics = self
            .store
            .delete(schema::TABLE_USERS, &Self::uid_predicate(uid))
            .await?;
        debug!(uid, deleted = metrics.num_deleted_rows, "Profile deleted");
        Ok(())
    }
}
