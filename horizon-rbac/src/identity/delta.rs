//! DeltaIdentityStore: identities persisted in the `identities` Delta table

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use deltalake::arrow::array::{ArrayRef, RecordBatch, StringArray};
use tracing::info;
use uuid::Uuid;

use crate::error::{PortalError, Result};
use crate::role::Role;
use crate::schema::{self, sql_quote};
use crate::store::{opt_str_col, rows, str_col, DeltaStore};

use super::password;
use super::store::IdentityStore;
use super::types::{IdentityRecord, NewIdentity};

/// Identity store on top of a shared [`DeltaStore`]
pub struct DeltaIdentityStore {
    store: Arc<DeltaStore>,
}

impl DeltaIdentityStore {
    pub fn new(store: Arc<DeltaStore>) -> Self {
        Self { store }
    }

    fn min_password_len(&self) -> usize {
        self.store.config().min_password_len
    }

    fn batch_for(record: &IdentityRecord, password_hash: &str) -> Result<RecordBatch> {
        let batch = RecordBatch::try_new(
            Arc::new(schema::identities_arrow_schema()),
            vec![
                Arc::new(StringArray::from(vec![record.uid.as_str()])) as ArrayRef,
                Arc::new(StringArray::from(vec![record.email.as_str()])),
                Arc::new(StringArray::from(vec![password_hash])),
                Arc::new(StringArray::from(vec![record.display_name.as_str()])),
                Arc::new(StringArray::from(vec![record.role_claim.map(|r| r.as_str())])),
                Arc::new(StringArray::from(vec![record.created_at.as_str()])),
            ],
        )?;
        Ok(batch)
    }

    fn extract(batch: &RecordBatch, i: usize) -> Result<(IdentityRecord, String)> {
        let role_claim = match opt_str_col(batch, "role_claim", i) {
            Some(raw) => Some(raw.parse::<Role>().map_err(|_| {
                PortalError::Serialization(format!("Invalid role claim '{raw}'"))
            })?),
            None => None,
        };
        let record = IdentityRecord {
            uid: str_col(batch, "uid", i)?,
            email: str_col(batch, "email", i)?,
            display_name: str_col(batch, "display_name", i)?,
            role_claim,
            created_at: str_col(batch, "created_at", i)?,
        };
        Ok((record, str_col(batch, "password_hash", i)?))
    }

    async fn find(&self, predicate: &str) -> Result<Option<(IdentityRecord, String)>> {
        let batches = self.store.query(schema::TABLE_IDENTITIES, predicate).await?;
        let found = rows(&batches)
            .next()
            .map(|(b, i)| Self::extract(b, i))
            .transpose();
        found
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<(IdentityRecord, String)>> {
        self.find(&Self::uid_predicate(uid)).await
    }

    fn uid_predicate(uid: &str) -> String {
        format!("uid = {}", sql_quote(uid))
    }
}

#[async_trait]
impl IdentityStore for DeltaIdentityStore {
    async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord> {
        password::check_strength(&new.password, self.min_password_len())?;
        let email = new.email.trim().to_lowercase();

        let _writer = self.store.writer().await;
        if self
            .find(&format!("email = {}", sql_quote(&email)))
            .await?
            .is_some()
        {
            return Err(PortalError::EmailAlreadyExists(email));
        }

        let password_hash = password::hash(&new.password)?;
        let record = IdentityRecord {
            uid: Uuid::new_v4().simple().to_string(),
            email,
            display_name: new.display_name,
            role_claim: None,
            created_at: Utc::now().to_rfc3339(),
        };

        self.store
            .append(schema::TABLE_IDENTITIES, Self::batch_for(&record, &password_hash)?)
            .await?;
        info!(uid = %record.uid, "Identity created");
        Ok(record)
    }

    async fn set_role_claim(&self, uid: &str, role: Role) -> Result<()> {
        let _writer = self.store.writer().await;
        if self.find_by_uid(uid).await?.is_none() {
            return Err(PortalError::UserNotFound(uid.to_string()));
        }

        self.store
            .update(
                schema::TABLE_IDENTITIES,
                &Self::uid_predicate(uid),
                &[("role_claim", sql_quote(role.as_str()))],
            )
            .await?;
        info!(uid, role = %role, "Role claim set");
        Ok(())
    }

    async fn get_identity(&self, uid: &str) -> Result<Option<IdentityRecord>> {
        Ok(self.find_by_uid(uid).await?.map(|(record, _)| record))
    }

    async fn list_identities(&self, max_results: usize) -> Result<Vec<IdentityRecord>> {
        let batches = self
            .store
            .sql(
                schema::TABLE_IDENTITIES,
                &format!("SELECT * FROM t ORDER BY created_at, uid LIMIT {max_results}"),
            )
            .await?;
        rows(&batches)
            .map(|(b, i)| Self::extract(b, i).map(|(record, _)| record))
            .collect()
    }

    async fn delete_identity(&self, uid: &str) -> Result<()> {
        let _writer = self.store.writer().await;
        if self.find_by_uid(uid).await?.is_none() {
            return Err(PortalError::UserNotFound(uid.to_string()));
        }
        self.store
            .delete(schema::TABLE_IDENTITIES, &Self::uid_predicate(uid))
            .await?;
        info!(uid, "Identity deleted");
        Ok(())
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<IdentityRecord> {
        let email = email.trim().to_lowercase();
        let (record, hash) = self
            .find(&format!("email = {}", sql_quote(&email)))
            .await?
            .ok_or(PortalError::InvalidCredentials)?;
        password::verify(password, &hash)?;
        Ok(record)
    }
}
