//! Dog controller: schema migration, sample data and the CRUD operations the
//! routes call

use kennel_core::storage::{Database, ObjectStore, ObjectStoreOf, TransactionOf};
use kennel_core::{Key, Record, RecordStore, StoreResult, VersionChange};
use tracing::{debug, error, info};

use super::model::{record_from_form, rows, Dog, BREED_INDEX, KEY_PATH, NAME_INDEX, STORE};
use crate::config::MigrationPolicy;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DogController<D: Database> {
    store: RecordStore<D>,
}

impl<D: Database> DogController<D> {
    pub fn new(db: D) -> Self {
        Self {
            store: RecordStore::new(db),
        }
    }

    pub fn store(&self) -> &RecordStore<D> {
        &self.store
    }

    /// Migration routine for the `dogs` store.
    ///
    /// Runs inside the version change transaction `txn`. The store is created
    /// (or recreated, under [`MigrationPolicy::Recreate`]) with its two
    /// indexes, then seeded when empty. Under [`MigrationPolicy::Preserve`] an
    /// existing store keeps its records and gains any index it lacks.
    pub async fn upgrade(
        db: D,
        txn: TransactionOf<D>,
        change: VersionChange,
        policy: MigrationPolicy,
    ) -> StoreResult<()> {
        if change.is_initial() {
            info!("creating first version of database");
        } else {
            info!(
                old = change.old_version,
                new = change.new_version,
                %policy,
                "upgrading database"
            );
        }

        let store = RecordStore::new(db);
        let names = store.store_names();
        debug!(?names, "existing stores");
        let exists = names.iter().any(|name| name == STORE);

        match (policy, exists) {
            (MigrationPolicy::Recreate, true) => {
                store.delete_store(STORE)?;
                Self::create_schema(&store)?;
            }
            (_, false) => Self::create_schema(&store)?,
            (MigrationPolicy::Preserve, true) => {
                debug!(store = STORE, "keeping existing store");
                let dogs = store.object_store(&txn, STORE)?;
                Self::ensure_indexes(&store, &dogs)?;
            }
        }

        if let Err(err) = Self::initialize(&store, &txn).await {
            error!(error = %err, "failed to seed dogs");
        }
        Ok(())
    }

    fn create_schema(store: &RecordStore<D>) -> StoreResult<()> {
        let dogs = store.create_store(STORE, KEY_PATH, true)?;
        Self::ensure_indexes(store, &dogs)
    }

    fn ensure_indexes(store: &RecordStore<D>, dogs: &ObjectStoreOf<D>) -> StoreResult<()> {
        for (index, key_path) in [(BREED_INDEX, "breed"), (NAME_INDEX, "name")] {
            if store.ensure_index(dogs, index, key_path, false)? {
                debug!(store = %dogs.name(), index, "created index");
            }
        }
        Ok(())
    }

    /// Seed sample dogs if the store is empty.
    async fn initialize(store: &RecordStore<D>, txn: &TransactionOf<D>) -> StoreResult<()> {
        let count = store.get_record_count(STORE, Some(txn)).await?;
        debug!(count, "dogs before seeding");
        if count > 0 {
            return Ok(());
        }

        store
            .create_record(STORE, Dog::new("Comet", "Whippet").to_record(), Some(txn))
            .await?;
        store
            .create_record(
                STORE,
                Dog::new("Oscar", "German Shorthaired Pointer").to_record(),
                Some(txn),
            )
            .await?;

        let dogs = store.get_all_records(STORE, Some(txn)).await?;
        if let Some(mut comet) = dogs.into_iter().find(|r| r.get_str("name") == Some("Comet")) {
            comet.set("name", "Fireball");
            store.upsert_record(STORE, comet, Some(txn)).await?;
        }

        store
            .upsert_record(STORE, Dog::new("Clarice", "Whippet").to_record(), Some(txn))
            .await?;
        Ok(())
    }

    /// Add a dog from submitted form fields, returning its table row.
    pub async fn add_dog(&self, form: &[(String, String)]) -> Result<String> {
        let mut record: Record = record_from_form(form);
        let key = self.store.create_record(STORE, record.clone(), None).await?;
        debug!(%key, "added dog");
        record.set(KEY_PATH, key.to_value());
        Ok(Dog::from_record(&record).to_row())
    }

    /// Delete a dog, returning rows for the remaining dogs.
    pub async fn delete_dog(&self, id: i64) -> Result<String> {
        self.store
            .delete_record_by_key(STORE, &Key::Number(id), None)
            .await?;
        debug!(id, "deleted dog");
        self.get_dogs().await
    }

    /// Rows for every dog.
    pub async fn get_dogs(&self) -> Result<String> {
        let records = self.store.get_all_records(STORE, None).await?;
        Ok(rows(&records))
    }

    /// Rename every Snoopy to Woodstock, returning rows for all dogs.
    pub async fn update_snoopy(&self) -> Result<String> {
        let updated = self
            .store
            .update_records_by_index(STORE, NAME_INDEX, &Key::from("Snoopy"), "Woodstock", None)
            .await?;
        debug!(updated, "renamed Snoopy to Woodstock");
        self.get_dogs().await
    }
}
