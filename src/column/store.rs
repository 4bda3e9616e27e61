use std::path::{Path, PathBuf};
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::core::types::{DataType, RecordId, Value};
use crate::storage::checkpoint::{Durable, StorageSettings};
use crate::storage::region::ObjectTag;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum ColumnOp {
    Set(RecordId, Option<Value>),
    Truncate,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    data_type: &'a DataType,
    vector: bool,
    values: &'a [Option<Value>],
}

#[derive(Deserialize)]
struct ColumnSnapshot {
    data_type: DataType,
    vector: bool,
    values: Vec<Option<Value>>,
}

/// Values of one data column, addressed by record id. Several column
/// handles opened on the same path share one store.
pub(crate) struct ColumnStore {
    pub(crate) data_type: DataType,
    pub(crate) vector: bool,
    values: RwLock<Vec<Option<Value>>>,
    storage: Mutex<Option<Durable>>,
    path: Option<PathBuf>,
}

impl ColumnStore {
    pub(crate) fn temporary(data_type: DataType, vector: bool) -> Self {
        ColumnStore {
            data_type,
            vector,
            values: RwLock::new(Vec::new()),
            storage: Mutex::new(None),
            path: None,
        }
    }

    pub(crate) fn create(path: &Path, data_type: DataType, vector: bool, settings: StorageSettings) -> Result<Self> {
        let payload = bincode::serialize(&SnapshotRef { data_type: &data_type, vector, values: &[] })?;
        let durable = Durable::create(path, ObjectTag::Column, settings, &payload)?;
        Ok(ColumnStore {
            data_type,
            vector,
            values: RwLock::new(Vec::new()),
            storage: Mutex::new(Some(durable)),
            path: Some(path.to_path_buf()),
        })
    }

    pub(crate) fn open(path: &Path, settings: StorageSettings) -> Result<Self> {
        let (durable, payload, ops) = Durable::open::<ColumnOp>(path, ObjectTag::Column, settings)?;
        let snapshot: ColumnSnapshot = bincode::deserialize(&payload)?;
        let mut values = snapshot.values;
        for op in ops {
            apply(&mut values, op);
        }
        Ok(ColumnStore {
            data_type: snapshot.data_type,
            vector: snapshot.vector,
            values: RwLock::new(values),
            storage: Mutex::new(Some(durable)),
            path: Some(path.to_path_buf()),
        })
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<Value> {
        self.values.read().get(id.index()).cloned().flatten()
    }

    pub(crate) fn set(&self, id: RecordId, value: Option<Value>) -> Result<()> {
        self.commit(ColumnOp::Set(id, value))
    }

    pub(crate) fn truncate(&self) -> Result<()> {
        self.commit(ColumnOp::Truncate)
    }

    fn commit(&self, op: ColumnOp) -> Result<()> {
        let mut values = self.values.write();
        let mut storage = self.storage.lock();
        match storage.as_mut() {
            Some(durable) => {
                let due = durable.log(&op)?;
                apply(&mut values, op);
                if due {
                    durable.checkpoint(&encode(&self.data_type, self.vector, &values)?)?;
                }
            }
            None => apply(&mut values, op),
        }
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let values = self.values.read();
        let mut storage = self.storage.lock();
        if let Some(durable) = storage.as_mut() {
            if durable.pending() > 0 {
                durable.checkpoint(&encode(&self.data_type, self.vector, &values)?)?;
            }
            durable.sync()?;
        }
        Ok(())
    }

    /// Deletes the backing files; the in-memory values stay readable.
    pub(crate) fn remove(&self) -> Result<()> {
        match self.storage.lock().take() {
            Some(durable) => durable.remove(),
            None => Ok(()),
        }
    }

    pub(crate) fn expect_type(&self, data_type: &DataType, vector: bool) -> Result<()> {
        if &self.data_type != data_type || self.vector != vector {
            return Err(Error::type_mismatch(format!(
                "column store holds {}{}, not {}{}",
                self.data_type,
                if self.vector { "[]" } else { "" },
                data_type,
                if vector { "[]" } else { "" },
            )));
        }
        Ok(())
    }
}

fn apply(values: &mut Vec<Option<Value>>, op: ColumnOp) {
    match op {
        ColumnOp::Set(id, value) => {
            let index = id.index();
            if index >= values.len() {
                if value.is_none() {
                    return;
                }
                values.resize(index + 1, None);
            }
            values[index] = value;
        }
        ColumnOp::Truncate => values.clear(),
    }
}

fn encode(data_type: &DataType, vector: bool, values: &[Option<Value>]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&SnapshotRef { data_type, vector, values })?)
}

impl Drop for ColumnStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = ?self.path, error = %e, "failed to flush column");
        }
    }
}
