use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{Result, StoreError};
use super::partitions::{DocKey, KV_PARTITION};
use crate::model::{Profile, SettingsOverride, Source};

/// Every document at once, as exported by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriptions: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<Profile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsOverride>,
}

#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    kv: PartitionHandle,
}

impl FjallStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let kv = keyspace.open_partition(KV_PARTITION, PartitionCreateOptions::default())?;

        Ok(Self { keyspace, kv })
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: DocKey) -> Result<Option<T>> {
        match self.kv.get(key.encode())? {
            Some(value) => {
                let doc = serde_json::from_slice(&value).map_err(|source| {
                    StoreError::Serialization { key: key.as_str(), source }
                })?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    pub fn put_json<T: Serialize>(&self, key: DocKey, doc: &T) -> Result<()> {
        let value = serde_json::to_vec(doc)
            .map_err(|source| StoreError::Serialization { key: key.as_str(), source })?;
        self.kv.insert(key.encode(), value)?;
        debug!(key = key.as_str(), "Document written");
        Ok(())
    }

    pub fn load_sources(&self) -> Result<Vec<Source>> {
        Ok(self.get_json(DocKey::Subscriptions)?.unwrap_or_default())
    }

    pub fn save_sources(&self, sources: &[Source]) -> Result<()> {
        self.put_json(DocKey::Subscriptions, &sources)
    }

    pub fn load_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.get_json(DocKey::Profiles)?.unwrap_or_default())
    }

    pub fn save_profiles(&self, profiles: &[Profile]) -> Result<()> {
        self.put_json(DocKey::Profiles, &profiles)
    }

    pub fn load_settings(&self) -> Result<SettingsOverride> {
        Ok(self.get_json(DocKey::Settings)?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &SettingsOverride) -> Result<()> {
        self.put_json(DocKey::Settings, settings)
    }

    /// Write every document present in `export`. Returns the keys written.
    pub fn import(&self, export: &StoreExport) -> Result<Vec<DocKey>> {
        let mut written = Vec::new();
        if let Some(sources) = &export.subscriptions {
            self.save_sources(sources)?;
            written.push(DocKey::Subscriptions);
        }
        if let Some(profiles) = &export.profiles {
            self.save_profiles(profiles)?;
            written.push(DocKey::Profiles);
        }
        if let Some(settings) = &export.settings {
            self.save_settings(settings)?;
            written.push(DocKey::Settings);
        }
        self.persist()?;
        Ok(written)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
