//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`], [`StoragePort`], [`RecipeStore`] and
//! [`OptionStore`] for the controller.
//!
//! | Namespace   | Key          | Value                              |
//! |-------------|--------------|------------------------------------|
//! | `estove`    | `syscfg`     | postcard [`SystemConfig`]          |
//! | `recipes`   | `bakes`      | postcard list of named curves      |
//! | `options`   | option name  | little-endian `i32`                |
//!
//! The bake list is held in memory; list edits only reach flash on
//! [`RecipeStore::store_bake_list`].  Uploaded recipe files are JSON:
//!
//! ```json
//! [{ "name": "Bisque", "steps": [{ "temperature": 600, "duration": 3600 }] }]
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{
    ConfigError, ConfigPort, OptionKey, OptionStore, RecipeStore, StorageError, StoragePort,
};
use crate::config::SystemConfig;
use crate::recipe::RawStep;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "estove";
const CONFIG_KEY: &str = "syscfg";
const RECIPE_NAMESPACE: &str = "recipes";
const RECIPE_KEY: &str = "bakes";
const OPTION_NAMESPACE: &str = "options";

/// Largest blob read back from flash.
const MAX_BLOB_SIZE: usize = 4000;
/// Most curves the list holds.
pub const MAX_BAKES: usize = 64;

/// One named curve as persisted and as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBake {
    pub name: String,
    pub steps: Vec<RawStep>,
}

pub struct NvsAdapter {
    bakes: Vec<StoredBake>,
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash and load the stored bake list.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.  A missing or corrupt list starts empty.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other
            // NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK
                {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        let mut nvs = Self {
            bakes: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        };
        nvs.reload_bake_list();
        Ok(nvs)
    }

    /// Replace the in-memory list with what is on flash.
    pub fn reload_bake_list(&mut self) {
        self.bakes = match self.read_blob(RECIPE_NAMESPACE, RECIPE_KEY) {
            Ok(bytes) => postcard::from_bytes(&bytes).unwrap_or_else(|_| {
                warn!("NvsAdapter: stored bake list corrupted, starting empty");
                Vec::new()
            }),
            Err(StorageError::NotFound) => Vec::new(),
            Err(e) => {
                warn!("NvsAdapter: bake list unreadable ({e})");
                Vec::new()
            }
        };
        info!("NvsAdapter: {} bake curves", self.bakes.len());
    }

    /// Direct access to the in-memory list.
    pub fn bakes(&self) -> &[StoredBake] {
        &self.bakes
    }

    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        let len = self.read(namespace, key, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name, truncated to 15 bytes.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            bakes: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({e}), using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(CONFIG_KEY);
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            });
            result.map_err(|e| {
                warn!("NvsAdapter: NVS write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    ConfigError::StorageFull
                } else {
                    ConfigError::IoError
                }
            })
        }
    }
}

// ───────────────────────────────────────────────────────────────
// StoragePort
// ───────────────────────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                match unsafe { nvs_commit(handle) } {
                    ESP_OK => Ok(()),
                    e => Err(e),
                }
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// RecipeStore
// ───────────────────────────────────────────────────────────────

impl RecipeStore for NvsAdapter {
    fn bake_count(&self) -> usize {
        self.bakes.len()
    }

    fn bake_step_count(&self, curve: usize) -> usize {
        self.bakes.get(curve).map_or(0, |b| b.steps.len())
    }

    fn bake_step_temp(&self, curve: usize, step: usize) -> u16 {
        self.bake_step(curve, step).temperature
    }

    fn bake_step_time(&self, curve: usize, step: usize) -> i32 {
        self.bake_step(curve, step).duration
    }

    fn bake_step(&self, curve: usize, step: usize) -> RawStep {
        self.bakes
            .get(curve)
            .and_then(|b| b.steps.get(step))
            .copied()
            .unwrap_or(RawStep::END)
    }

    fn bake_name(&self, curve: usize) -> Option<String> {
        self.bakes.get(curve).map(|b| b.name.clone())
    }

    fn bake_names(&self) -> Vec<String> {
        self.bakes.iter().map(|b| b.name.clone()).collect()
    }

    fn remove_bakes(&mut self, indices: &[usize]) -> Result<(), StorageError> {
        if indices.iter().any(|&i| i >= self.bakes.len()) {
            return Err(StorageError::NotFound);
        }
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for i in sorted {
            let removed = self.bakes.remove(i);
            info!("NvsAdapter: removed bake '{}'", removed.name);
        }
        Ok(())
    }

    fn swap_bakes(&mut self, a: usize, b: usize) -> Result<(), StorageError> {
        if a >= self.bakes.len() || b >= self.bakes.len() {
            return Err(StorageError::NotFound);
        }
        self.bakes.swap(a, b);
        Ok(())
    }

    fn add_bakes_from_file(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let incoming: Vec<StoredBake> = serde_json::from_slice(data).map_err(|e| {
            warn!("NvsAdapter: recipe file rejected: {e}");
            StorageError::Corrupted
        })?;
        if self.bakes.len() + incoming.len() > MAX_BAKES {
            return Err(StorageError::Full);
        }
        let n = incoming.len();
        self.bakes.extend(incoming);
        Ok(n)
    }

    fn store_bake_list(&mut self) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(&self.bakes).map_err(|_| StorageError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.write(RECIPE_NAMESPACE, RECIPE_KEY, &bytes)?;
        info!(
            "NvsAdapter: stored {} bakes ({} bytes)",
            self.bakes.len(),
            bytes.len()
        );
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// OptionStore
// ───────────────────────────────────────────────────────────────

impl OptionStore for NvsAdapter {
    fn get_option(&self, key: OptionKey) -> Option<i32> {
        let mut buf = [0u8; 4];
        match self.read(OPTION_NAMESPACE, key.name(), &mut buf) {
            Ok(4) => Some(i32::from_le_bytes(buf)),
            Ok(_) | Err(_) => None,
        }
    }

    fn set_option(&mut self, key: OptionKey, value: i32) -> Result<(), StorageError> {
        self.write(OPTION_NAMESPACE, key.name(), &value.to_le_bytes())
    }
}
