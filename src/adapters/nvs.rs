//! NVS (Non-Volatile Storage) config store.
//!
//! Implements [`ConfigPort`] by keeping the [`PanelConfig`] JSON document as
//! a single blob (`mqttpanel` namespace, `config` key).
//!
//! - **`target_os = "espidf"`**: ESP-IDF NVS, committed atomically per save.
//! - **otherwise**: an in-memory map, for host tests and simulation.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::app::ports::ConfigPort;
use crate::config::PanelConfig;
use crate::error::StoreError;

const CONFIG_NAMESPACE: &str = "mqttpanel";
const CONFIG_KEY: &str = "config";

#[cfg(target_os = "espidf")]
const CONFIG_KEY_CSTR: &[u8] = b"config\0";

/// Upper bound for the stored document.  Three bounded strings plus keys
/// stay well below this.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsConfigStore {
    /// Initialise NVS flash.  A full or outdated partition is erased and
    /// re-initialised.
    pub fn new() -> Result<Self, StoreError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StoreError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StoreError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StoreError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Raw stored bytes (simulation only), for inspecting what was written.
    #[cfg(not(target_os = "espidf"))]
    pub fn raw(&self) -> Option<&[u8]> {
        self.store.get(&Self::composite_key()).map(Vec::as_slice)
    }

    /// Replace the stored bytes (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.store.insert(Self::composite_key(), bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = CONFIG_NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
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

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<Option<PanelConfig>, StoreError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.get(&Self::composite_key()) {
                Some(bytes) => PanelConfig::from_json(bytes).map(Some),
                None => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let mut size: usize = 0;
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        CONFIG_KEY_CSTR.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        CONFIG_KEY_CSTR.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                buf.truncate(size);
                Ok(buf)
            });

            match result {
                Ok(bytes) => {
                    info!("NvsConfigStore: loaded {} bytes", bytes.len());
                    PanelConfig::from_json(&bytes).map(Some)
                }
                // A namespace that was never written cannot be opened read-only.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StoreError::Corrupted),
                Err(e) => {
                    warn!("NvsConfigStore: read error {}", e);
                    Err(StoreError::IoError)
                }
            }
        }
    }

    fn save(&mut self, config: &PanelConfig) -> Result<(), StoreError> {
        let bytes = config.to_json()?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(StoreError::Full);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.insert(Self::composite_key(), bytes);
            info!("NvsConfigStore: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY_CSTR.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StoreError::Full),
                Err(e) => {
                    warn!("NvsConfigStore: write error {}", e);
                    Err(StoreError::IoError)
                }
            }
        }
    }

    fn remove(&mut self) -> Result<(), StoreError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.remove(&Self::composite_key());
            info!("NvsConfigStore: config removed (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, CONFIG_KEY_CSTR.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsConfigStore: config removed");
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsConfigStore: erase error {}", e);
                    Err(StoreError::IoError)
                }
            }
        }
    }
}
