//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the scanner.
//!
//! Scanner parameters live in the `storage` namespace as one `u16` entry
//! per field, network settings as string entries beside them.  On ESP32
//! these use the typed `nvs_{get,set}_{u16,str}` calls so the partition
//! stays readable by the web-UI firmware that shares it; the simulation
//! backend keeps little-endian bytes / UTF-8 in a map.
//!
//! - Reads never fail: a missing or unreadable key yields its default
//!   and is logged.
//! - Writes are validated first and rejected, never clamped.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{NetworkSettings, ScannerConfig, fixed, validate_config};
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Namespace shared by the scanner parameters and network settings.
pub const NAMESPACE: &str = "storage";

/// Longest string setting we read back (WPA2 passphrase limit).
const MAX_STR_LEN: usize = 64;

// ───────────────────────────────────────────────────────────────
// Key table
// ───────────────────────────────────────────────────────────────

/// One persisted scanner parameter: NVS key plus field accessors.
struct ConfigField {
    key: &'static str,
    get: fn(&ScannerConfig) -> u16,
    set: fn(&mut ScannerConfig, u16),
}

const CONFIG_FIELDS: [ConfigField; 10] = [
    ConfigField { key: "ZM", get: |c| c.z_axis_max, set: |c, v| c.z_axis_max = v },
    ConfigField { key: "ZSS", get: |c| c.z_axis_start_step, set: |c, v| c.z_axis_start_step = v },
    ConfigField { key: "ZDT", get: |c| c.z_axis_delay_time, set: |c, v| c.z_axis_delay_time = v },
    ConfigField {
        key: "ZOTS",
        get: |c| c.z_axis_one_time_step,
        set: |c, v| c.z_axis_one_time_step = v,
    },
    ConfigField { key: "2M", get: |c| c.x_y_axis_max, set: |c, v| c.x_y_axis_max = v },
    ConfigField {
        key: "2CT",
        get: |c| c.x_y_axis_check_times,
        set: |c, v| c.x_y_axis_check_times = v,
    },
    ConfigField {
        key: "2STD",
        get: |c| c.x_y_axis_step_delay_time,
        set: |c, v| c.x_y_axis_step_delay_time = v,
    },
    ConfigField {
        key: "2OTS",
        get: |c| c.x_y_axis_one_time_step,
        set: |c, v| c.x_y_axis_one_time_step = v,
    },
    ConfigField { key: "R_C", get: |c| c.vl53l1x_center, set: |c, v| c.vl53l1x_center = v },
    ConfigField {
        key: "R_TB",
        get: |c| c.vl53l1x_timing_budget,
        set: |c, v| c.vl53l1x_timing_budget = v,
    },
];

/// String settings persisted beside the scanner parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKey {
    StaSsid,
    StaPassword,
    ApSsid,
    ApPassword,
    MdnsHostname,
    ReleaseOwner,
    ReleaseRepo,
}

impl NetworkKey {
    pub const ALL: [Self; 7] = [
        Self::StaSsid,
        Self::StaPassword,
        Self::ApSsid,
        Self::ApPassword,
        Self::MdnsHostname,
        Self::ReleaseOwner,
        Self::ReleaseRepo,
    ];

    pub fn nvs_key(self) -> &'static str {
        match self {
            Self::StaSsid => "SS",
            Self::StaPassword => "SP",
            Self::ApSsid => "AS",
            Self::ApPassword => "AP",
            Self::MdnsHostname => "M",
            Self::ReleaseOwner => "GU",
            Self::ReleaseRepo => "GR",
        }
    }

    fn apply(self, s: &mut NetworkSettings, value: &str) {
        match self {
            Self::StaSsid => s.sta_ssid = fixed(value),
            Self::StaPassword => s.sta_password = fixed(value),
            Self::ApSsid => s.ap_ssid = fixed(value),
            Self::ApPassword => s.ap_password = fixed(value),
            Self::MdnsHostname => s.mdns_hostname = fixed(value),
            Self::ReleaseOwner => s.release_owner = fixed(value),
            Self::ReleaseRepo => s.release_repo = fixed(value),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably.  On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    // ── Network settings ──────────────────────────────────────

    /// All network settings, each falling back to its default.
    pub fn network_settings(&self) -> NetworkSettings {
        let mut out = NetworkSettings::default();
        for key in NetworkKey::ALL {
            match self.get_str(key.nvs_key()) {
                Ok(v) => key.apply(&mut out, &v),
                Err(StorageError::NotFound) => {
                    info!("NvsAdapter: {} not set, using default", key.nvs_key());
                }
                Err(e) => warn!("NvsAdapter: {} unreadable ({}), using default", key.nvs_key(), e),
            }
        }
        out
    }

    /// Persist one network setting.  Empty values are rejected.
    pub fn set_network_setting(&mut self, key: NetworkKey, value: &str) -> Result<(), ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::ValidationFailed("network setting must not be empty"));
        }
        if value.len() > MAX_STR_LEN {
            return Err(ConfigError::ValidationFailed("network setting longer than 64 bytes"));
        }
        if value.bytes().any(|b| b.is_ascii_control()) {
            return Err(ConfigError::ValidationFailed(
                "network setting contains control characters",
            ));
        }
        self.set_str(key.nvs_key(), value)?;
        info!("NvsAdapter: {} updated", key.nvs_key());
        Ok(())
    }

    // ── Typed entries (simulation) ────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn get_u16(&self, key: &str) -> Result<u16, StorageError> {
        let mut buf = [0u8; 2];
        match self.read(NAMESPACE, key, &mut buf)? {
            2 => Ok(u16::from_le_bytes(buf)),
            _ => Err(StorageError::IoError),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_u16(&mut self, key: &str, value: u16) -> Result<(), StorageError> {
        self.write(NAMESPACE, key, &value.to_le_bytes())
    }

    #[cfg(not(target_os = "espidf"))]
    fn get_str(&self, key: &str) -> Result<String, StorageError> {
        let mut buf = [0u8; MAX_STR_LEN];
        let n = self.read(NAMESPACE, key, &mut buf)?;
        core::str::from_utf8(&buf[..n])
            .map(str::to_owned)
            .map_err(|_| StorageError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write(NAMESPACE, key, value.as_bytes())
    }

    // ── Typed entries (ESP-IDF) ───────────────────────────────

    #[cfg(target_os = "espidf")]
    fn get_u16(&self, key: &str) -> Result<u16, StorageError> {
        let k = c_key(key);
        Self::with_nvs_handle(NAMESPACE, false, |handle| {
            let mut value: u16 = 0;
            let ret = unsafe { nvs_get_u16(handle, k.as_ptr() as *const _, &mut value) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(value)
        })
        .map_err(nvs_error)
    }

    #[cfg(target_os = "espidf")]
    fn set_u16(&mut self, key: &str, value: u16) -> Result<(), StorageError> {
        let k = c_key(key);
        Self::with_nvs_handle(NAMESPACE, true, |handle| {
            let ret = unsafe { nvs_set_u16(handle, k.as_ptr() as *const _, value) };
            if ret != ESP_OK {
                return Err(ret);
            }
            commit(handle)
        })
        .map_err(nvs_error)
    }

    #[cfg(target_os = "espidf")]
    fn get_str(&self, key: &str) -> Result<String, StorageError> {
        let k = c_key(key);
        let mut buf = [0u8; MAX_STR_LEN + 1];
        let len = Self::with_nvs_handle(NAMESPACE, false, |handle| {
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_str(handle, k.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        })
        .map_err(nvs_error)?;
        // `size` includes the NUL terminator.
        let text = &buf[..len.saturating_sub(1)];
        core::str::from_utf8(text)
            .map(str::to_owned)
            .map_err(|_| StorageError::IoError)
    }

    #[cfg(target_os = "espidf")]
    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let k = c_key(key);
        let mut v = [0u8; MAX_STR_LEN + 1];
        let n = value.len().min(MAX_STR_LEN);
        v[..n].copy_from_slice(&value.as_bytes()[..n]);
        Self::with_nvs_handle(NAMESPACE, true, |handle| {
            let ret = unsafe { nvs_set_str(handle, k.as_ptr() as *const _, v.as_ptr() as *const _) };
            if ret != ESP_OK {
                return Err(ret);
            }
            commit(handle)
        })
        .map_err(nvs_error)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = c_key(namespace);
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

/// NUL-terminated copy of an NVS key or namespace (15 chars max).
#[cfg(target_os = "espidf")]
fn c_key(key: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let kb = key.as_bytes();
    let len = kb.len().min(15);
    buf[..len].copy_from_slice(&kb[..len]);
    buf
}

#[cfg(target_os = "espidf")]
fn commit(handle: nvs_handle_t) -> Result<(), i32> {
    let ret = unsafe { nvs_commit(handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
fn nvs_error(code: i32) -> StorageError {
    if code == ESP_ERR_NVS_NOT_FOUND {
        StorageError::NotFound
    } else if code == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
        StorageError::Full
    } else {
        StorageError::IoError
    }
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> ScannerConfig {
        let mut cfg = ScannerConfig::default();
        let defaults = cfg.clone();
        for field in &CONFIG_FIELDS {
            match self.get_u16(field.key) {
                Ok(v) => (field.set)(&mut cfg, v),
                Err(StorageError::NotFound) => {
                    info!(
                        "NvsAdapter: {} not set, using {}",
                        field.key,
                        (field.get)(&defaults)
                    );
                }
                Err(e) => {
                    warn!(
                        "NvsAdapter: {} unreadable ({}), using {}",
                        field.key,
                        e,
                        (field.get)(&defaults)
                    );
                }
            }
        }
        if let Err(e) = validate_config(&cfg) {
            warn!("NvsAdapter: stored config invalid ({}), using defaults", e);
            return defaults;
        }
        cfg
    }

    fn save(&mut self, config: &ScannerConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        for field in &CONFIG_FIELDS {
            self.set_u16(field.key, (field.get)(config))?;
        }
        info!("NvsAdapter: {} config keys saved", CONFIG_FIELDS.len());
        Ok(())
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
            match self.store.get(&composite) {
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
            let k = c_key(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, k.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            })
            .map_err(nvs_error)
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_key(key);
            Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, k.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                commit(handle)
            })
            .map_err(nvs_error)
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_key(key);
            Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, k.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                commit(handle)
            })
            .map_err(nvs_error)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let k = c_key(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe { nvs_find_key(handle, k.as_ptr() as *const _, core::ptr::null_mut()) };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}
