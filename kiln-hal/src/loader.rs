//! Registry-based HAL selection.
//!
//! Runtimes of this kind traditionally load their HAL from a shared
//! library chosen by an environment variable. Here the moving parts stay in
//! process: implementations register a factory under a device name, and the
//! runtime asks for one by name (or for the configured default) when it
//! creates a device. The version handshake is kept: a factory registered
//! with an API version other than [`HAL_API_VERSION`] is refused at load
//! time rather than at first use.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::mock::MockHal;
use crate::{Hal, HAL_API_VERSION};

/// Environment variable naming the HAL device to load.
pub const DEVICE_ENV_VAR: &str = "KILN_HAL_DEVICE";

/// Device name used when `KILN_HAL_DEVICE` is not set.
pub const DEFAULT_DEVICE: &str = "mock";

/// Creates a fresh HAL instance for one registered device name.
pub type Factory = fn() -> Box<dyn Hal>;

struct Registration {
    api_version: u32,
    factory: Factory,
}

lazy_static! {
    static ref REGISTRY: Mutex<HashMap<String, Registration>> = {
        let mut registry = HashMap::new();
        registry.insert(
            DEFAULT_DEVICE.to_string(),
            Registration {
                api_version: HAL_API_VERSION,
                factory: new_mock_hal as Factory,
            },
        );
        Mutex::new(registry)
    };
}

fn new_mock_hal() -> Box<dyn Hal> {
    Box::new(MockHal::new())
}

/// An error produced while loading a HAL.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no HAL is registered under the device name '{0}'")]
    NotRegistered(String),
    #[error(
        "HAL '{name}' reports API version {reported}, \
        but version {expected} is required"
    )]
    ApiVersionMismatch {
        name: String,
        reported: u32,
        expected: u32,
    },
}

/// Registers a HAL factory under a device name.
///
/// `api_version` is the contract version the factory's HAL implements.
/// Registering a name twice replaces the earlier registration.
pub fn register(name: &str, api_version: u32, factory: Factory) {
    let mut registry = lock_registry();
    registry.insert(
        name.to_string(),
        Registration {
            api_version,
            factory,
        },
    );
}

/// Loads the HAL registered under the given device name.
pub fn load(name: &str) -> Result<Box<dyn Hal>, LoadError> {
    let registry = lock_registry();
    let registration = match registry.get(name) {
        Some(registration) => registration,
        None => {
            log::error!("could not load a HAL for device '{}'", name);
            return Err(LoadError::NotRegistered(name.to_string()));
        }
    };
    if registration.api_version != HAL_API_VERSION {
        log::error!(
            "HAL '{}' was built against API version {} (expected {})",
            name,
            registration.api_version,
            HAL_API_VERSION,
        );
        return Err(LoadError::ApiVersionMismatch {
            name: name.to_string(),
            reported: registration.api_version,
            expected: HAL_API_VERSION,
        });
    }
    Ok((registration.factory)())
}

/// Loads the HAL selected by the environment, falling back to the default
/// device name.
pub fn load_default() -> Result<Box<dyn Hal>, LoadError> {
    match std::env::var(DEVICE_ENV_VAR) {
        Ok(name) => load(&name),
        Err(_) => load(DEFAULT_DEVICE),
    }
}

fn lock_registry() -> std::sync::MutexGuard<'static, HashMap<String, Registration>> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stale_hal() -> Box<dyn Hal> {
        Box::new(MockHal::new())
    }

    #[test]
    fn default_device_loads() {
        let hal = load(DEFAULT_DEVICE).unwrap();
        assert!(hal.info().num_devices > 0);
    }

    #[test]
    fn unknown_device_is_refused() {
        assert!(matches!(
            load("no-such-device"),
            Err(LoadError::NotRegistered(_))
        ));
    }

    #[test]
    fn version_mismatch_is_refused() {
        register("stale", HAL_API_VERSION + 1, stale_hal as Factory);
        assert!(matches!(
            load("stale"),
            Err(LoadError::ApiVersionMismatch {
                reported,
                expected,
                ..
            }) if reported == HAL_API_VERSION + 1 && expected == HAL_API_VERSION
        ));
    }
}
