use crate::config::DeviceConfig;
use crate::error::{ErrorKind, RtcError, RtcResult};
use log::{info, warn};
use once_cell::sync::OnceCell;
use simple_error::{bail, SimpleResult};
use std::cell::Cell;
use std::sync::{PoisonError, RwLock};

/// Host callback that receives every error reported through the API.
pub type ErrorFunc = Box<dyn Fn(ErrorKind, &str) + Send + Sync>;

thread_local! {
    // First error on this thread since the last call to `take_error`.
    static THREAD_ERROR: Cell<Option<ErrorKind>> = Cell::new(None);
}

/// Process wide state shared by all scenes: the configuration and the error sink.
pub struct Device {
    config: OnceCell<DeviceConfig>,
    error_func: RwLock<Option<ErrorFunc>>,
}

impl Device {
    pub const fn new() -> Self {
        Device {
            config: OnceCell::new(),
            error_func: RwLock::new(None),
        }
    }

    /// Configures the device from an option string like `"verbose=1"`. Can only
    /// happen once.
    pub fn init(&self, options: &str) -> SimpleResult<()> {
        let config = DeviceConfig::parse(options)?;
        info!("initializing device with {:?}", config);
        if self.config.set(config).is_err() {
            bail!("device was already initialized");
        }
        Ok(())
    }

    /// The current configuration, or the default if the device was not initialized
    /// yet. Reading it never prevents a later `init`.
    pub fn config(&self) -> DeviceConfig {
        self.config.get().cloned().unwrap_or_default()
    }

    pub(crate) fn verbose(&self) -> u32 {
        self.config.get().map_or(0, |c| c.verbose)
    }

    /// Installs (or removes, with `None`) the host error callback.
    pub fn set_error_function(&self, func: Option<ErrorFunc>) {
        let mut error_func = self
            .error_func
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *error_func = func;
    }

    /// Returns and clears the error code of the calling thread.
    pub fn take_error(&self) -> Option<ErrorKind> {
        THREAD_ERROR.with(|e| e.take())
    }

    /// Records an error raised by an API call and forwards it to the host callback.
    pub fn process_error(&self, err: &RtcError) {
        warn!("{}", err);

        THREAD_ERROR.with(|e| {
            if e.get().is_none() {
                e.set(Some(err.kind));
            }
        });

        let error_func = self
            .error_func
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(func) = error_func.as_ref() {
            func(err.kind, err.msg);
        }
    }
}

pub static DEVICE: Device = Device::new();

/// Passes `result` through, reporting the error to the device on the way.
pub(crate) fn report<T>(result: RtcResult<T>) -> RtcResult<T> {
    if let Err(err) = &result {
        DEVICE.process_error(err);
    }
    result
}
