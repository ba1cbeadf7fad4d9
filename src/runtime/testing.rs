//! Inert runtime for unit tests.

use std::sync::Mutex;

use crate::error::RuntimeError;
use crate::runtime::{Callback, Endpoint, Runtime, Settings};

#[derive(Default)]
pub(crate) struct NullRuntime {
    titles: Mutex<Vec<String>>,
    settings: Mutex<Settings>,
    refuse_titles: bool,
}

impl NullRuntime {
    pub(crate) fn refusing_titles() -> Self {
        Self {
            refuse_titles: true,
            ..Self::default()
        }
    }

    pub(crate) fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl Runtime for NullRuntime {
    fn create(_endpoint: &Endpoint) -> Result<Self, RuntimeError> {
        Ok(Self::default())
    }

    fn on(&self, _event: &str, _callback: Callback) {}

    fn set(&self, settings: Settings) -> Result<(), RuntimeError> {
        self.settings.lock().unwrap().apply(settings);
        Ok(())
    }

    fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    fn start(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn set_process_name(&self, name: &str) -> Result<(), RuntimeError> {
        if self.refuse_titles {
            return Err(RuntimeError::ProcessName("refused".into()));
        }
        self.titles.lock().unwrap().push(name.to_string());
        Ok(())
    }
}
