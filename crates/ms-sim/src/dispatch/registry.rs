//! Compile-time table of the dispatchers operators can select.

use std::collections::BTreeMap;

use crate::dispatch::{Dispatcher, NearestVehicle, PalZhang};
use crate::operator::OperationParameters;
use crate::{SimError, SimResult};

/// Builds a dispatcher from the operator parameters.
pub type DispatcherFactory = fn(&OperationParameters) -> SimResult<Box<dyn Dispatcher>>;

#[derive(Copy, Clone)]
pub struct DispatcherEntry {
    pub title:    &'static str,
    pub online:   Option<DispatcherFactory>,
    pub punctual: Option<DispatcherFactory>,
}

/// `{key: factories}` table, built once before the run.
#[derive(Clone)]
pub struct DispatcherRegistry {
    entries: BTreeMap<String, DispatcherEntry>,
}

impl Default for DispatcherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DispatcherRegistry {
    pub fn empty() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Registry holding the dispatchers shipped with the crate.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            NearestVehicle::KEY.to_owned(),
            DispatcherEntry {
                title:    "Nearest available vehicle",
                online:   Some(NearestVehicle::factory),
                punctual: None,
            },
        );
        entries.insert(
            PalZhang::KEY.to_owned(),
            DispatcherEntry {
                title:    "Greedy station repositioning",
                online:   None,
                punctual: Some(PalZhang::factory),
            },
        );
        Self { entries }
    }

    pub fn register(&mut self, key: impl Into<String>, entry: DispatcherEntry) -> SimResult<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(SimError::config(format!("dispatcher '{key}' is already registered")));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &str) -> SimResult<&DispatcherEntry> {
        self.entries.get(key).ok_or_else(|| {
            let known: Vec<&str> = self.keys().collect();
            SimError::config(format!("unknown dispatcher '{key}' (known: {})", known.join(", ")))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(online, punctual)` dispatchers for an operator.  No key gives
    /// neither.
    #[allow(clippy::type_complexity)]
    pub fn instantiate(
        &self,
        params: &OperationParameters,
    ) -> SimResult<(Option<Box<dyn Dispatcher>>, Option<Box<dyn Dispatcher>>)> {
        let Some(key) = params.dispatcher.as_deref() else {
            return Ok((None, None));
        };
        let entry = self.get(key)?;
        let online = entry.online.map(|f| f(params)).transpose()?;
        let punctual = entry.punctual.map(|f| f(params)).transpose()?;
        Ok((online, punctual))
    }
}
