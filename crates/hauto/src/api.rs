//! Pluggable APIs and their registry

use dashmap::DashMap;
use hauto_core::{HautoError, HautoResult};
use std::any::Any;
use std::sync::Arc;
use tracing::info;

use crate::hautomate::Hautomate;

/// A subsystem living inside the core
///
/// APIs are registered by name and attached while the core handles `INIT`,
/// which is where they subscribe their listeners.
pub trait Api: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Subscribe listeners on the core's bus
    fn attach(&self, core: &Arc<Hautomate>) -> HautoResult<()>;
}

struct Registered {
    api: Arc<dyn Api>,
    any: Arc<dyn Any + Send + Sync>,
}

/// APIs known to a [`Hautomate`], by name
#[derive(Default)]
pub struct ApiRegistry {
    apis: DashMap<String, Registered>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an API; names are unique
    pub fn register<A: Api>(&self, api: Arc<A>) -> HautoResult<()> {
        let name = api.name().to_string();
        match self.apis.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(HautoError::config(format!(
                "api '{}' is already registered",
                entry.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let any: Arc<dyn Any + Send + Sync> = api.clone();
                entry.insert(Registered { api, any });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> HautoResult<Arc<dyn Api>> {
        self.apis
            .get(name)
            .map(|registered| registered.api.clone())
            .ok_or_else(|| HautoError::not_found("api", name))
    }

    /// Look up an API by name as its concrete type
    pub fn get_as<A: Api>(&self, name: &str) -> HautoResult<Arc<A>> {
        let any = self
            .apis
            .get(name)
            .map(|registered| registered.any.clone())
            .ok_or_else(|| HautoError::not_found("api", name))?;

        any.downcast::<A>().map_err(|_| {
            HautoError::config(format!(
                "api '{name}' is not a {}",
                std::any::type_name::<A>()
            ))
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.apis.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    pub(crate) fn attach_all(&self, core: &Arc<Hautomate>) -> HautoResult<()> {
        let apis: Vec<Arc<dyn Api>> = self.apis.iter().map(|entry| entry.api.clone()).collect();
        for api in apis {
            info!(api = api.name(), "Setting up api");
            api.attach(core)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("apis", &self.names())
            .finish()
    }
}
