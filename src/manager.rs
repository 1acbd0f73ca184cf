//! Emulator Manager.
//!
//! Owns the UUID → instance and symbolic-id → UUID mappings. An
//! `IndexMap` backs the primary table (not a plain `HashMap`) because
//! `resolve` must support decimal-index lookup over live insertion order.

use std::sync::Arc;
use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::ModelCatalogue;
use crate::error::{CoreError, CoreResult};
use crate::events::EventBus;
use crate::instance::{Instance, InstanceConfig};

/// Symbolic ids must read like identifiers, not look like a decimal index
/// (which `Selector::parse` would otherwise swallow) or a UUID. Compiled
/// once — `resolve`/`create` run on every request.
static SYMBOLIC_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,31}$").expect("static pattern is valid"));

fn validate_symbolic_id(id: &str) -> CoreResult<()> {
    if SYMBOLIC_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(CoreError::InvalidArgument(format!(
            "symbolic id '{}' must start with a letter and contain only letters, digits, '_' or '-' (max 32 chars)",
            id
        )))
    }
}

#[derive(Debug, Clone)]
pub enum Selector {
    Uuid(Uuid),
    Symbolic(String),
    Index(usize),
}

impl Selector {
    /// Parses a path/body selector token: a UUID if it parses as one, a
    /// decimal index if it parses as an unsigned integer, otherwise a
    /// symbolic identifier. Order matters — a symbolic id that happens to
    /// look like a small integer is extremely unlikely in practice and
    /// there is no reserved disambiguating prefix, so numeric-looking
    /// tokens are always treated as indices.
    pub fn parse(token: &str) -> Self {
        if let Ok(uuid) = Uuid::parse_str(token) {
            return Selector::Uuid(uuid);
        }
        if let Ok(index) = token.parse::<usize>() {
            return Selector::Index(index);
        }
        Selector::Symbolic(token.to_string())
    }
}

pub struct EmulatorManager {
    instances: RwLock<IndexMap<Uuid, Arc<Mutex<Instance>>>>,
    symbolic_index: RwLock<HashMap<String, Uuid>>,
    events: EventBus,
}

impl EmulatorManager {
    pub fn new(events: EventBus) -> Self {
        Self {
            instances: RwLock::new(IndexMap::new()),
            symbolic_index: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Creates a new instance. `InvalidModel` if `model` doesn't name a
    /// known model, `InvalidRam` if `ram_kb` isn't in that model's
    /// permitted set, `DuplicateSymbolicId` if `symbolic_id` is already
    /// taken.
    pub async fn create(
        &self,
        symbolic_id: Option<String>,
        model: Option<String>,
        ram_kb: Option<u32>,
    ) -> CoreResult<Arc<Mutex<Instance>>> {
        let model_name = model.as_deref().unwrap_or("48k");
        let resolved_model = ModelCatalogue::resolve(model_name)
            .ok_or_else(|| CoreError::InvalidArgument(format!("unknown model: {}", model_name)))?;

        let ram = ram_kb.unwrap_or_else(|| resolved_model.default_ram_kb());
        if !ModelCatalogue::validate_ram(resolved_model, ram) {
            return Err(CoreError::InvalidArgument(format!(
                "RAM size {}KB is not permitted for model {}",
                ram,
                resolved_model.as_str()
            )));
        }

        if let Some(ref sym) = symbolic_id {
            validate_symbolic_id(sym)?;
            let symbolic_index = self.symbolic_index.read().await;
            if symbolic_index.contains_key(sym) {
                return Err(CoreError::InvalidArgument(format!(
                    "symbolic id '{}' is already in use",
                    sym
                )));
            }
        }

        let mut config = InstanceConfig::new(resolved_model);
        config.ram_kb = ram;
        let instance = Instance::new(symbolic_id.clone(), config, self.events.clone());
        let id = instance.id.0;
        let arc = Arc::new(Mutex::new(instance));

        {
            let mut instances = self.instances.write().await;
            instances.insert(id, arc.clone());
        }
        if let Some(sym) = symbolic_id {
            let mut symbolic_index = self.symbolic_index.write().await;
            symbolic_index.insert(sym, id);
        }

        Ok(arc)
    }

    pub async fn resolve(&self, selector: &Selector) -> Option<Arc<Mutex<Instance>>> {
        match selector {
            Selector::Uuid(uuid) => {
                let instances = self.instances.read().await;
                instances.get(uuid).cloned()
            }
            Selector::Symbolic(name) => {
                let uuid = {
                    let symbolic_index = self.symbolic_index.read().await;
                    *symbolic_index.get(name)?
                };
                let instances = self.instances.read().await;
                instances.get(&uuid).cloned()
            }
            Selector::Index(index) => {
                let instances = self.instances.read().await;
                instances.get_index(*index).map(|(_, v)| v.clone())
            }
        }
    }

    /// Transitions the instance to `Stopped` if necessary, then detaches
    /// it from both mappings.
    pub async fn remove(&self, selector: &Selector) -> CoreResult<()> {
        let arc = self
            .resolve(selector)
            .await
            .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;

        let (id, symbolic_id) = {
            let mut instance = arc.lock().await;
            let _ = instance.stop();
            (instance.id.0, instance.symbolic_id.clone())
        };

        {
            let mut instances = self.instances.write().await;
            instances.shift_remove(&id);
        }
        if let Some(sym) = symbolic_id {
            let mut symbolic_index = self.symbolic_index.write().await;
            symbolic_index.remove(&sym);
        }

        Ok(())
    }

    /// Ordered by insertion; stable across non-mutating reads.
    pub async fn list(&self) -> Vec<Arc<Mutex<Instance>>> {
        let instances = self.instances.read().await;
        instances.values().cloned().collect()
    }

    /// The most recently created live instance — used by stateless
    /// control endpoints when exactly one instance exists.
    pub async fn most_recent(&self) -> Option<Arc<Mutex<Instance>>> {
        let instances = self.instances.read().await;
        instances.values().last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> EmulatorManager {
        EmulatorManager::new(EventBus::new())
    }

    #[tokio::test]
    async fn create_rejects_unknown_model() {
        let m = manager();
        let err = m.create(None, Some("spectrum256".into()), None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_invalid_ram() {
        let m = manager();
        let err = m.create(None, Some("48k".into()), Some(128)).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_symbolic_id() {
        let m = manager();
        m.create(Some("main".into()), None, None).await.unwrap();
        let err = m.create(Some("main".into()), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_malformed_symbolic_id() {
        let m = manager();
        // leading digit would otherwise collide with index-addressing
        let err = m.create(Some("1bad".into()), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));

        let err = m.create(Some("has space".into()), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_accepts_well_formed_symbolic_id() {
        let m = manager();
        assert!(m.create(Some("main-01".into()), None, None).await.is_ok());
    }

    #[tokio::test]
    async fn resolve_by_index_and_symbolic_and_uuid() {
        let m = manager();
        let arc = m.create(Some("main".into()), None, None).await.unwrap();
        let id = arc.lock().await.id.0;

        assert!(m.resolve(&Selector::Index(0)).await.is_some());
        assert!(m.resolve(&Selector::Symbolic("main".into())).await.is_some());
        assert!(m.resolve(&Selector::Uuid(id)).await.is_some());
        assert!(m.resolve(&Selector::Index(1)).await.is_none());
    }

    #[tokio::test]
    async fn remove_detaches_from_both_mappings() {
        let m = manager();
        m.create(Some("main".into()), None, None).await.unwrap();
        m.remove(&Selector::Symbolic("main".into())).await.unwrap();
        assert!(m.resolve(&Selector::Symbolic("main".into())).await.is_none());
        assert_eq!(m.list().await.len(), 0);
    }

    #[tokio::test]
    async fn most_recent_returns_last_inserted() {
        let m = manager();
        m.create(Some("first".into()), None, None).await.unwrap();
        let second = m.create(Some("second".into()), None, None).await.unwrap();
        let recent = m.most_recent().await.unwrap();
        assert_eq!(recent.lock().await.id.0, second.lock().await.id.0);
    }

    #[tokio::test]
    async fn selector_parse_prefers_uuid_then_index_then_symbolic() {
        assert!(matches!(Selector::parse("not-a-uuid-or-number"), Selector::Symbolic(_)));
        assert!(matches!(Selector::parse("3"), Selector::Index(3)));
        let uuid = Uuid::new_v4();
        assert!(matches!(Selector::parse(&uuid.to_string()), Selector::Uuid(_)));
    }
}
