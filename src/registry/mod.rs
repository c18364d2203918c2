// Workspace registry
//
// Named projects, sites and symbols the controller copies into commands.
// Each registry keeps insertion order and broadcasts its own change events;
// a receiver unsubscribes by being dropped.

use crate::models::{ProjectConfig, Site, Symbol};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::{LazyLock, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

static SYMBOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("Invalid symbol name regex")
});

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },
}

/// Change events emitted by a registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityEvent {
    Added(String),
    Modified(String),
    Renamed { from: String, to: String },
    Removed(String),
}

/// An entity stored under a unique name.
pub trait Named: Clone {
    /// Entity kind used in errors and logs
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && name.trim() == name
    }
}

impl Named for ProjectConfig {
    const KIND: &'static str = "project";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Named for Site {
    const KIND: &'static str = "site";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Named for Symbol {
    const KIND: &'static str = "symbol";

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn is_valid_name(name: &str) -> bool {
        SYMBOL_NAME.is_match(name)
    }
}

/// Ordered, thread-safe name -> entity map with change notification.
pub struct Registry<T: Named> {
    items: RwLock<IndexMap<String, T>>,
    events: broadcast::Sender<EntityEvent>,
}

impl<T: Named> Registry<T> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            items: RwLock::new(IndexMap::new()),
            events,
        }
    }

    fn validate(name: &str) -> Result<(), RegistryError> {
        if T::is_valid_name(name) {
            Ok(())
        } else {
            Err(RegistryError::InvalidName {
                kind: T::KIND,
                name: name.to_string(),
            })
        }
    }

    fn emit(&self, event: EntityEvent) {
        tracing::debug!("{} registry: {:?}", T::KIND, event);
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Add an entity, replacing any existing one with the same name.
    pub fn insert(&self, item: T) -> Result<EntityEvent, RegistryError> {
        Self::validate(item.name())?;
        let name = item.name().to_string();

        let previous = self
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), item);

        let event = match previous {
            Some(_) => EntityEvent::Modified(name),
            None => EntityEvent::Added(name),
        };
        self.emit(event.clone());
        Ok(event)
    }

    /// Rename an entity in place, keeping its position.
    pub fn rename(&self, from: &str, to: &str) -> Result<(), RegistryError> {
        Self::validate(to)?;
        {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            if from == to {
                return if items.contains_key(from) {
                    Ok(())
                } else {
                    Err(RegistryError::NotFound {
                        kind: T::KIND,
                        name: from.to_string(),
                    })
                };
            }
            if items.contains_key(to) {
                return Err(RegistryError::Duplicate {
                    kind: T::KIND,
                    name: to.to_string(),
                });
            }
            let Some((index, _, mut item)) = items.shift_remove_full(from) else {
                return Err(RegistryError::NotFound {
                    kind: T::KIND,
                    name: from.to_string(),
                });
            };
            item.set_name(to.to_string());
            items.shift_insert(index, to.to_string(), item);
        }

        self.emit(EntityEvent::Renamed {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<T, RegistryError> {
        let removed = self
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(name)
            .ok_or_else(|| RegistryError::NotFound {
                kind: T::KIND,
                name: name.to_string(),
            })?;

        self.emit(EntityEvent::Removed(name.to_string()));
        Ok(removed)
    }

    /// Clone of the named entity.
    pub fn get(&self, name: &str) -> Option<T> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// All entities in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.events.subscribe()
    }
}

impl<T: Named> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the controller needs to configure the engine for a session.
#[derive(Default)]
pub struct Workspace {
    pub projects: Registry<ProjectConfig>,
    pub sites: Registry<Site>,
    pub symbols: Registry<Symbol>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_modify() {
        let registry: Registry<Site> = Registry::new();

        let added = registry.insert(Site::new("Uccle", 4.35, 50.8)).unwrap();
        assert_eq!(added, EntityEvent::Added("Uccle".to_string()));

        let modified = registry.insert(Site::new("Uccle", 4.36, 50.8)).unwrap();
        assert_eq!(modified, EntityEvent::Modified("Uccle".to_string()));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Uccle").unwrap().longitude, 4.36);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let projects: Registry<ProjectConfig> = Registry::new();
        assert!(matches!(
            projects.insert(ProjectConfig::new(" padded")),
            Err(RegistryError::InvalidName { .. })
        ));
        assert!(projects.insert(ProjectConfig::new("")).is_err());
        assert!(projects.insert(ProjectConfig::new("zenith sky")).is_ok());

        let symbols: Registry<Symbol> = Registry::new();
        assert!(symbols.insert(Symbol::new("NO2", "")).is_ok());
        assert!(symbols.insert(Symbol::new("O3_223K", "")).is_ok());
        assert!(symbols.insert(Symbol::new("2NO", "")).is_err());
        assert!(symbols.insert(Symbol::new("no 2", "")).is_err());
    }

    #[test]
    fn test_rename_keeps_order() {
        let registry: Registry<Symbol> = Registry::new();
        for name in ["NO2", "O3", "BrO"] {
            registry.insert(Symbol::new(name, "")).unwrap();
        }

        registry.rename("O3", "O3_243K").unwrap();

        assert_eq!(registry.names(), vec!["NO2", "O3_243K", "BrO"]);
        assert_eq!(registry.get("O3_243K").unwrap().name, "O3_243K");
        assert!(!registry.contains("O3"));
    }

    #[test]
    fn test_rename_errors() {
        let registry: Registry<Symbol> = Registry::new();
        registry.insert(Symbol::new("NO2", "")).unwrap();
        registry.insert(Symbol::new("O3", "")).unwrap();

        assert!(matches!(
            registry.rename("NO2", "O3"),
            Err(RegistryError::Duplicate { .. })
        ));
        assert!(matches!(
            registry.rename("HCHO", "CH2O"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_rename_to_same_name() {
        let registry: Registry<Symbol> = Registry::new();
        registry.insert(Symbol::new("NO2", "nitrogen dioxide")).unwrap();
        registry.insert(Symbol::new("O3", "")).unwrap();
        let mut rx = registry.subscribe();

        registry.rename("NO2", "NO2").unwrap();

        assert_eq!(registry.names(), vec!["NO2", "O3"]);
        assert_eq!(registry.get("NO2").unwrap().description, "nitrogen dioxide");
        // nothing changed, nothing to report
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            registry.rename("BrO", "BrO"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let registry: Registry<Site> = Registry::new();
        registry.insert(Site::new("Lauder", 169.68, -45.04)).unwrap();

        let removed = registry.remove("Lauder").unwrap();
        assert_eq!(removed.name, "Lauder");
        assert!(registry.is_empty());
        assert!(registry.remove("Lauder").is_err());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let registry: Registry<Symbol> = Registry::new();
        let mut rx = registry.subscribe();

        registry.insert(Symbol::new("NO2", "")).unwrap();
        registry.rename("NO2", "NO2_298K").unwrap();
        registry.remove("NO2_298K").unwrap();

        assert_eq!(rx.recv().await.unwrap(), EntityEvent::Added("NO2".into()));
        assert_eq!(
            rx.recv().await.unwrap(),
            EntityEvent::Renamed {
                from: "NO2".into(),
                to: "NO2_298K".into(),
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            EntityEvent::Removed("NO2_298K".into())
        );
    }

    #[test]
    fn test_registries_are_independent() {
        let workspace = Workspace::new();
        let mut site_rx = workspace.sites.subscribe();

        workspace.symbols.insert(Symbol::new("NO2", "")).unwrap();

        assert!(site_rx.try_recv().is_err());
    }
}
