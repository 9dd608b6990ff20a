//! Named entities and their components, as seen by command dispatch

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Behavior attached to an entity. Command methods are declared per
/// component type and invoked on the instance found on the target entity.
pub trait Component: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Identity of a component type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

/// Something in the host's world that commands can address by name
pub trait Entity: Send + Sync {
    fn name(&self) -> &str;
}

/// Lookup service for command targets
pub trait EntityResolver: Send + Sync {
    fn find_entity_by_name(&self, name: &str) -> Option<Arc<dyn Entity>>;

    fn find_component(&self, entity: &dyn Entity, ty: ComponentType) -> Option<Arc<dyn Component>>;
}

struct RegisteredEntity {
    name: String,
    components: HashMap<TypeId, Arc<dyn Component>>,
}

impl Entity for RegisteredEntity {
    fn name(&self) -> &str {
        &self.name
    }
}

/// In-memory entity table
#[derive(Default)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<String, Arc<RegisteredEntity>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `component` to the entity called `name`, creating the entity
    /// on first use. A second component of the same type replaces the first.
    pub fn insert<T: Component>(&self, name: &str, component: T) {
        let mut entities = self
            .entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = entities.entry(name.to_string()).or_insert_with(|| {
            Arc::new(RegisteredEntity {
                name: name.to_string(),
                components: HashMap::new(),
            })
        });
        let mut updated = RegisteredEntity {
            name: entry.name.clone(),
            components: entry.components.clone(),
        };
        updated
            .components
            .insert(TypeId::of::<T>(), Arc::new(component));
        *entry = Arc::new(updated);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
            .is_some()
    }
}

impl EntityResolver for EntityRegistry {
    fn find_entity_by_name(&self, name: &str) -> Option<Arc<dyn Entity>> {
        let entities = self
            .entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entities
            .get(name)
            .map(|entity| entity.clone() as Arc<dyn Entity>)
    }

    fn find_component(&self, entity: &dyn Entity, ty: ComponentType) -> Option<Arc<dyn Component>> {
        let entities = self
            .entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entities.get(entity.name())?.components.get(&ty.id()).cloned()
    }
}
