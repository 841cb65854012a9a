use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ContextError;

/// Type-keyed registry of shared services available to steps.
#[derive(Default, Clone)]
pub struct Services {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service`, replacing any previous service of the same type.
    pub fn insert<T>(&mut self, service: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.insert_arc(Arc::new(service))
    }

    pub fn insert_arc<T>(&mut self, service: Arc<T>) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(TypeId::of::<T>(), service);
        self
    }

    #[must_use]
    pub fn with<T>(mut self, service: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(service);
        self
    }

    #[must_use]
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Like [`get`](Self::get), but a missing service is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::MissingService`] if nothing of type `T` is registered.
    pub fn require<T>(&self) -> Result<Arc<T>, ContextError>
    where
        T: Any + Send + Sync,
    {
        self.get::<T>().ok_or(ContextError::MissingService {
            service: type_name::<T>(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Mailer {
        from: &'static str,
    }

    #[test]
    fn lookup_by_type() {
        let services = Services::new().with(Mailer { from: "shop@example.com" });

        let mailer = services.get::<Mailer>().expect("registered");
        assert_eq!(mailer.from, "shop@example.com");
        assert!(services.get::<String>().is_none());
    }

    #[test]
    fn require_reports_missing_type() {
        let services = Services::new();

        let err = services.require::<Mailer>().expect_err("not registered");
        assert!(matches!(err, ContextError::MissingService { service } if service.ends_with("Mailer")));
    }

    #[test]
    fn insert_replaces_same_type() {
        let mut services = Services::new();
        services.insert(1_u32).insert(2_u32);

        assert_eq!(services.len(), 1);
        assert_eq!(services.get::<u32>().as_deref(), Some(&2));
    }
}
