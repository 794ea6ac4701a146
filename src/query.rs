//! Find layer over committed store state: label scan plus property
//! equality filters, resolved through the session so results share the
//! identity map. Uncommitted transient entities are not visible to finds.

use crate::{
    backend::GraphBackend,
    entity::EntityKey,
    errors::ObjectGraphError,
    session::Session,
    value::PropertyValue,
};

#[derive(Clone, Debug)]
pub struct FindQuery {
    label: String,
    filters: Vec<(String, PropertyValue)>,
}

impl FindQuery {
    pub fn new<T: Into<String>>(label: T) -> Self {
        Self {
            label: label.into(),
            filters: Vec::new(),
        }
    }

    pub fn with<T: Into<String>, V: Into<PropertyValue>>(mut self, name: T, value: V) -> Self {
        self.filters.push((name.into(), value.into()));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn find_all<B: GraphBackend>(
        &self,
        session: &mut Session<B>,
    ) -> Result<Vec<EntityKey>, ObjectGraphError> {
        let ids = session.scan_label(&self.label)?;
        let mut found = Vec::new();
        for id in ids {
            let key = session.resolve(id)?;
            if self.matches(session, key)? {
                found.push(key);
            }
        }
        Ok(found)
    }

    pub fn find_one<B: GraphBackend>(
        &self,
        session: &mut Session<B>,
    ) -> Result<Option<EntityKey>, ObjectGraphError> {
        let ids = session.scan_label(&self.label)?;
        for id in ids {
            let key = session.resolve(id)?;
            if self.matches(session, key)? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// First match, or a new transient entity carrying the filter
    /// properties. The created entity is persisted by the next commit.
    pub fn find_or_create<B: GraphBackend>(
        &self,
        session: &mut Session<B>,
    ) -> Result<EntityKey, ObjectGraphError> {
        if let Some(found) = self.find_one(session)? {
            return Ok(found);
        }
        let key = session.create(&self.label)?;
        for (name, value) in &self.filters {
            session.set_property(key, name, value.clone())?;
        }
        Ok(key)
    }

    fn matches<B: GraphBackend>(
        &self,
        session: &Session<B>,
        key: EntityKey,
    ) -> Result<bool, ObjectGraphError> {
        for (name, value) in &self.filters {
            if session.property(key, name)?.as_ref() != Some(value) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
