//! In-memory resource collections
//!
//! A [`Collection`] owns the records of one resource for the lifetime of
//! the process. Every mutation builds the new record first and only then
//! commits it, so a failed validation leaves the collection untouched.
//!
//! Collections are shared between connections through [`SharedCollection`],
//! a `parking_lot::RwLock` behind an `Arc`.

use crate::record::{is_blank, Identity, Key, Record, ResourceSchema};
use crate::{Error, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Lock-guarded collection handed to operations
pub type SharedCollection = Arc<RwLock<Collection>>;

/// Ordered, keyed set of records
#[derive(Debug)]
pub struct Collection {
    schema: ResourceSchema,
    records: Vec<Record>,
    next_id: u64,
}

impl Collection {
    /// Empty collection for `schema`
    pub fn new(schema: ResourceSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Wrap in the shared, lock-guarded form
    pub fn shared(schema: ResourceSchema) -> SharedCollection {
        Arc::new(RwLock::new(Self::new(schema)))
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, key: &Key) -> Option<usize> {
        let identity = &self.schema.identity;
        self.records
            .iter()
            .position(|record| Key::of(record, identity).as_ref() == Some(key))
    }

    fn not_found(&self) -> Error {
        Error::NotFound(self.schema.messages.not_found.clone())
    }

    /// Rebuild a record with the identity first and fields in schema order
    fn ordered(&self, key: &Key, fields: &Map<String, Value>) -> Record {
        let mut record = Record::new();
        record.insert(self.schema.identity.field().to_string(), key.to_value());
        for spec in &self.schema.fields {
            if let Some(value) = fields.get(&spec.name) {
                record.insert(spec.name.clone(), value.clone());
            }
        }
        record
    }

    /// Insert a new record
    ///
    /// Auto identities ignore any caller-supplied value; natural identities
    /// must be supplied and unique.
    pub fn create(&mut self, input: &Map<String, Value>) -> Result<Record> {
        let supplied = self.schema.coerce_fields(input)?;

        let mut fields = Map::new();
        for spec in &self.schema.fields {
            match supplied.get(&spec.name).filter(|v| !is_blank(v)) {
                Some(value) => {
                    fields.insert(spec.name.clone(), value.clone());
                }
                None if spec.required => {
                    return Err(Error::ValidationFailed(format!(
                        "O campo '{}' é obrigatório",
                        spec.name
                    )));
                }
                None => {
                    if let Some(default) = &spec.default {
                        fields.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        let key = match &self.schema.identity {
            Identity::Auto { .. } => Key::Id(self.next_id),
            Identity::Natural { field } => {
                let raw = input
                    .get(field)
                    .filter(|v| !v.is_null() && !is_blank(v))
                    .ok_or_else(|| Error::ValidationFailed(format!("O campo '{}' é obrigatório", field)))?;
                let Value::String(name) = raw else {
                    return Err(Error::ValidationFailed(format!("O campo '{}' deve ser um texto", field)));
                };
                let key = Key::Name(name.trim().to_string());
                if self.position(&key).is_some() {
                    return Err(Error::DuplicateIdentity(self.schema.messages.duplicate.clone()));
                }
                key
            }
        };

        let record = self.ordered(&key, &fields);
        self.records.push(record.clone());
        if let Key::Id(id) = key {
            self.next_id = id + 1;
        }
        tracing::debug!(resource = %self.schema.name, key = %key, "record created");
        Ok(record)
    }

    /// Look up one record
    pub fn get(&self, key: &Key) -> Result<Record> {
        self.position(key)
            .map(|i| self.records[i].clone())
            .ok_or_else(|| self.not_found())
    }

    /// All records, optionally filtered by field equality
    ///
    /// Filter values are text (from the query string) and are coerced to the
    /// field's kind before comparison. Blank filter values are ignored.
    pub fn list(&self, filter: &HashMap<String, String>) -> Result<Vec<Record>> {
        let identity = self.schema.identity.field();
        let mut wanted: Vec<(&str, Value)> = Vec::with_capacity(filter.len());

        for (name, raw) in filter {
            if raw.trim().is_empty() {
                continue;
            }
            let value = if name == identity {
                self.schema.identity.parse_key(raw)?.to_value()
            } else {
                let spec = self
                    .schema
                    .field_spec(name)
                    .ok_or_else(|| Error::ValidationFailed(format!("Filtro desconhecido: '{}'", name)))?;
                match spec.kind.coerce(name, &Value::String(raw.clone()))? {
                    Some(value) => value,
                    None => continue,
                }
            };
            wanted.push((name.as_str(), value));
        }

        Ok(self
            .records
            .iter()
            .filter(|record| wanted.iter().all(|(name, value)| record.get(*name) == Some(value)))
            .cloned()
            .collect())
    }

    /// Partially update a record
    ///
    /// Only supplied, non-blank fields change. The identity may be repeated
    /// in the payload but not changed.
    pub fn update(&mut self, key: &Key, input: &Map<String, Value>) -> Result<Record> {
        let index = self.position(key).ok_or_else(|| self.not_found())?;
        let identity = &self.schema.identity;

        if let Some(raw) = input.get(identity.field()).filter(|v| !v.is_null() && !is_blank(v)) {
            let text = match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if identity.parse_key(&text).ok().as_ref() != Some(key) {
                return Err(Error::ValidationFailed(format!(
                    "O campo '{}' não pode ser alterado",
                    identity.field()
                )));
            }
        }

        if input.keys().all(|name| name == identity.field()) {
            return Err(Error::ValidationFailed(
                "Nenhum campo informado para atualização".to_string(),
            ));
        }

        let supplied = self.schema.coerce_fields(input)?;
        let mut fields = self.records[index].clone();
        for (name, value) in supplied {
            if !is_blank(&value) {
                fields.insert(name, value);
            }
        }

        let record = self.ordered(key, &fields);
        self.records[index] = record.clone();
        tracing::debug!(resource = %self.schema.name, key = %key, "record updated");
        Ok(record)
    }

    /// Remove a record, returning it
    pub fn delete(&mut self, key: &Key) -> Result<Record> {
        let index = self.position(key).ok_or_else(|| self.not_found())?;
        let record = self.records.remove(index);
        tracing::debug!(resource = %self.schema.name, key = %key, "record deleted");
        Ok(record)
    }
}
