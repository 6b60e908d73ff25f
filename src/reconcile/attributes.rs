use crate::catalog::AttributePair;
use crate::odoo::models::{ATTRIBUTE, ATTRIBUTE_VALUE, NewAttribute, NewAttributeValue};
use crate::odoo::{Domain, OdooError, OdooSession};
use std::collections::HashMap;
use tracing::info;

/// Get-or-create for attributes (keyed by name) and attribute values (keyed
/// by attribute id and text), memoised for the length of one run.
///
/// Every create is preceded by a search, but the two calls are not atomic on
/// the ERP side: concurrent runs introducing the same new name can each
/// create a record.
pub struct AttributeResolver<'s> {
    session: OdooSession<'s>,
    attributes: HashMap<String, i64>,
    values: HashMap<(i64, String), i64>,
    created_attributes: usize,
    created_values: usize,
}

impl<'s> AttributeResolver<'s> {
    pub fn new(session: OdooSession<'s>) -> Self {
        Self {
            session,
            attributes: HashMap::new(),
            values: HashMap::new(),
            created_attributes: 0,
            created_values: 0,
        }
    }

    pub async fn attribute(&mut self, name: &str) -> Result<i64, OdooError> {
        if let Some(id) = self.attributes.get(name) {
            return Ok(*id);
        }
        let existing = self
            .session
            .search(ATTRIBUTE, &Domain::new().where_eq("name", name))
            .await?;
        let id = match existing.first() {
            Some(id) => *id,
            None => {
                let id = self
                    .session
                    .create(ATTRIBUTE, &NewAttribute::always_variant(name))
                    .await?;
                self.created_attributes += 1;
                info!(target = "sync.odoo", attribute = name, id, "attribute_created");
                id
            }
        };
        self.attributes.insert(name.to_string(), id);
        Ok(id)
    }

    pub async fn attribute_value(
        &mut self,
        attribute_id: i64,
        value: &str,
    ) -> Result<i64, OdooError> {
        let key = (attribute_id, value.to_string());
        if let Some(id) = self.values.get(&key) {
            return Ok(*id);
        }
        let domain = Domain::new()
            .where_eq("name", value)
            .where_eq("attribute_id", attribute_id);
        let existing = self.session.search(ATTRIBUTE_VALUE, &domain).await?;
        let id = match existing.first() {
            Some(id) => *id,
            None => {
                let payload = NewAttributeValue {
                    name: value,
                    attribute_id,
                };
                let id = self.session.create(ATTRIBUTE_VALUE, &payload).await?;
                self.created_values += 1;
                info!(
                    target = "sync.odoo",
                    attribute_id,
                    value,
                    id,
                    "attribute_value_created"
                );
                id
            }
        };
        self.values.insert(key, id);
        Ok(id)
    }

    /// Resolves both halves of a catalog pair: `(attribute_id, value_id)`.
    pub async fn resolve_pair(&mut self, pair: &AttributePair) -> Result<(i64, i64), OdooError> {
        let attribute_id = self.attribute(&pair.name).await?;
        let value_id = self.attribute_value(attribute_id, &pair.value).await?;
        Ok((attribute_id, value_id))
    }

    pub fn created_attributes(&self) -> usize {
        self.created_attributes
    }

    pub fn created_values(&self) -> usize {
        self.created_values
    }
}
