use serde::Serialize;
use serde_json::Value;

/// A search filter: every condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Domain(Vec<Condition>);

/// Serialised as the ERP's `[field, operator, value]` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition(pub &'static str, pub &'static str, pub Value);

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.0.push(Condition(field, "=", value.into()));
        self
    }

    pub fn where_in(mut self, field: &'static str, values: &[i64]) -> Self {
        self.0.push(Condition(field, "in", Value::from(values.to_vec())));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialises_as_list_of_triples() {
        let domain = Domain::new()
            .where_eq("product_tmpl_id", 12)
            .where_in("product_template_attribute_value_ids", &[3, 4]);
        assert_eq!(
            serde_json::to_value(&domain).unwrap(),
            json!([
                ["product_tmpl_id", "=", 12],
                ["product_template_attribute_value_ids", "in", [3, 4]]
            ])
        );
    }
}
