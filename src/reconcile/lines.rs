use crate::odoo::models::AttributeLine;

/// Attribute lines for a template, merged by attribute id as they are
/// inserted. Attribute order and value order follow first appearance.
#[derive(Debug, Default, Clone)]
pub struct AttributeLineSet {
    lines: Vec<AttributeLine>,
    candidates: usize,
}

impl AttributeLineSet {
    pub fn insert(&mut self, attribute_id: i64, value_id: i64) {
        self.candidates += 1;
        match self
            .lines
            .iter_mut()
            .find(|line| line.attribute_id == attribute_id)
        {
            Some(line) => {
                if !line.value_ids.contains(&value_id) {
                    line.value_ids.push(value_id);
                }
            }
            None => self.lines.push(AttributeLine {
                attribute_id,
                value_ids: vec![value_id],
            }),
        }
    }

    /// Number of (attribute, value) pairs offered before merging.
    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn into_lines(self) -> Vec<AttributeLine> {
        self.lines
    }
}
