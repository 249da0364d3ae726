//! Object lists: ordered, uniqueness-validated collections of groupings.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::entity::{group_objects, regroup_objects, EntityError, Grouping, RawObject};

/// An ordered collection of groupings.
///
/// Invariant: the union of the members' `unique_ids` has no duplicates. The
/// invariant is established wherever lists are built from unvalidated input
/// (`from_raw`, `combine`); subsets of a valid list are valid by
/// construction, so filters skip re-validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectList {
    groupings: Vec<Grouping>,
}

impl ObjectList {
    pub fn new(groupings: Vec<Grouping>) -> ObjectList {
        ObjectList { groupings }
    }

    /// Group raw objects by id and validate uniqueness.
    pub fn from_raw(objects: Vec<Arc<RawObject>>) -> Result<ObjectList, EntityError> {
        let list = ObjectList::new(group_objects(objects)?);
        list.validate_uniqueness()?;
        Ok(list)
    }

    /// Merge two lists, regrouping by id so the same object contributed by
    /// two sources lands in one grouping.
    pub fn combine(left: &ObjectList, right: &ObjectList) -> Result<ObjectList, EntityError> {
        let mut all = left.groupings.clone();
        all.extend(right.groupings.iter().cloned());
        let list = ObjectList::new(regroup_objects(&all)?);
        list.validate_uniqueness()?;
        Ok(list)
    }

    /// Check the no-duplicate `(id, type, source)` invariant.
    pub fn validate_uniqueness(&self) -> Result<(), EntityError> {
        let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
        for grouping in &self.groupings {
            for uid in grouping.unique_ids() {
                if !seen.insert(uid.clone()) {
                    return Err(EntityError::DuplicateObjects(format!(
                        "({}, {}, {})",
                        uid.0, uid.1, uid.2
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn groupings(&self) -> &[Grouping] {
        &self.groupings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Grouping> {
        self.groupings.iter()
    }

    pub fn len(&self) -> usize {
        self.groupings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty()
    }

    /// Clear overlays on every grouping (done once per query execution).
    pub fn reset_overlays(&mut self) {
        let mut reset = 0usize;
        for grouping in &mut self.groupings {
            if grouping.has_overlays() {
                grouping.reset_overlays();
                reset += 1;
            }
        }
        if reset > 0 {
            tracing::debug!(reset, total = self.groupings.len(), "reset grouping overlays");
        }
    }

    /// Groupings claiming the given type.
    pub fn filter_by_type(&self, type_name: &str) -> ObjectList {
        ObjectList::new(
            self.groupings
                .iter()
                .filter(|g| g.types().contains(type_name))
                .cloned()
                .collect(),
        )
    }

    /// Restrict each grouping to its member from the given source; groupings
    /// with nothing from that source drop out.
    pub fn filter_by_source(&self, source: &str) -> ObjectList {
        let wanted: BTreeSet<String> = [source.to_string()].into();
        ObjectList::new(
            self.groupings
                .iter()
                .filter_map(|g| g.select_sources(&wanted))
                .collect(),
        )
    }

    /// The grouping with the given id, as a one-element list, or empty.
    pub fn get_by_id(&self, id: &str) -> ObjectList {
        match self.groupings.iter().find(|g| g.id() == id) {
            Some(grouping) => ObjectList::new(vec![grouping.clone()]),
            None => ObjectList::new(vec![]),
        }
    }

    pub fn unique_ids(&self) -> BTreeSet<(String, String, String)> {
        self.groupings
            .iter()
            .flat_map(|g| g.unique_ids().iter().cloned())
            .collect()
    }

    pub fn id_types(&self) -> BTreeSet<(String, String)> {
        self.groupings
            .iter()
            .flat_map(|g| g.id_types().iter().cloned())
            .collect()
    }

    pub fn types(&self) -> BTreeSet<String> {
        self.groupings
            .iter()
            .flat_map(|g| g.types().iter().cloned())
            .collect()
    }
}

impl fmt::Display for ObjectList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 10;
        write!(f, "ObjectList(")?;
        for (i, grouping) in self.groupings.iter().take(MAX_SHOWN).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{grouping}")?;
        }
        if self.groupings.len() > MAX_SHOWN {
            write!(f, ", ... ({} more)", self.groupings.len() - MAX_SHOWN)?;
        }
        write!(f, ")")
    }
}

impl<'a> IntoIterator for &'a ObjectList {
    type Item = &'a Grouping;
    type IntoIter = std::slice::Iter<'a, Grouping>;

    fn into_iter(self) -> Self::IntoIter {
        self.groupings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, types: &[&str], source: &str) -> Arc<RawObject> {
        Arc::new(
            RawObject::from_json(&json!({
                "__id__": id,
                "__types__": types,
                "__source__": source,
            }))
            .expect("valid object"),
        )
    }

    #[test]
    fn from_raw_groups_by_id() {
        let list = ObjectList::from_raw(vec![
            raw("a", &["t"], "s1"),
            raw("b", &["t"], "s1"),
            raw("a", &["t"], "s2"),
        ])
        .expect("valid list");
        assert_eq!(list.len(), 2);
        assert_eq!(list.unique_ids().len(), 3);
    }

    #[test]
    fn combine_regroups_and_validates() {
        let left = ObjectList::from_raw(vec![raw("a", &["t"], "s1")]).expect("valid");
        let right = ObjectList::from_raw(vec![raw("a", &["t"], "s2")]).expect("valid");
        let merged = ObjectList::combine(&left, &right).expect("mergeable");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.groupings()[0].sources().len(), 2);

        let clash = ObjectList::from_raw(vec![raw("a", &["t"], "s1")]).expect("valid");
        assert!(ObjectList::combine(&left, &clash).is_err());
    }

    #[test]
    fn filters_preserve_order_and_subset() {
        let list = ObjectList::from_raw(vec![
            raw("a", &["employee"], "s1"),
            raw("b", &["customer"], "s1"),
            raw("c", &["employee"], "s2"),
        ])
        .expect("valid list");

        let employees = list.filter_by_type("employee");
        assert_eq!(employees.len(), 2);
        assert_eq!(employees.groupings()[0].id(), "a");

        let from_s2 = list.filter_by_source("s2");
        assert_eq!(from_s2.len(), 1);
        assert_eq!(from_s2.groupings()[0].id(), "c");
    }

    #[test]
    fn get_by_id_returns_single_or_empty() {
        let list = ObjectList::from_raw(vec![raw("a", &["t"], "s1")]).expect("valid");
        assert_eq!(list.get_by_id("a").len(), 1);
        assert!(list.get_by_id("zzz").is_empty());
    }
}
