//! Element table: multimap of live presences.
//!
//! Primary index is `(owner, topic)`; a secondary index lists the topics of
//! each owner so owner-wide selection does not scan the whole table. The
//! same `(owner, topic, key)` may hold several entries at once, each with
//! its own dot.

use crate::element::{Element, ElementData, ElementMap, Meta, OwnerId};
use std::collections::{BTreeMap, BTreeSet};
use tracker_core::Dot;

/// One row under an `(owner, topic)` slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub key: String,
    pub meta: Meta,
    pub dot: Dot,
}

/// Selection pattern: exact key, or every topic of an owner.
#[derive(Clone, Copy, Debug)]
pub enum Match<'a> {
    Exact {
        owner: &'a OwnerId,
        topic: &'a str,
        key: &'a str,
    },
    Owner(&'a OwnerId),
}

impl Match<'_> {
    fn owner(&self) -> &OwnerId {
        match self {
            Match::Exact { owner, .. } | Match::Owner(owner) => owner,
        }
    }

    fn accepts(&self, topic: &str, entry: &TableEntry) -> bool {
        match self {
            Match::Exact {
                topic: want_topic,
                key,
                ..
            } => *want_topic == topic && *key == entry.key,
            Match::Owner(_) => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementTable {
    entries: BTreeMap<(OwnerId, String), Vec<TableEntry>>,
    topics_by_owner: BTreeMap<OwnerId, BTreeSet<String>>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from elements, keeping duplicates.
    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        let mut table = Self::new();
        for element in elements {
            table.insert_element(element);
        }
        table
    }

    pub fn insert(&mut self, owner: OwnerId, topic: String, key: String, meta: Meta, dot: Dot) {
        self.topics_by_owner
            .entry(owner.clone())
            .or_default()
            .insert(topic.clone());
        self.entries
            .entry((owner, topic))
            .or_default()
            .push(TableEntry { key, meta, dot });
    }

    pub fn insert_element(&mut self, element: Element) {
        self.insert(
            element.owner,
            element.topic,
            element.key,
            element.meta,
            element.dot,
        );
    }

    /// Elements matching `pattern`, in table order.
    pub fn select(&self, pattern: &Match<'_>) -> Vec<Element> {
        let owner = pattern.owner();
        let Some(topics) = self.topics_by_owner.get(owner) else {
            return Vec::new();
        };

        let mut selected = Vec::new();
        for topic in topics {
            let slot = (owner.clone(), topic.clone());
            if let Some(rows) = self.entries.get(&slot) {
                selected.extend(
                    rows.iter()
                        .filter(|entry| pattern.accepts(topic, entry))
                        .map(|entry| to_element(owner, topic, entry)),
                );
            }
        }
        selected
    }

    /// Remove the entries matching `pattern` whose dot is `eligible`,
    /// returning them.
    pub fn remove_matching(
        &mut self,
        pattern: &Match<'_>,
        mut eligible: impl FnMut(&Dot) -> bool,
    ) -> Vec<Element> {
        let owner = pattern.owner().clone();
        let topics: Vec<String> = match self.topics_by_owner.get(&owner) {
            Some(topics) => topics.iter().cloned().collect(),
            None => return Vec::new(),
        };

        let mut removed = Vec::new();
        for topic in topics {
            let slot = (owner.clone(), topic);
            let Some(rows) = self.entries.get_mut(&slot) else {
                continue;
            };
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(rows)
                .into_iter()
                .partition(|entry| pattern.accepts(&slot.1, entry) && eligible(&entry.dot));
            *rows = kept;
            removed.extend(gone.iter().map(|entry| to_element(&slot.0, &slot.1, entry)));
            if rows.is_empty() {
                self.drop_slot(&slot);
            }
        }
        removed
    }

    /// Remove every entry for which `pred` holds, returning them.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Element) -> bool) -> Vec<Element> {
        let mut removed = Vec::new();
        let mut emptied = Vec::new();
        for ((owner, topic), rows) in self.entries.iter_mut() {
            let mut kept = Vec::with_capacity(rows.len());
            for entry in rows.drain(..) {
                let element = to_element(owner, topic, &entry);
                if pred(&element) {
                    removed.push(element);
                } else {
                    kept.push(entry);
                }
            }
            *rows = kept;
            if rows.is_empty() {
                emptied.push((owner.clone(), topic.clone()));
            }
        }
        for slot in emptied {
            self.drop_slot(&slot);
        }
        removed
    }

    /// Iterate over every element, cloning content.
    pub fn iter(&self) -> impl Iterator<Item = Element> + '_ {
        self.entries.iter().flat_map(|((owner, topic), rows)| {
            rows.iter().map(move |entry| to_element(owner, topic, entry))
        })
    }

    /// Elements under a topic, across owners.
    pub fn topic(&self, topic: &str) -> impl Iterator<Item = Element> + '_ {
        let topic = topic.to_string();
        self.entries
            .iter()
            .filter(move |((_, t), _)| *t == topic)
            .flat_map(|((owner, topic), rows)| {
                rows.iter().map(move |entry| to_element(owner, topic, entry))
            })
    }

    /// Fold the whole table into a dot-keyed map.
    pub fn to_element_map(&self) -> ElementMap {
        self.iter().map(Element::into_data).collect()
    }

    /// Whether any entry carries `dot`.
    pub fn contains_dot(&self, dot: &Dot) -> bool {
        self.entries
            .values()
            .any(|rows| rows.iter().any(|entry| entry.dot == *dot))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn drop_slot(&mut self, slot: &(OwnerId, String)) {
        self.entries.remove(slot);
        if let Some(topics) = self.topics_by_owner.get_mut(&slot.0) {
            topics.remove(&slot.1);
            if topics.is_empty() {
                self.topics_by_owner.remove(&slot.0);
            }
        }
    }
}

impl From<ElementMap> for ElementTable {
    fn from(map: ElementMap) -> Self {
        Self::from_elements(
            map.into_iter()
                .map(|(dot, data): (Dot, ElementData)| Element::from_data(dot, data)),
        )
    }
}

fn to_element(owner: &OwnerId, topic: &str, entry: &TableEntry) -> Element {
    Element {
        owner: owner.clone(),
        topic: topic.to_string(),
        key: entry.key.clone(),
        meta: entry.meta.clone(),
        dot: entry.dot.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::empty_meta;
    use serde_json::json;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id)
    }

    fn sample() -> ElementTable {
        let mut table = ElementTable::new();
        table.insert(owner("p1"), "room:1".into(), "u1".into(), json!({"s": 1}), Dot::new("a", 1));
        table.insert(owner("p1"), "room:2".into(), "u1".into(), empty_meta(), Dot::new("a", 2));
        table.insert(owner("p2"), "room:1".into(), "u2".into(), empty_meta(), Dot::new("b", 1));
        table
    }

    #[test]
    fn test_insert_allows_duplicate_keys() {
        let mut table = ElementTable::new();
        table.insert(owner("p1"), "lobby".into(), "k".into(), json!(1), Dot::new("a", 1));
        table.insert(owner("p1"), "lobby".into(), "k".into(), json!(2), Dot::new("b", 1));

        let selected = table.select(&Match::Exact {
            owner: &owner("p1"),
            topic: "lobby",
            key: "k",
        });
        assert_eq!(selected.len(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_select_by_owner_spans_topics() {
        let table = sample();
        let selected = table.select(&Match::Owner(&owner("p1")));
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|e| e.owner == owner("p1")));
        assert!(table.select(&Match::Owner(&owner("nobody"))).is_empty());
    }

    #[test]
    fn test_remove_matching_exact() {
        let mut table = sample();
        let removed = table.remove_matching(
            &Match::Exact {
                owner: &owner("p1"),
                topic: "room:1",
                key: "u1",
            },
            |_| true,
        );
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].dot, Dot::new("a", 1));
        assert_eq!(table.len(), 2);
        assert!(!table.contains_dot(&Dot::new("a", 1)));
    }

    #[test]
    fn test_remove_matching_respects_dot_filter() {
        let mut table = ElementTable::new();
        table.insert(owner("p1"), "lobby".into(), "k".into(), json!(1), Dot::new("a", 1));
        table.insert(owner("p1"), "lobby".into(), "k".into(), json!(2), Dot::new("b", 1));

        let removed = table.remove_matching(&Match::Owner(&owner("p1")), |dot| dot.is_from("a"));
        assert_eq!(removed.len(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.contains_dot(&Dot::new("b", 1)));
    }

    #[test]
    fn test_remove_owner_wildcard_clears_indexes() {
        let mut table = sample();
        let removed = table.remove_matching(&Match::Owner(&owner("p1")), |_| true);
        assert_eq!(removed.len(), 2);
        assert!(table.select(&Match::Owner(&owner("p1"))).is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_where_by_replica() {
        let mut table = sample();
        let removed = table.remove_where(|e| e.replica() == "a");
        assert_eq!(removed.len(), 2);
        assert_eq!(table.len(), 1);
        assert!(table.select(&Match::Owner(&owner("p1"))).is_empty());
    }

    #[test]
    fn test_topic_and_element_map() {
        let table = sample();
        assert_eq!(table.topic("room:1").count(), 2);
        assert_eq!(table.topic("room:9").count(), 0);

        let map = table.to_element_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&Dot::new("b", 1)].key, "u2");
        assert_eq!(ElementTable::from(map), table);
    }
}
