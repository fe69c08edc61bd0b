//! Merge payloads: what one replica ships to another.
//!
//! A payload is a header (sender, kind, causal history) plus a dot-keyed
//! element map. A *full* payload carries the sender's whole history and
//! table; a *delta* payload carries only the window accumulated since the
//! sender's last reset, with an empty context.

use crate::delta::ClockRange;
use crate::element::{ElementData, ElementMap};
use crate::error::PayloadError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracker_core::{CausalHistory, Clock, Dot, ReplicaId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderKind {
    Full,
    Delta(ClockRange),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub replica: ReplicaId,
    pub kind: HeaderKind,
    pub history: CausalHistory,
}

impl Header {
    /// Did the sender account for this dot?
    pub fn observed(&self, dot: &Dot) -> bool {
        self.history.observed(dot)
    }

    pub fn is_delta(&self) -> bool {
        matches!(self.kind, HeaderKind::Delta(_))
    }

    /// Highest own clock the sender may legitimately mention.
    fn own_bound(&self) -> Clock {
        match self.kind {
            HeaderKind::Full => self.history.clock(&self.replica),
            HeaderKind::Delta(range) => range.end,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub header: Header,
    pub elements: ElementMap,
}

impl Payload {
    pub fn new(header: Header, elements: ElementMap) -> Self {
        Self { header, elements }
    }

    pub fn sender(&self) -> &str {
        &self.header.replica
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.header.history.cloud().is_empty()
    }

    /// Check the sender's side of the merge contract.
    ///
    /// `local_replica`/`local_clock` identify the receiver: a payload may
    /// never claim more of the receiver's history than the receiver made.
    pub fn validate(&self, local_replica: &str, local_clock: Clock) -> Result<(), PayloadError> {
        let header = &self.header;

        if let HeaderKind::Delta(range) = header.kind {
            if range.start > range.end {
                return Err(PayloadError::InvertedRange {
                    start: range.start,
                    end: range.end,
                });
            }
            if !header.history.context().is_empty() {
                return Err(PayloadError::ContextInDelta);
            }
        }

        let bound = header.own_bound();
        let sender_dots = header
            .history
            .cloud()
            .iter()
            .chain(self.elements.keys())
            .filter(|dot| dot.is_from(&header.replica));
        for dot in sender_dots {
            if dot.clock > bound {
                return Err(PayloadError::DotBeyondClock {
                    dot: dot.clone(),
                    bound,
                });
            }
        }

        if let Some(dot) = self.elements.keys().find(|dot| !header.observed(dot)) {
            return Err(PayloadError::UnobservedElement { dot: dot.clone() });
        }

        let claimed = header
            .history
            .cloud()
            .iter()
            .filter(|dot| dot.is_from(local_replica))
            .map(|dot| dot.clock)
            .chain(std::iter::once(header.history.clock(local_replica)))
            .max()
            .unwrap_or(0);
        if claimed > local_clock {
            return Err(PayloadError::NonMonotonicContext {
                replica: local_replica.to_string(),
                local: local_clock,
                remote: claimed,
            });
        }

        Ok(())
    }
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // dot keys are not strings, so ship the map as a list of pairs
        #[derive(Serialize)]
        struct SerializablePayload<'a> {
            header: &'a Header,
            elements: Vec<(&'a Dot, &'a ElementData)>,
        }

        SerializablePayload {
            header: &self.header,
            elements: self.elements.iter().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct DeserializablePayload {
            header: Header,
            elements: Vec<(Dot, ElementData)>,
        }

        let payload = DeserializablePayload::deserialize(deserializer)?;
        Ok(Payload {
            header: payload.header,
            elements: payload.elements.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{empty_meta, OwnerId};
    use tracker_core::{CausalContext, DotCloud};

    fn data() -> ElementData {
        ElementData {
            owner: OwnerId::new("p1"),
            topic: "room".into(),
            key: "k".into(),
            meta: empty_meta(),
        }
    }

    fn full(replica: &str, context: &[(&str, Clock)], cloud: &[(&str, Clock)]) -> Header {
        Header {
            replica: replica.into(),
            kind: HeaderKind::Full,
            history: CausalHistory::from_parts(
                CausalContext::from_entries(context.iter().map(|(r, c)| (r.to_string(), *c))),
                cloud.iter().map(|(r, c)| Dot::new(*r, *c)).collect(),
            ),
        }
    }

    #[test]
    fn test_valid_full_payload() {
        let mut elements = ElementMap::new();
        elements.insert(Dot::new("b", 1), data());
        let payload = Payload::new(full("b", &[("b", 2)], &[]), elements);

        assert_eq!(payload.validate("a", 0), Ok(()));
    }

    #[test]
    fn test_rejects_unobserved_element() {
        let mut elements = ElementMap::new();
        elements.insert(Dot::new("c", 4), data());
        let payload = Payload::new(full("b", &[("b", 2)], &[]), elements);

        assert_eq!(
            payload.validate("a", 0),
            Err(PayloadError::UnobservedElement {
                dot: Dot::new("c", 4)
            })
        );
    }

    #[test]
    fn test_rejects_dot_beyond_sender_clock() {
        let payload = Payload::new(full("b", &[("b", 2)], &[("b", 5)]), ElementMap::new());

        assert_eq!(
            payload.validate("a", 0),
            Err(PayloadError::DotBeyondClock {
                dot: Dot::new("b", 5),
                bound: 2
            })
        );
    }

    #[test]
    fn test_rejects_context_in_delta() {
        let mut header = full("b", &[("b", 2)], &[]);
        header.kind = HeaderKind::Delta(ClockRange { start: 0, end: 2 });
        let payload = Payload::new(header, ElementMap::new());

        assert_eq!(payload.validate("a", 0), Err(PayloadError::ContextInDelta));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let header = Header {
            replica: "b".into(),
            kind: HeaderKind::Delta(ClockRange { start: 4, end: 2 }),
            history: CausalHistory::new(),
        };
        let payload = Payload::new(header, ElementMap::new());

        assert_eq!(
            payload.validate("a", 0),
            Err(PayloadError::InvertedRange { start: 4, end: 2 })
        );
    }

    #[test]
    fn test_rejects_claims_about_receiver_future() {
        let payload = Payload::new(full("b", &[("b", 1), ("a", 3)], &[]), ElementMap::new());

        assert_eq!(
            payload.validate("a", 2),
            Err(PayloadError::NonMonotonicContext {
                replica: "a".into(),
                local: 2,
                remote: 3
            })
        );
        assert_eq!(payload.validate("a", 3), Ok(()));
    }

    #[test]
    fn test_delta_dots_checked_against_range() {
        let header = Header {
            replica: "b".into(),
            kind: HeaderKind::Delta(ClockRange { start: 2, end: 3 }),
            history: CausalHistory::from_parts(
                CausalContext::new(),
                [Dot::new("b", 1), Dot::new("b", 3), Dot::new("b", 4)]
                    .into_iter()
                    .collect::<DotCloud>(),
            ),
        };
        let payload = Payload::new(header, ElementMap::new());

        assert_eq!(
            payload.validate("a", 0),
            Err(PayloadError::DotBeyondClock {
                dot: Dot::new("b", 4),
                bound: 3
            })
        );
    }

    #[test]
    fn test_payload_json_roundtrip() {
        let mut elements = ElementMap::new();
        elements.insert(Dot::new("b", 1), data());
        let payload = Payload::new(full("b", &[("b", 1)], &[]), elements);

        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, back);
    }
}
