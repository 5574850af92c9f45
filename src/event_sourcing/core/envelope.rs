use serde::{Deserialize, Serialize};

use super::payload::Payload;
use super::registry::TypeRegistry;
use crate::event_sourcing::errors::{PersistenceError, Result};

// ============================================================================
// Message Envelope - Self-describing storage format
// ============================================================================
//
// Every stored row carries a JSON object of the shape
//
//     { "type": "<registered type name>", "payload": <type-specific body> }
//
// The tag selects the decoder from the type registry on the way back.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub type_name: String,
    pub payload: serde_json::Value,
}

// ============================================================================
// Envelope Codec
// ============================================================================

/// Converts payloads to envelopes and back using a type registry.
#[derive(Clone, Copy, Debug)]
pub struct EnvelopeCodec {
    registry: &'static TypeRegistry,
}

impl EnvelopeCodec {
    pub fn new(registry: &'static TypeRegistry) -> Self {
        Self { registry }
    }

    /// Codec over the process-wide registry.
    pub fn global() -> Result<Self> {
        Ok(Self::new(super::registry::global()?))
    }

    pub fn registry(&self) -> &'static TypeRegistry {
        self.registry
    }

    /// Wrap a payload into an envelope. Unregistered types are rejected here so
    /// that nothing undecodable reaches the store.
    pub fn encode_value(&self, payload: &dyn Payload) -> Result<serde_json::Value> {
        let type_name = payload.payload_type();
        if !self.registry.contains(type_name) {
            return Err(PersistenceError::Encoding {
                type_name: type_name.to_string(),
                reason: "type is not registered".to_string(),
            });
        }

        let body = payload.to_body().map_err(|e| PersistenceError::Encoding {
            type_name: type_name.to_string(),
            reason: e.to_string(),
        })?;

        let envelope = MessageEnvelope {
            type_name: type_name.to_string(),
            payload: body,
        };

        serde_json::to_value(&envelope).map_err(|e| PersistenceError::Encoding {
            type_name: type_name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn encode(&self, payload: &dyn Payload) -> Result<Vec<u8>> {
        let value = self.encode_value(payload)?;
        serde_json::to_vec(&value).map_err(|e| PersistenceError::Encoding {
            type_name: payload.payload_type().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn decode_value(&self, value: serde_json::Value) -> Result<Box<dyn Payload>> {
        let envelope: MessageEnvelope =
            serde_json::from_value(value).map_err(PersistenceError::InvalidEnvelope)?;
        self.open(envelope)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Payload>> {
        let envelope: MessageEnvelope =
            serde_json::from_slice(bytes).map_err(PersistenceError::InvalidEnvelope)?;
        self.open(envelope)
    }

    fn open(&self, envelope: MessageEnvelope) -> Result<Box<dyn Payload>> {
        let decode = self
            .registry
            .resolve(&envelope.type_name)
            .ok_or_else(|| PersistenceError::UnknownType(envelope.type_name.clone()))?;

        decode(envelope.payload).map_err(|source| PersistenceError::Decoding {
            type_name: envelope.type_name,
            source,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::payload::PersistentMessage;
    use std::collections::BTreeMap;
    use std::sync::OnceLock;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct ItemAdded {
        sku: String,
        quantity: u32,
        tags: Vec<String>,
        attributes: BTreeMap<String, String>,
        note: Option<String>,
    }

    impl PersistentMessage for ItemAdded {
        fn type_name() -> &'static str { "cart.ItemAdded" }
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    #[serde(tag = "kind", content = "data")]
    enum CartStatus {
        Open,
        CheckedOut { order_ref: String },
    }

    impl PersistentMessage for CartStatus {
        fn type_name() -> &'static str { "cart.Status" }
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct NeverRegistered {
        value: i64,
    }

    impl PersistentMessage for NeverRegistered {
        fn type_name() -> &'static str { "cart.NeverRegistered" }
    }

    fn codec() -> EnvelopeCodec {
        static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
        let registry = REGISTRY.get_or_init(|| {
            TypeRegistry::builder()
                .register::<ItemAdded>()
                .register::<CartStatus>()
                .build()
        });
        EnvelopeCodec::new(registry)
    }

    fn item() -> ItemAdded {
        ItemAdded {
            sku: "SKU-42".to_string(),
            quantity: 3,
            tags: vec!["gift".to_string(), "fragile".to_string()],
            attributes: BTreeMap::from([("color".to_string(), "red".to_string())]),
            note: None,
        }
    }

    #[test]
    fn test_envelope_wire_format() {
        let value = codec().encode_value(&item()).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["type"], "cart.ItemAdded");
        assert_eq!(object["payload"]["sku"], "SKU-42");
        assert_eq!(object["payload"]["quantity"], 3);
    }

    #[test]
    fn test_round_trip_struct() {
        let original = item();
        let bytes = codec().encode(&original).unwrap();
        let decoded = codec().decode(&bytes).unwrap();

        assert_eq!(decoded.payload_type(), "cart.ItemAdded");
        assert_eq!(decoded.downcast_ref::<ItemAdded>(), Some(&original));
    }

    #[test]
    fn test_round_trip_enum_variants() {
        for original in [
            CartStatus::Open,
            CartStatus::CheckedOut { order_ref: "ord-9".to_string() },
        ] {
            let value = codec().encode_value(&original).unwrap();
            let decoded = codec().decode_value(value).unwrap();
            assert_eq!(decoded.downcast_ref::<CartStatus>(), Some(&original));
        }
    }

    #[test]
    fn test_encode_rejects_unregistered_type() {
        let err = codec().encode(&NeverRegistered { value: 1 }).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Encoding { ref type_name, .. } if type_name == "cart.NeverRegistered"
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let bytes = br#"{"type":"cart.Vanished","payload":{"value":1}}"#;
        let err = codec().decode(bytes).unwrap_err();
        assert!(matches!(err, PersistenceError::UnknownType(ref t) if t == "cart.Vanished"));
    }

    #[test]
    fn test_decode_malformed_body() {
        let bytes = br#"{"type":"cart.ItemAdded","payload":{"sku":17}}"#;
        let err = codec().decode(bytes).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Decoding { ref type_name, .. } if type_name == "cart.ItemAdded"
        ));
    }

    #[test]
    fn test_decode_malformed_envelope() {
        let err = codec().decode(b"not json at all").unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidEnvelope(_)));

        let err = codec()
            .decode_value(serde_json::json!({ "payload": {} }))
            .unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidEnvelope(_)));
    }
}
