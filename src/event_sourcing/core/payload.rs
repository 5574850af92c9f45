use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::fmt::Debug;

// ============================================================================
// Persistent Message Trait
// ============================================================================
//
// Every event or snapshot type that goes through the journal implements
// `PersistentMessage`. The type name is the tag written into the envelope and
// looked up in the type registry on the way back.
//
// ============================================================================

/// A typed event or snapshot that can be stored.
///
/// `type_name()` must be stable across releases: it is written into every
/// stored row.
pub trait PersistentMessage: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    fn type_name() -> &'static str
    where
        Self: Sized;
}

// ============================================================================
// Type-erased Payload
// ============================================================================

/// Object-safe view of a `PersistentMessage`.
///
/// The provider and the host exchange `dyn Payload` values; callers recover the
/// concrete type with `downcast_ref` / `downcast`.
pub trait Payload: Debug + Send + Sync {
    /// Tag written into the envelope.
    fn payload_type(&self) -> &'static str;

    fn to_body(&self) -> serde_json::Result<serde_json::Value>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: PersistentMessage> Payload for T {
    fn payload_type(&self) -> &'static str {
        T::type_name()
    }

    fn to_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

// Borrowed views work on any `&dyn Payload`, not only `'static` ones.
impl dyn Payload + '_ {
    pub fn is<T: PersistentMessage>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: PersistentMessage>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl dyn Payload {
    /// Take ownership of the concrete value, or hand the payload back unchanged.
    pub fn downcast<T: PersistentMessage>(self: Box<Self>) -> Result<Box<T>, Box<dyn Payload>> {
        if self.is::<T>() {
            match self.into_any().downcast::<T>() {
                Ok(value) => Ok(value),
                // `is::<T>` was checked above
                Err(_) => unreachable!("payload type changed during downcast"),
            }
        } else {
            Err(self)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Pinged {
        count: u32,
    }

    impl PersistentMessage for Pinged {
        fn type_name() -> &'static str { "test.Pinged" }
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Ponged;

    impl PersistentMessage for Ponged {
        fn type_name() -> &'static str { "test.Ponged" }
    }

    #[test]
    fn test_payload_type_comes_from_message() {
        let payload: Box<dyn Payload> = Box::new(Pinged { count: 3 });
        assert_eq!(payload.payload_type(), "test.Pinged");
        assert_eq!(payload.to_body().unwrap(), serde_json::json!({ "count": 3 }));
    }

    #[test]
    fn test_downcast_ref() {
        let payload: Box<dyn Payload> = Box::new(Pinged { count: 1 });
        assert!(payload.is::<Pinged>());
        assert_eq!(payload.downcast_ref::<Pinged>(), Some(&Pinged { count: 1 }));
        assert!(payload.downcast_ref::<Ponged>().is_none());
    }

    fn count_through_borrow(payload: &dyn Payload) -> Option<u32> {
        payload.downcast_ref::<Pinged>().map(|p| p.count)
    }

    #[test]
    fn test_downcast_ref_through_borrowed_payload() {
        let pinged = Pinged { count: 4 };
        let borrowed: &dyn Payload = &pinged;
        assert!(borrowed.is::<Pinged>());
        assert_eq!(count_through_borrow(&pinged), Some(4));
        assert_eq!(count_through_borrow(&Ponged), None);
    }

    #[test]
    fn test_downcast_hands_back_on_mismatch() {
        let payload: Box<dyn Payload> = Box::new(Pinged { count: 7 });
        let payload = payload.downcast::<Ponged>().unwrap_err();
        let pinged = payload.downcast::<Pinged>().unwrap();
        assert_eq!(*pinged, Pinged { count: 7 });
    }
}
