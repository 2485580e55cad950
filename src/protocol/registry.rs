//! # Message Type Registry
//!
//! Maps stable wire identifiers to [`MessageTypeDescriptor`]s.
//!
//! The registry is populated at startup through `&mut self` batch registration
//! and then shared behind an `Arc`. Once shared it is read-only, so resolution
//! needs no locking.
//!
//! ```rust
//! use message_protocol::core::payload::{Payload, PayloadKind};
//! use message_protocol::protocol::message::*;
//! use message_protocol::protocol::registry::MessageRegistry;
//!
//! let mut registry = MessageRegistry::new();
//! registry
//!     .register([MessageTypeDescriptor::new(1, MessageCategory::Basic, PayloadKind::Text, HandlerKind::Echo)])
//!     .unwrap();
//! let envelope = registry.create_envelope(1, Payload::from("hello")).unwrap();
//! assert_eq!(envelope.type_id(), 1);
//! assert!(registry.resolve(99).is_err());
//! ```

use crate::core::payload::Payload;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{
    Envelope, MessageCatalog, MessageCategory, MessageType, MessageTypeDescriptor,
};
use crate::utils::metrics::ProtocolObserver;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, error, info};

/// Identifier-keyed table of message types
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    types: BTreeMap<u32, MessageTypeDescriptor>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from one batch
    pub fn with_descriptors<I>(batch: I) -> Result<Self>
    where
        I: IntoIterator<Item = MessageTypeDescriptor>,
    {
        let mut registry = Self::new();
        registry.register(batch)?;
        Ok(registry)
    }

    /// Register a batch of descriptors.
    ///
    /// All or nothing: if any id collides with an existing entry or with
    /// another entry of the same batch, nothing from the batch is registered.
    pub fn register<I>(&mut self, batch: I) -> Result<usize>
    where
        I: IntoIterator<Item = MessageTypeDescriptor>,
    {
        let batch: Vec<MessageTypeDescriptor> = batch.into_iter().collect();

        let mut seen = HashSet::with_capacity(batch.len());
        for descriptor in &batch {
            if self.types.contains_key(&descriptor.id) || !seen.insert(descriptor.id) {
                error!(
                    type_id = descriptor.id,
                    category = %descriptor.category,
                    "Duplicate message type identifier, batch rejected"
                );
                return Err(ProtocolError::DuplicateTypeIdentifier(descriptor.id));
            }
        }

        let added = batch.len();
        for descriptor in batch {
            debug!(descriptor = %descriptor, "Registered message type");
            self.types.insert(descriptor.id, descriptor);
        }

        info!(added, total = self.types.len(), "Message type batch registered");
        Ok(added)
    }

    /// Like [`register`](Self::register), and a rejected batch is also
    /// reported to `observer`
    pub fn register_observed<I>(&mut self, batch: I, observer: &dyn ProtocolObserver) -> Result<usize>
    where
        I: IntoIterator<Item = MessageTypeDescriptor>,
    {
        self.register(batch).inspect_err(|e| observer.on_error(e))
    }

    /// Register every descriptor of an application catalog as one batch
    pub fn register_catalog<T: MessageCatalog>(&mut self) -> Result<usize> {
        self.register(T::descriptors())
    }

    pub fn register_catalog_observed<T: MessageCatalog>(
        &mut self,
        observer: &dyn ProtocolObserver,
    ) -> Result<usize> {
        self.register_observed(T::descriptors(), observer)
    }

    pub fn resolve(&self, id: u32) -> Result<&MessageTypeDescriptor> {
        self.types
            .get(&id)
            .ok_or(ProtocolError::UnknownTypeIdentifier(id))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.types.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All descriptors, ordered by id
    pub fn descriptors(&self) -> impl Iterator<Item = &MessageTypeDescriptor> {
        self.types.values()
    }

    pub fn by_category(
        &self,
        category: MessageCategory,
    ) -> impl Iterator<Item = &MessageTypeDescriptor> {
        self.types.values().filter(move |d| d.category == category)
    }

    /// Build an envelope for a registered id
    pub fn create_envelope(&self, id: u32, payload: Payload) -> Result<Envelope> {
        let descriptor = self.resolve(id)?;
        Ok(Envelope::with_content(*descriptor, payload))
    }

    /// Build an envelope from a typed message handle.
    ///
    /// The handle's descriptor must match the registered one exactly.
    pub fn create_envelope_for<T: MessageType + ?Sized>(
        &self,
        message_type: &T,
        payload: Payload,
    ) -> Result<Envelope> {
        let wanted = message_type.descriptor();
        match self.types.get(&wanted.id) {
            Some(registered) if *registered == wanted => {
                Ok(Envelope::with_content(*registered, payload))
            }
            _ => Err(ProtocolError::UnknownTypeIdentifier(wanted.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::PayloadKind;
    use crate::protocol::message::HandlerKind;
    use crate::utils::metrics::Metrics;

    fn descriptor(id: u32, handler_kind: HandlerKind) -> MessageTypeDescriptor {
        MessageTypeDescriptor::new(id, MessageCategory::Basic, PayloadKind::Text, handler_kind)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = MessageRegistry::new();
        let d1 = descriptor(1, HandlerKind::Echo);
        assert_eq!(registry.register([d1]).unwrap(), 1);
        assert_eq!(registry.resolve(1).unwrap(), &d1);
        assert!(registry.contains(1));
        assert!(!registry.contains(2));
    }

    #[test]
    fn test_duplicate_within_batch_registers_nothing() {
        let mut registry = MessageRegistry::new();
        let err = registry
            .register([
                descriptor(5, HandlerKind::Echo),
                descriptor(6, HandlerKind::Echo),
                descriptor(5, HandlerKind::Error),
            ])
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateTypeIdentifier(5)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_across_batches_leaves_registry_unchanged() {
        let mut registry = MessageRegistry::new();
        registry.register([descriptor(1, HandlerKind::Echo)]).unwrap();
        let err = registry
            .register([descriptor(2, HandlerKind::Echo), descriptor(1, HandlerKind::Error)])
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateTypeIdentifier(1)));
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(2));
        assert_eq!(registry.resolve(1).unwrap().handler_kind, HandlerKind::Echo);
    }

    #[test]
    fn test_rejected_batch_reaches_observer() {
        let metrics = Metrics::new();
        let mut registry = MessageRegistry::new();
        registry
            .register_observed([descriptor(1, HandlerKind::Echo)], &metrics)
            .unwrap();
        assert_eq!(metrics.snapshot().duplicate_type_identifiers, 0);

        let err = registry
            .register_observed([descriptor(1, HandlerKind::Error)], &metrics)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateTypeIdentifier(1)));
        assert_eq!(metrics.snapshot().duplicate_type_identifiers, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let registry = MessageRegistry::new();
        assert!(matches!(
            registry.resolve(99),
            Err(ProtocolError::UnknownTypeIdentifier(99))
        ));
        assert!(matches!(
            registry.create_envelope(99, Payload::Empty),
            Err(ProtocolError::UnknownTypeIdentifier(99))
        ));
    }

    #[test]
    fn test_create_envelope_for_rejects_mismatched_descriptor() {
        let registry = MessageRegistry::with_descriptors([descriptor(1, HandlerKind::Echo)]).unwrap();
        let ok = registry
            .create_envelope_for(&descriptor(1, HandlerKind::Echo), Payload::from("x"))
            .unwrap();
        assert_eq!(ok.handler_kind(), HandlerKind::Echo);

        let err = registry
            .create_envelope_for(&descriptor(1, HandlerKind::Error), Payload::from("x"))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTypeIdentifier(1)));
    }

    #[test]
    fn test_by_category_and_ordering() {
        let registry = MessageRegistry::with_descriptors([
            MessageTypeDescriptor::new(30, MessageCategory::Auction, PayloadKind::Map, HandlerKind::Auction),
            descriptor(10, HandlerKind::Echo),
            MessageTypeDescriptor::new(20, MessageCategory::Auction, PayloadKind::Integer, HandlerKind::Auction),
        ])
        .unwrap();

        let ids: Vec<u32> = registry.descriptors().map(|d| d.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        let auction: Vec<u32> = registry
            .by_category(MessageCategory::Auction)
            .map(|d| d.id)
            .collect();
        assert_eq!(auction, vec![20, 30]);
    }
}
