//! # Dispatcher
//!
//! Routes decoded envelopes to the [`MessageHandler`] registered for their
//! [`HandlerKind`].
//!
//! Handlers are registered during startup, each as a factory that runs at most
//! once, on first dispatch. The built instance is then shared by every
//! connection, so per-connection state travels in the context value `C`.

use crate::error::{ProtocolError, Result};
use crate::protocol::message::{Envelope, HandlerKind};
use crate::protocol::registry::MessageRegistry;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Processes envelopes of one [`HandlerKind`].
///
/// One instance serves every connection, so any state a handler keeps is
/// shared and must be synchronized by the handler; connection state belongs
/// in the per-call context `C`.
pub trait MessageHandler<C>: Send + Sync {
    fn handle(&self, ctx: &C, envelope: Envelope) -> Result<()>;
}

impl<C, F> MessageHandler<C> for F
where
    F: Fn(&C, Envelope) -> Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &C, envelope: Envelope) -> Result<()> {
        self(ctx, envelope)
    }
}

type HandlerFactory<C> = dyn Fn() -> Arc<dyn MessageHandler<C>> + Send + Sync;

struct HandlerSlot<C: 'static> {
    factory: Box<HandlerFactory<C>>,
    instance: OnceCell<Arc<dyn MessageHandler<C>>>,
}

impl<C: 'static> HandlerSlot<C> {
    fn get(&self, kind: HandlerKind) -> &Arc<dyn MessageHandler<C>> {
        self.instance.get_or_init(|| {
            debug!(handler = %kind, "Constructing handler instance");
            (self.factory)()
        })
    }
}

/// Routes envelopes to handlers by handler kind.
///
/// Handlers are registered as factories during startup and built lazily, once,
/// on first dispatch. After registration the dispatcher is shared read-only
/// behind an `Arc`.
pub struct Dispatcher<C: 'static> {
    registry: Arc<MessageRegistry>,
    handlers: HashMap<HandlerKind, HandlerSlot<C>>,
}

impl<C: 'static> Dispatcher<C> {
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    /// Register a handler factory for `kind`. The factory runs at most once.
    pub fn register_factory<F>(&mut self, kind: HandlerKind, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn MessageHandler<C>> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(&kind) {
            return Err(ProtocolError::DuplicateHandlerKind(kind));
        }
        self.handlers.insert(
            kind,
            HandlerSlot {
                factory: Box::new(factory),
                instance: OnceCell::new(),
            },
        );
        debug!(handler = %kind, "Handler registered");
        Ok(())
    }

    /// Register an already constructed handler for `kind`
    pub fn register<H>(&mut self, kind: HandlerKind, handler: H) -> Result<()>
    where
        H: MessageHandler<C> + 'static,
    {
        let handler: Arc<dyn MessageHandler<C>> = Arc::new(handler);
        self.register_factory(kind, move || handler.clone())
    }

    pub fn has_handler(&self, kind: HandlerKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Whether the handler for `kind` has been constructed yet
    pub fn is_instantiated(&self, kind: HandlerKind) -> bool {
        self.handlers
            .get(&kind)
            .is_some_and(|slot| slot.instance.get().is_some())
    }

    /// Invoke the handler for `envelope` on the calling thread.
    ///
    /// Handler errors are returned unmodified.
    #[instrument(level = "trace", skip_all, fields(type_id = envelope.type_id()))]
    pub fn dispatch(&self, ctx: &C, envelope: Envelope) -> Result<()> {
        let descriptor = *envelope.descriptor();
        match self.registry.resolve(descriptor.id) {
            Ok(registered) if *registered == descriptor => {}
            _ => return Err(ProtocolError::UnknownTypeIdentifier(descriptor.id)),
        }

        let kind = descriptor.handler_kind;
        let slot = self
            .handlers
            .get(&kind)
            .ok_or(ProtocolError::HandlerNotFound(kind))?;

        slot.get(kind).handle(ctx, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::{Payload, PayloadKind};
    use crate::protocol::message::{MessageCategory, MessageTypeDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ECHO: MessageTypeDescriptor = MessageTypeDescriptor::new(
        1,
        MessageCategory::Basic,
        PayloadKind::Text,
        HandlerKind::Echo,
    );
    const ERROR: MessageTypeDescriptor = MessageTypeDescriptor::new(
        2,
        MessageCategory::System,
        PayloadKind::Text,
        HandlerKind::Error,
    );

    fn registry() -> Arc<MessageRegistry> {
        Arc::new(MessageRegistry::with_descriptors([ECHO, ERROR]).unwrap())
    }

    #[test]
    fn test_dispatch_passes_context_and_envelope() {
        let mut dispatcher: Dispatcher<Mutex<Vec<String>>> = Dispatcher::new(registry());
        dispatcher
            .register(HandlerKind::Echo, |ctx: &Mutex<Vec<String>>, env: Envelope| -> Result<()> {
                let text = env.content().and_then(Payload::as_text).unwrap_or_default();
                ctx.lock().unwrap().push(text.to_string());
                Ok(())
            })
            .unwrap();

        let ctx = Mutex::new(Vec::new());
        dispatcher
            .dispatch(&ctx, Envelope::with_content(ECHO, Payload::from("hello")))
            .unwrap();
        assert_eq!(*ctx.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_handler_not_found() {
        let dispatcher: Dispatcher<()> = Dispatcher::new(registry());
        let err = dispatcher
            .dispatch(&(), Envelope::with_content(ERROR, Payload::from("x")))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::HandlerNotFound(HandlerKind::Error)));
    }

    #[test]
    fn test_unregistered_type_rejected() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry());
        dispatcher
            .register(HandlerKind::Echo, |_: &(), _: Envelope| -> Result<()> { Ok(()) })
            .unwrap();
        let stray = MessageTypeDescriptor::new(
            77,
            MessageCategory::Debug,
            PayloadKind::Text,
            HandlerKind::Echo,
        );
        let err = dispatcher
            .dispatch(&(), Envelope::with_content(stray, Payload::from("x")))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTypeIdentifier(77)));
    }

    #[test]
    fn test_handler_error_propagates_unmodified() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry());
        dispatcher
            .register(HandlerKind::Error, |_: &(), _: Envelope| -> Result<()> {
                Err(ProtocolError::DecodingFailure("sub-payload".into()))
            })
            .unwrap();
        let err = dispatcher
            .dispatch(&(), Envelope::with_content(ERROR, Payload::from("x")))
            .unwrap_err();
        match err {
            ProtocolError::DecodingFailure(msg) => assert_eq!(msg, "sub-payload"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_factory_runs_once_and_lazily() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry());
        let counter = built.clone();
        dispatcher
            .register_factory(HandlerKind::Echo, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(|_: &(), _: Envelope| -> Result<()> { Ok(()) })
            })
            .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(!dispatcher.is_instantiated(HandlerKind::Echo));

        for _ in 0..3 {
            dispatcher
                .dispatch(&(), Envelope::with_content(ECHO, Payload::from("x")))
                .unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_instantiated(HandlerKind::Echo));
    }

    #[test]
    fn test_duplicate_handler_kind() {
        let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry());
        dispatcher
            .register(HandlerKind::Echo, |_: &(), _: Envelope| -> Result<()> { Ok(()) })
            .unwrap();
        let err = dispatcher
            .register(HandlerKind::Echo, |_: &(), _: Envelope| -> Result<()> { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateHandlerKind(HandlerKind::Echo)));
    }
}
