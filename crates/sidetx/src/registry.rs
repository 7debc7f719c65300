//! Dispatch table from side msg kind to its handler pair, and from plain
//! msg method name to its handler.

use std::{collections::BTreeMap, sync::Arc};

use heimdall_state::msg::SideMsgKind;

use crate::{
    errors::RegistryError,
    handler::{MsgHandler, PostHandler, SideHandler},
};

#[derive(Clone)]
struct HandlerPair {
    side: Arc<dyn SideHandler>,
    post: Arc<dyn PostHandler>,
}

/// Collects handler registrations.  [`Self::build`] checks that every side
/// msg kind has exactly one pair.
#[derive(Default)]
pub struct SideTxRegistryBuilder {
    handlers: BTreeMap<SideMsgKind, HandlerPair>,
    msg_handlers: BTreeMap<&'static str, Arc<dyn MsgHandler>>,
    duplicate: Option<SideMsgKind>,
    bad_msg: Option<RegistryError>,
}

impl SideTxRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        kind: SideMsgKind,
        side: Arc<dyn SideHandler>,
        post: Arc<dyn PostHandler>,
    ) -> Self {
        if self
            .handlers
            .insert(kind, HandlerPair { side, post })
            .is_some()
        {
            self.duplicate.get_or_insert(kind);
        }
        self
    }

    /// Registers the handler of a msg that executes without votes.
    pub fn register_msg(mut self, method_name: &'static str, handler: Arc<dyn MsgHandler>) -> Self {
        if SideMsgKind::from_method_name(method_name).is_some() {
            self.bad_msg
                .get_or_insert(RegistryError::SideMsgAsPlain(method_name));
        } else if self.msg_handlers.insert(method_name, handler).is_some() {
            self.bad_msg
                .get_or_insert(RegistryError::DuplicateMsgHandler(method_name));
        }
        self
    }

    pub fn build(self) -> Result<SideTxRegistry, RegistryError> {
        if let Some(kind) = self.duplicate {
            return Err(RegistryError::DuplicateHandlers(kind));
        }

        if let Some(err) = self.bad_msg {
            return Err(err);
        }

        let missing: Vec<_> = SideMsgKind::ALL
            .into_iter()
            .filter(|k| !self.handlers.contains_key(k))
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingHandlers(missing));
        }

        Ok(SideTxRegistry {
            handlers: self.handlers,
            msg_handlers: self.msg_handlers,
        })
    }
}

/// Complete handler table.  Lookups have no side effects.
#[derive(Clone)]
pub struct SideTxRegistry {
    handlers: BTreeMap<SideMsgKind, HandlerPair>,
    msg_handlers: BTreeMap<&'static str, Arc<dyn MsgHandler>>,
}

impl SideTxRegistry {
    pub fn builder() -> SideTxRegistryBuilder {
        SideTxRegistryBuilder::new()
    }

    /// Side handler for a method name.  `None` means the message never goes
    /// through side-tx voting.
    pub fn side_handler_for(&self, method_name: &str) -> Option<&Arc<dyn SideHandler>> {
        let kind = SideMsgKind::from_method_name(method_name)?;
        self.side_handler(kind)
    }

    /// Post handler for a method name.  `None` means the message never goes
    /// through side-tx voting.
    pub fn post_handler_for(&self, method_name: &str) -> Option<&Arc<dyn PostHandler>> {
        let kind = SideMsgKind::from_method_name(method_name)?;
        self.post_handler(kind)
    }

    pub fn side_handler(&self, kind: SideMsgKind) -> Option<&Arc<dyn SideHandler>> {
        self.handlers.get(&kind).map(|p| &p.side)
    }

    pub fn post_handler(&self, kind: SideMsgKind) -> Option<&Arc<dyn PostHandler>> {
        self.handlers.get(&kind).map(|p| &p.post)
    }

    /// Handler for a msg that executes without votes.  `None` for side msgs
    /// and for msgs no module handles.
    pub fn msg_handler_for(&self, method_name: &str) -> Option<&Arc<dyn MsgHandler>> {
        self.msg_handlers.get(method_name)
    }
}
