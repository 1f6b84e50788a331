use std::rc::Rc;

use super::{node, Builder, Traversal, TraversalError, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryStore};
use crate::present::Payload;

/// Named alias, transparent over its target
#[derive(Debug)]
pub struct AliasTraversal {
    pub info: TypeInfo,
    target: Rc<Traversal>,
}

impl AliasTraversal {
    pub fn new(info: TypeInfo, target: Rc<Traversal>) -> Self {
        Self { info, target }
    }

    pub fn target(&self) -> &Rc<Traversal> {
        &self.target
    }

    pub fn size(&self, history: &History, store: &HistoryStore) -> usize {
        self.target.size(history, store)
    }

    pub fn static_size(&self) -> usize {
        self.target.static_size()
    }

    pub fn construct_history(
        &self,
        path: &str,
        directives: Vec<Directive>,
        builder: &mut Builder<'_>,
    ) -> Result<History, TraversalError> {
        Ok(self
            .target
            .construct_history(path, directives, builder)?
            .owned_by(self.info.id))
    }

    pub fn visit(
        &self,
        history: &mut History,
        label: &str,
        address: u64,
        current: &[u8],
        previous: &[u8],
        cx: &mut VisitContext<'_>,
    ) -> bool {
        self.target.visit(history, label, address, current, previous, cx)
    }
}

/// Terminal leaf for types the schema does not describe
#[derive(Debug)]
pub struct PlaceholderTraversal {
    pub info: TypeInfo,
}

impl PlaceholderTraversal {
    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives)
    }

    pub fn visit(&self, history: &mut History, label: &str, cx: &mut VisitContext<'_>) -> bool {
        cx.leaf(
            &node(history, label, &self.info.name, cx.now),
            Payload::Unknown("unknown type"),
        );
        false
    }
}
