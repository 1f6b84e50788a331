use std::rc::Rc;

use super::{Builder, Traversal, TraversalError, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryStore};

/// Variable at a fixed absolute address
///
/// Transparent over its inner type: the record is the inner type's record
/// re-owned by the global, and a visit reads the value synchronously before
/// handing it to the inner traversal.
#[derive(Debug)]
pub struct GlobalTraversal {
    pub info: TypeInfo,
    pub inner: Rc<Traversal>,
    pub address: u64,
}

impl GlobalTraversal {
    pub fn size(&self, history: &History, store: &HistoryStore) -> usize {
        self.inner.size(history, store)
    }

    pub fn static_size(&self) -> usize {
        self.inner.static_size()
    }

    pub fn construct_history(
        &self,
        path: &str,
        directives: Vec<Directive>,
        builder: &mut Builder<'_>,
    ) -> Result<History, TraversalError> {
        Ok(self
            .inner
            .construct_history(path, directives, builder)?
            .owned_by(self.info.id))
    }

    pub fn visit(&self, history: &mut History, label: &str, cx: &mut VisitContext<'_>) -> bool {
        history.set_address(self.address);
        let size = self.inner.size(history, cx.history);
        cx.targets.push(self.address);
        let changed = cx.with_snapshot(self.address, size, |cx, current, previous| {
            self.inner
                .visit(history, label, self.address, current, previous, cx)
        });
        cx.targets.pop();
        changed
    }
}
