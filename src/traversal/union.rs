use super::{detect_change, node, TypeInfo, VisitContext};
use crate::history::{Directive, History};
use crate::present::Payload;

/// Unions are diffed as a whole; members are not interpreted
#[derive(Debug)]
pub struct UnionTraversal {
    pub info: TypeInfo,
    pub member_count: usize,
    pub size: usize,
}

impl UnionTraversal {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives)
    }

    pub fn visit(
        &self,
        history: &mut History,
        label: &str,
        current: &[u8],
        previous: &[u8],
        cx: &mut VisitContext<'_>,
    ) -> bool {
        let Some(current) = current.get(..self.size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let changed = detect_change(history, current, previous.get(..self.size).unwrap_or(&[]), cx.now);
        cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unknown("union"));
        changed
    }
}
