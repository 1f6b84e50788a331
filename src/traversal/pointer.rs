use super::{detect_change, node, read_uint, TypeInfo, VisitContext};
use crate::history::{join, Directive, History, HistoryState};
use crate::present::{Node, Payload};
use crate::schema::TypeId;

/// Data pointer; the pointee is walked at `<path>/*` when expanded
#[derive(Debug)]
pub struct PointerTraversal {
    pub info: TypeInfo,
    /// Resolved on first dereference so recursive types terminate
    pub target: TypeId,
    pub width: usize,
}

impl PointerTraversal {
    pub fn size(&self) -> usize {
        self.width
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives).with_state(HistoryState::Pointer {
            target_path: join(path, "*"),
            last_target: None,
        })
    }

    pub fn visit(
        &self,
        history: &mut History,
        label: &str,
        current: &[u8],
        previous: &[u8],
        cx: &mut VisitContext<'_>,
    ) -> bool {
        let Some(current) = current.get(..self.width) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let mut changed =
            detect_change(history, current, previous.get(..self.width).unwrap_or(&[]), cx.now);

        let target = read_uint(current);
        if let HistoryState::Pointer { last_target, .. } = &mut history.state {
            *last_target = Some(target);
        }
        let target_path = match &history.state {
            HistoryState::Pointer { target_path, .. } => target_path.clone(),
            _ => join(history.path(), "*"),
        };
        let payload = Payload::Pointer {
            address: target,
            symbol: cx.schema.symbolize(target),
        };

        if target == 0 {
            cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
            return changed;
        }
        let pointee = match cx.registry.get(cx.schema, self.target, cx.config) {
            Ok(pointee) => pointee,
            Err(e) => {
                cx.tracer.debug(format_args!("{}: {}", history.path(), e));
                cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
                return changed;
            }
        };

        let header = Node {
            on_demand: true,
            ..node(history, label, &self.info.name, cx.now)
        };
        let expansion = cx.open(&header, payload);
        if !expansion.walks_children() {
            return changed;
        }

        if cx.targets.contains(&target) {
            cx.tracer
                .debug(format_args!("{}: cycle back to {:#x}", history.path(), target));
            let cycle = Node {
                path: &target_path,
                label: "*",
                type_name: pointee.type_name(),
                address: target,
                age: None,
                fresh: false,
                on_demand: false,
            };
            cx.leaf(&cycle, Payload::Unknown("cycle"));
            cx.close(expansion);
            return changed;
        }

        let size = pointee.size_at(&target_path, cx.history);
        cx.targets.push(target);
        changed |= cx.with_snapshot(target, size, |cx, current, previous| {
            cx.visit_child(&target_path, "*", &pointee, target, current, previous, &[])
        });
        cx.targets.pop();
        cx.close(expansion);
        changed
    }
}

/// Code pointer, shown with its symbol
#[derive(Debug)]
pub struct FunctionPointerTraversal {
    pub info: TypeInfo,
    pub width: usize,
}

impl FunctionPointerTraversal {
    pub fn size(&self) -> usize {
        self.width
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives)
            .with_state(HistoryState::Scalar { last_value: None })
    }

    pub fn visit(
        &self,
        history: &mut History,
        label: &str,
        current: &[u8],
        previous: &[u8],
        cx: &mut VisitContext<'_>,
    ) -> bool {
        let Some(current) = current.get(..self.width) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let changed =
            detect_change(history, current, previous.get(..self.width).unwrap_or(&[]), cx.now);
        let target = read_uint(current);
        history.state = HistoryState::Scalar {
            last_value: Some(target),
        };
        let payload = Payload::Pointer {
            address: target,
            symbol: cx.schema.symbolize(target),
        };
        cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
        changed
    }
}
