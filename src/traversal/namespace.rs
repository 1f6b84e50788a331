use std::rc::Rc;

use super::{node, Traversal, TypeInfo, VisitContext};
use crate::history::{join, Directive, History, HistoryState};
use crate::present::Payload;

/// Zero-size fan-out over named children
///
/// The surface's filter hides non-matching children; nested namespaces are
/// always walked so their own matches stay reachable.
#[derive(Debug)]
pub struct NamespaceTraversal {
    pub info: TypeInfo,
    pub children: Vec<(String, Rc<Traversal>)>,
}

impl NamespaceTraversal {
    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        let children = self
            .children
            .iter()
            .map(|(name, _)| (name.clone(), join(path, name)))
            .collect();
        History::new(path, self.info.id, directives).with_state(HistoryState::Namespace { children })
    }

    pub fn visit(&self, history: &mut History, label: &str, cx: &mut VisitContext<'_>) -> bool {
        let expansion = cx.open(
            &node(history, label, &self.info.name, cx.now),
            Payload::Children(self.children.len()),
        );
        if !expansion.walks_children() {
            return false;
        }

        let filter = cx.filter(history.path());
        let mut changed = false;
        if let HistoryState::Namespace { children } = &history.state {
            for ((name, path), (_, traversal)) in children.iter().zip(&self.children) {
                let nested = matches!(**traversal, Traversal::Namespace(_));
                if let Some(filter) = filter.as_deref().filter(|_| !nested) {
                    if !name.to_lowercase().contains(filter) {
                        continue;
                    }
                }
                changed |= cx.visit_child(path, name, traversal, 0, &[], &[], &[]);
            }
        }
        cx.close(expansion);
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{PrimitiveKind, SchemaBuilder, TypeKind};
    use crate::traversal::testing::Fixture;

    fn fixture() -> Fixture {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::U8);
        let hp = b.add("hp", TypeKind::Global { ty: int, address: 0 });
        let mp = b.add("mp", TypeKind::Global { ty: int, address: 1 });
        let max_hp = b.add("max_hp", TypeKind::Global { ty: int, address: 2 });
        let player = b.add(
            "player",
            TypeKind::Namespace {
                children: vec![
                    ("hp".into(), hp),
                    ("mp".into(), mp),
                    ("MAX_HP".into(), max_hp),
                ],
            },
        );
        let root = b.add("root", TypeKind::Namespace { children: vec![("player".into(), player)] });
        Fixture::new(b.build(root).unwrap(), 0, vec![10, 20, 30])
    }

    #[test]
    fn test_filter_by_substring() {
        let mut fx = fixture();
        fx.surface.set_global_filter("hp");
        let rows = fx.prime(0);
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["root", "root/player", "root/player/hp", "root/player/MAX_HP"]
        );
    }

    #[test]
    fn test_collapsed_namespace_skips_children() {
        let mut fx = fixture();
        fx.surface.collapse("root/player");
        let rows = fx.prime(0);
        assert_eq!(rows.len(), 2);
        assert!(fx.store.peek("root/player/hp").is_none());
    }

    #[test]
    fn test_expand_all_walks_collapsed_silently() {
        let mut fx = fixture();
        fx.surface.collapse("root/player");
        fx.expand_all = true;
        let rows = fx.prime(0);
        assert_eq!(rows.len(), 2);
        assert_eq!(fx.store.peek("root/player/mp").unwrap().integer_value(), Some(20));
    }
}
