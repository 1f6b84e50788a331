use std::rc::Rc;

use super::{
    child_window, detect_change, node, Builder, Traversal, TraversalError, TypeInfo, VisitContext,
};
use crate::history::{join, Directive, History, HistoryState, HistoryStore, MemberSlot};
use crate::present::Payload;

/// Declared member of a struct type
#[derive(Debug)]
pub struct StructMember {
    pub name: String,
    pub offset: Option<usize>,
    pub traversal: Rc<Traversal>,
}

#[derive(Debug)]
pub struct StructTraversal {
    pub info: TypeInfo,
    pub members: Vec<StructMember>,
    /// Declared size; computed from the member layout when absent
    pub size: Option<usize>,
}

impl StructTraversal {
    pub fn size(&self, history: &History, store: &HistoryStore) -> usize {
        if let Some(size) = self.size {
            return size;
        }
        let HistoryState::Struct { members } = &history.state else {
            return self.static_size();
        };
        let mut end = 0;
        let mut cursor = 0;
        for slot in members {
            let start = slot.offset.unwrap_or(cursor);
            cursor = start + slot.traversal.size_at(&slot.path, store);
            end = end.max(cursor);
        }
        end
    }

    pub fn static_size(&self) -> usize {
        if let Some(size) = self.size {
            return size;
        }
        let mut end = 0;
        let mut cursor = 0;
        for member in &self.members {
            let start = member.offset.unwrap_or(cursor);
            cursor = start + member.traversal.static_size();
            end = end.max(cursor);
        }
        end
    }

    /// Lay out member slots, applying directives aimed at direct members
    /// and forwarding longer ones to the member they start with.
    pub fn construct_history(
        &self,
        path: &str,
        directives: Vec<Directive>,
        builder: &mut Builder<'_>,
    ) -> Result<History, TraversalError> {
        let mut slots = Vec::with_capacity(self.members.len());
        let mut matched = vec![false; directives.len()];

        for member in &self.members {
            let mut traversal = member.traversal.clone();
            let mut forwarded = Vec::new();

            for (i, directive) in directives.iter().enumerate() {
                let (head, rest) = directive.split_first();
                if head != member.name {
                    continue;
                }
                matched[i] = true;
                match rest {
                    Some(rest) => forwarded.push(rest),
                    None => match builder.traversal(directive.retype) {
                        Ok(retyped) => traversal = retyped,
                        Err(e) => builder.tracer.warn(format_args!(
                            "{}/{}: cannot retype: {}",
                            path, member.name, e
                        )),
                    },
                }
            }

            slots.push(MemberSlot {
                name: member.name.clone(),
                path: join(path, &member.name),
                offset: member.offset,
                traversal,
                directives: forwarded,
            });
        }

        for (directive, _) in directives.iter().zip(&matched).filter(|(_, m)| !**m) {
            builder.tracer.warn(format_args!(
                "{}: directive target '{}' matches no member",
                path, directive.target
            ));
        }

        Ok(History::new(path, self.info.id, directives)
            .with_state(HistoryState::Struct { members: slots }))
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
        let size = self.size(history, cx.history);
        let Some(current) = current.get(..size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let previous = previous.get(..size).unwrap_or(&[]);
        let mut changed = detect_change(history, current, previous, cx.now);

        let HistoryState::Struct { members } = &history.state else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unknown("no layout"));
            return changed;
        };
        let expansion = cx.open(
            &node(history, label, &self.info.name, cx.now),
            Payload::Children(members.len()),
        );
        if !expansion.walks_children() {
            return changed;
        }

        let mut cursor = 0;
        for slot in members {
            let start = slot.offset.unwrap_or(cursor);
            let len = slot.traversal.size_at(&slot.path, cx.history);
            let (member_address, current, previous) =
                child_window(address, start, len, current, previous);
            changed |= cx.visit_child(
                &slot.path,
                &slot.name,
                &slot.traversal,
                member_address,
                current,
                previous,
                &slot.directives,
            );
            cursor = start + slot.traversal.size_at(&slot.path, cx.history);
        }
        cx.close(expansion);
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::history::{Directive, HistoryState};
    use crate::schema::{Member, PrimitiveKind, SchemaBuilder, TypeKind};
    use crate::traversal::testing::{row, Fixture};

    #[test]
    fn test_members_laid_out_and_diffed() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::I32);
        let short = b.primitive(PrimitiveKind::U16);
        let s = b.add(
            "pair",
            TypeKind::Struct {
                members: vec![Member::new("a", int), Member::at("b", short, 6)],
                size: Some(8),
            },
        );
        let g = b.add("g", TypeKind::Global { ty: s, address: 0x40 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("p".into(), g)] });

        let mut data = 1i32.to_le_bytes().to_vec();
        data.extend([0, 0, 2, 0]);
        let mut fx = Fixture::new(b.build(root).unwrap(), 0x40, data);
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/p/a").value, "1");
        assert_eq!(row(&rows, "root/p/b").value, "2 (0x2)");
        assert_eq!(row(&rows, "root/p/b").address, 0x46);
        assert_eq!(row(&rows, "root/p/b").depth, 2);

        // Padding bytes change the struct but no member
        fx.write(0x44, &[9]);
        let rows = fx.render(5);
        assert!(row(&rows, "root/p").fresh);
        assert!(!row(&rows, "root/p/a").fresh);
        assert!(!row(&rows, "root/p/b").fresh);
    }

    #[test]
    fn test_nested_directive_reaches_grandchild() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::U32);
        let float = b.primitive(PrimitiveKind::F32);
        let inner = b.add(
            "inner",
            TypeKind::Struct {
                members: vec![Member::new("bar", int), Member::new("baz", int)],
                size: None,
            },
        );
        let outer = b.add(
            "outer",
            TypeKind::Struct {
                members: vec![Member::new("foo", inner), Member::new("qux", int)],
                size: None,
            },
        );
        let g = b.add("g", TypeKind::Global { ty: outer, address: 0 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("o".into(), g)] });
        let schema = b.build(root).unwrap();

        let mut fx = Fixture::new(schema, 0, 1.0f32.to_le_bytes().repeat(3));
        fx.store
            .attach_directive("root/o", Directive::retype("foo/bar", float));
        let rows = fx.prime(0);

        assert_eq!(row(&rows, "root/o/foo/bar").type_name, "float");
        assert_eq!(row(&rows, "root/o/foo/bar").value, "1");
        assert_eq!(row(&rows, "root/o/foo/baz").type_name, "uint32");
        assert_eq!(row(&rows, "root/o/qux").type_name, "uint32");

        let HistoryState::Struct { members } = fx.store.peek("root/o").unwrap().state() else {
            panic!("not a struct record");
        };
        assert_eq!(members[0].directives, vec![Directive::retype("bar", float)]);
        assert!(members[1].directives.is_empty());
    }

    #[test]
    fn test_unknown_directive_target_is_ignored() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::U8);
        let s = b.add(
            "s",
            TypeKind::Struct {
                members: vec![Member::new("x", int)],
                size: None,
            },
        );
        let g = b.add("g", TypeKind::Global { ty: s, address: 0 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("s".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0, vec![4]);
        fx.store
            .attach_directive("root/s", Directive::retype("nope", int));
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/s/x").value, "4 (0x4)");
    }
}
