use std::rc::Rc;

use super::{child_window, decode_text, detect_change, node, Traversal, TypeInfo, VisitContext};
use crate::history::{join, resolve_relative, Directive, History, HistoryState, HistoryStore};
use crate::present::{Node, Payload};
use crate::schema::ArrayLen;

/// Fixed or field-sized array; `char` arrays render as inline text
#[derive(Debug)]
pub struct ArrayTraversal {
    pub info: TypeInfo,
    pub element: Rc<Traversal>,
    pub len: ArrayLen,
    pub inline_text: bool,
    /// Cap for counts read from target memory
    pub max_elements: usize,
    /// Larger arrays are only walked once opened by hand
    pub eager_limit: usize,
}

impl ArrayTraversal {
    fn count(&self, history: &History) -> usize {
        match (&history.state, &self.len) {
            (HistoryState::Array { count, .. }, _) => *count,
            (_, ArrayLen::Fixed(n)) => *n as usize,
            (_, ArrayLen::Field(_)) => 0,
        }
    }

    /// Stride, taken from the first element's record if there is one
    fn element_size(&self, history: &History, store: &HistoryStore) -> usize {
        match &history.state {
            HistoryState::Array { elements, .. } if !elements.is_empty() => {
                self.element.size_at(&elements[0], store)
            }
            _ => self.element.static_size(),
        }
    }

    pub fn size(&self, history: &History, store: &HistoryStore) -> usize {
        self.count(history) * self.element_size(history, store)
    }

    pub fn static_size(&self) -> usize {
        match self.len {
            ArrayLen::Fixed(n) => n as usize * self.element.static_size(),
            ArrayLen::Field(_) => 0,
        }
    }

    fn element_paths(&self, path: &str, count: usize) -> Vec<String> {
        if self.inline_text {
            return Vec::new();
        }
        (0..count).map(|i| join(path, &i.to_string())).collect()
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        let count = match self.len {
            ArrayLen::Fixed(n) => n as usize,
            ArrayLen::Field(_) => 0,
        };
        let elements = self.element_paths(path, count);
        History::new(path, self.info.id, directives).with_state(HistoryState::Array { count, elements })
    }

    /// Re-read a field-sized count from the record it points at
    fn refresh_count(&self, history: &mut History, cx: &mut VisitContext<'_>) {
        let ArrayLen::Field(expr) = &self.len else {
            return;
        };
        let count = resolve_relative(expr, history.path())
            .and_then(|p| cx.history.try_get(&p).and_then(|h| h.integer_value()))
            .map(|n| (n as usize).min(self.max_elements))
            .unwrap_or(0);

        if self.count(history) != count {
            cx.tracer.trace(format_args!(
                "{}: length {} -> {}",
                history.path(),
                self.count(history),
                count
            ));
            let elements = self.element_paths(history.path(), count);
            history.state = HistoryState::Array { count, elements };
        }
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
        self.refresh_count(history, cx);

        let count = self.count(history);
        let stride = self.element_size(history, cx.history);
        let size = count * stride;
        let Some(current) = current.get(..size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let previous = previous.get(..size).unwrap_or(&[]);
        let mut changed = detect_change(history, current, previous, cx.now);

        if self.inline_text {
            let end = current.iter().position(|&b| b == 0).unwrap_or(current.len());
            let payload = Payload::Text {
                text: decode_text(&current[..end]),
                truncated: false,
            };
            cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
            return changed;
        }

        let header = Node {
            on_demand: count > self.eager_limit,
            ..node(history, label, &self.info.name, cx.now)
        };
        let expansion = cx.open(&header, Payload::Children(count));
        if !expansion.walks_children() {
            return changed;
        }

        if let HistoryState::Array { elements, .. } = &history.state {
            for (i, path) in elements.iter().enumerate() {
                let (element_address, current, previous) =
                    child_window(address, i * stride, stride, current, previous);
                changed |= cx.visit_child(
                    path,
                    &i.to_string(),
                    &self.element,
                    element_address,
                    current,
                    previous,
                    &[],
                );
            }
        }
        cx.close(expansion);
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{ArrayLen, Member, PrimitiveKind, SchemaBuilder, TypeKind};
    use crate::traversal::testing::{row, Fixture};

    #[test]
    fn test_char_array_renders_text() {
        let mut b = SchemaBuilder::new(8);
        let ch = b.primitive(PrimitiveKind::Char);
        let name = b.add("char[8]", TypeKind::Array { element: ch, len: ArrayLen::Fixed(8) });
        let g = b.add("g", TypeKind::Global { ty: name, address: 0x100 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("name".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x100, b"hi\0xxxxx".to_vec());
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/name").value, "\"hi\"");
        assert!(!rows.iter().any(|r| r.path == "root/name/0"));
    }

    #[test]
    fn test_elements_get_own_paths_and_diffs() {
        let mut b = SchemaBuilder::new(8);
        let int = b.primitive(PrimitiveKind::I16);
        let arr = b.add("int16[3]", TypeKind::Array { element: int, len: ArrayLen::Fixed(3) });
        let g = b.add("g", TypeKind::Global { ty: arr, address: 0x200 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("a".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x200, vec![1, 0, 2, 0, 3, 0]);
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/a").value, "{3 items}");
        assert_eq!(row(&rows, "root/a/2").value, "3");
        assert_eq!(row(&rows, "root/a/1").address, 0x202);

        fx.write(0x202, &[5, 0]);
        let rows = fx.render(10);
        assert!(row(&rows, "root/a").fresh);
        assert!(row(&rows, "root/a/1").fresh);
        assert!(!row(&rows, "root/a/0").fresh);
        assert!(!row(&rows, "root/a/2").fresh);
    }

    #[test]
    fn test_length_from_sibling_field() {
        let mut b = SchemaBuilder::new(8);
        let count = b.primitive(PrimitiveKind::U8);
        let int = b.primitive(PrimitiveKind::U8);
        let items = b.add(
            "uint8[count]",
            TypeKind::Array {
                element: int,
                len: ArrayLen::Field("../count".into()),
            },
        );
        let s = b.add(
            "bag",
            TypeKind::Struct {
                members: vec![Member::new("count", count), Member::new("items", items)],
                size: None,
            },
        );
        let g = b.add("g", TypeKind::Global { ty: s, address: 0x300 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("bag".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x300, vec![2, 10, 20, 30]);
        fx.prime(0);
        // The count is known after one pass, the struct grows on the next
        let rows = fx.render(2);
        assert_eq!(row(&rows, "root/bag/items").value, "{2 items}");
        assert_eq!(row(&rows, "root/bag/items/1").value, "20 (0x14)");
        assert!(!rows.iter().any(|r| r.path == "root/bag/items/2"));

        fx.write(0x300, &[3]);
        fx.render(3);
        let rows = fx.render(4);
        assert_eq!(row(&rows, "root/bag/items/2").value, "30 (0x1e)");
    }

    #[test]
    fn test_dynamic_length_is_capped() {
        let mut b = SchemaBuilder::new(8);
        let count = b.primitive(PrimitiveKind::U32);
        let byte = b.primitive(PrimitiveKind::U8);
        let items = b.add(
            "uint8[n]",
            TypeKind::Array {
                element: byte,
                len: ArrayLen::Field("../n".into()),
            },
        );
        let s = b.add(
            "blob",
            TypeKind::Struct {
                members: vec![Member::new("n", count), Member::new("items", items)],
                size: None,
            },
        );
        let g = b.add("g", TypeKind::Global { ty: s, address: 0 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("blob".into(), g)] });

        let config = crate::config::EngineConfig {
            max_dynamic_elements: 4,
            ..Default::default()
        };
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend([0u8; 16]);
        let mut fx = Fixture::with_config(b.build(root).unwrap(), 0, data, config);
        fx.prime(0);
        let rows = fx.render(2);
        assert_eq!(row(&rows, "root/blob/items").value, "{4 items}");
    }

    #[test]
    fn test_large_array_opens_on_demand() {
        let mut b = SchemaBuilder::new(8);
        let byte = b.primitive(PrimitiveKind::U8);
        let arr = b.add("uint8[100]", TypeKind::Array { element: byte, len: ArrayLen::Fixed(100) });
        let g = b.add("g", TypeKind::Global { ty: arr, address: 0x400 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("a".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x400, vec![1; 100]);
        fx.expand_all = true;
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/a").value, "{100 items}");
        assert!(!fx.surface.is_expanded("root/a"));
        assert!(!rows.iter().any(|r| r.path.starts_with("root/a/")));
        assert!(fx.store.peek("root/a/0").is_none());

        fx.surface.expand("root/a");
        let rows = fx.render(2);
        assert_eq!(row(&rows, "root/a/99").value, "1 (0x1)");
    }
}
