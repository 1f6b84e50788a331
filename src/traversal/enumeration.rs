use std::collections::HashMap;

use super::{detect_change, node, read_uint, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryState};
use crate::present::Payload;

#[derive(Debug)]
pub struct EnumTraversal {
    pub info: TypeInfo,
    pub width: usize,
    pub values: HashMap<u64, String>,
}

impl EnumTraversal {
    pub fn size(&self) -> usize {
        self.width
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives)
            .with_state(HistoryState::Scalar { last_value: None })
    }

    /// `NAME (value)`, or the bare value if it has no enumerator
    pub fn describe(&self, value: u64) -> String {
        match self.values.get(&value) {
            Some(name) => format!("{} ({})", name, value),
            None => value.to_string(),
        }
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
        let value = read_uint(current);
        history.state = HistoryState::Scalar {
            last_value: Some(value),
        };
        cx.leaf(
            &node(history, label, &self.info.name, cx.now),
            Payload::Scalar(self.describe(value)),
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{SchemaBuilder, TypeKind};
    use crate::traversal::testing::{row, Fixture};

    #[test]
    fn test_enumerator_names() {
        let mut b = SchemaBuilder::new(8);
        let state = b.add(
            "state",
            TypeKind::Enum {
                width: 2,
                values: vec![(0, "IDLE".into()), (1, "RUNNING".into())],
            },
        );
        let g = b.add("g", TypeKind::Global { ty: state, address: 0x80 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("st".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x80, vec![1, 0]);
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/st").value, "RUNNING (1)");
        assert_eq!(row(&rows, "root/st").type_name, "state");

        fx.write(0x80, &[7]);
        let rows = fx.render(3);
        assert_eq!(row(&rows, "root/st").value, "7");
        assert!(row(&rows, "root/st").fresh);
    }
}
