use super::{decode_text, detect_change, node, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryState};
use crate::present::Payload;

/// Inline NUL-terminated string of unknown length
///
/// The read window starts at `initial_size` and doubles every tick the
/// terminator is not inside it, up to `max_size`. Once the terminator is
/// seen the window locks to exactly the string plus its NUL.
#[derive(Debug)]
pub struct StringTraversal {
    pub info: TypeInfo,
    pub initial_size: usize,
    pub max_size: usize,
}

impl StringTraversal {
    pub fn size(&self, history: &History) -> usize {
        match history.state {
            HistoryState::String { size } => size,
            _ => self.initial_size,
        }
    }

    pub fn static_size(&self) -> usize {
        self.initial_size
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives).with_state(HistoryState::String {
            size: self.initial_size,
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
        let size = self.size(history);
        let Some(current) = current.get(..size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let changed = detect_change(history, current, previous.get(..size).unwrap_or(&[]), cx.now);

        let (next_size, payload) = match current.iter().position(|&b| b == 0) {
            Some(end) => (
                end + 1,
                Payload::Text {
                    text: decode_text(&current[..end]),
                    truncated: false,
                },
            ),
            None => (
                (size * 2).min(self.max_size),
                Payload::Text {
                    text: decode_text(current),
                    truncated: true,
                },
            ),
        };
        if next_size != size {
            cx.tracer.trace(format_args!(
                "{}: string window {} -> {}",
                history.path(),
                size,
                next_size
            ));
        }
        history.state = HistoryState::String { size: next_size };

        cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::history::HistoryState;
    use crate::schema::{SchemaBuilder, TypeKind};
    use crate::traversal::testing::{row, Fixture};

    fn fixture(text: &[u8], config: EngineConfig) -> Fixture {
        let mut b = SchemaBuilder::new(8);
        let s = b.add("string", TypeKind::String);
        let g = b.add("g", TypeKind::Global { ty: s, address: 0x10 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("s".into(), g)] });
        Fixture::with_config(b.build(root).unwrap(), 0x10, text.to_vec(), config)
    }

    fn window(fx: &Fixture) -> usize {
        match fx.store.peek("root/s").unwrap().state() {
            HistoryState::String { size } => *size,
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_window_doubles_until_terminator() {
        let mut text = vec![b'a'; 100];
        text.push(0);
        text.extend([b'z'; 200]);
        let mut fx = fixture(&text, EngineConfig::default());

        let rows = fx.prime(0);
        assert_eq!(window(&fx), 64);
        assert!(row(&rows, "root/s").value.ends_with("\"..."));

        fx.render(2);
        assert_eq!(window(&fx), 128);

        let rows = fx.render(3);
        assert_eq!(window(&fx), 101);
        assert_eq!(row(&rows, "root/s").value, format!("\"{}\"", "a".repeat(100)));

        fx.render(4);
        assert_eq!(window(&fx), 101);
    }

    #[test]
    fn test_window_capped() {
        let config = EngineConfig {
            string_max_size: 48,
            ..Default::default()
        };
        let mut fx = fixture(&[b'x'; 256], config);
        fx.prime(0);
        fx.render(2);
        fx.render(3);
        assert_eq!(window(&fx), 48);
    }

    #[test]
    fn test_short_string_locks_immediately() {
        let mut fx = fixture(b"hey\0garbage", EngineConfig::default());
        let rows = fx.prime(0);
        assert_eq!(window(&fx), 4);
        assert_eq!(row(&rows, "root/s").value, "\"hey\"");
    }
}
