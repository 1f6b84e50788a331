use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::{detect_change, node, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryState};
use crate::present::Payload;

/// Raw pixel buffer shown as an image
///
/// A checksum of the pixels is kept per record; `generation` increases
/// whenever it changes so surfaces know to re-upload their texture.
#[derive(Debug)]
pub struct GraphicsTraversal {
    pub info: TypeInfo,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u8,
}

impl GraphicsTraversal {
    pub fn size(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }

    pub fn construct_history(&self, path: &str, directives: Vec<Directive>) -> History {
        History::new(path, self.info.id, directives).with_state(HistoryState::Graphics {
            checksum: 0,
            generation: 0,
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
        let size = self.size();
        let Some(current) = current.get(..size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };
        let changed = detect_change(history, current, previous.get(..size).unwrap_or(&[]), cx.now);

        let mut hasher = DefaultHasher::new();
        current.hash(&mut hasher);
        let sum = hasher.finish();
        let generation = match &mut history.state {
            HistoryState::Graphics {
                checksum,
                generation,
            } => {
                if *checksum != sum || *generation == 0 {
                    *checksum = sum;
                    *generation += 1;
                }
                *generation
            }
            _ => 0,
        };

        let payload = Payload::Image {
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bytes_per_pixel,
            bytes: current,
            generation,
        };
        cx.leaf(&node(history, label, &self.info.name, cx.now), payload);
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{SchemaBuilder, TypeKind};
    use crate::traversal::testing::{row, Fixture};

    #[test]
    fn test_generation_bumps_on_new_pixels() {
        let mut b = SchemaBuilder::new(8);
        let fb = b.add(
            "rgba[2x2]",
            TypeKind::GraphicsBuffer {
                width: 2,
                height: 2,
                bytes_per_pixel: 4,
            },
        );
        let g = b.add("g", TypeKind::Global { ty: fb, address: 0x500 });
        let root = b.add("root", TypeKind::Namespace { children: vec![("fb".into(), g)] });

        let mut fx = Fixture::new(b.build(root).unwrap(), 0x500, vec![0xFF; 16]);
        let rows = fx.prime(0);
        assert_eq!(row(&rows, "root/fb").value, "2x2x4 gen 1 [ffffffffffffffff..]");

        fx.cache.mark_dirty();
        let rows = fx.render(2);
        assert!(row(&rows, "root/fb").value.contains("gen 1"));

        fx.write(0x500, &[0, 0, 0, 0]);
        let rows = fx.render(3);
        assert!(row(&rows, "root/fb").value.contains("gen 2"));
        assert!(row(&rows, "root/fb").fresh);
    }
}
