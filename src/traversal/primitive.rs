use super::{detect_change, node, read_uint, TypeInfo, VisitContext};
use crate::history::{Directive, History, HistoryState};
use crate::present::Payload;
use crate::schema::PrimitiveKind;

#[derive(Debug)]
pub struct PrimitiveTraversal {
    pub info: TypeInfo,
    pub kind: PrimitiveKind,
}

impl PrimitiveTraversal {
    pub fn size(&self) -> usize {
        self.kind.size()
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
        let size = self.size();
        if size == 0 {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unknown("void"));
            return false;
        }
        let Some(current) = current.get(..size) else {
            cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Unavailable);
            return false;
        };

        let changed = detect_change(history, current, previous.get(..size).unwrap_or(&[]), cx.now);
        history.state = HistoryState::Scalar {
            last_value: integer(self.kind, current),
        };

        let value = format_value(self.kind, current);
        cx.leaf(&node(history, label, &self.info.name, cx.now), Payload::Scalar(value));
        changed
    }
}

/// Integer view of a scalar, sign-extended for signed kinds
pub fn integer(kind: PrimitiveKind, bytes: &[u8]) -> Option<u64> {
    let raw = read_uint(bytes.get(..kind.size())?);
    Some(match kind {
        PrimitiveKind::I8 => raw as u8 as i8 as i64 as u64,
        PrimitiveKind::I16 => raw as u16 as i16 as i64 as u64,
        PrimitiveKind::I32 => raw as u32 as i32 as i64 as u64,
        PrimitiveKind::F32 | PrimitiveKind::F64 | PrimitiveKind::Void => return None,
        _ => raw,
    })
}

/// Display form of a scalar
pub fn format_value(kind: PrimitiveKind, bytes: &[u8]) -> String {
    let raw = read_uint(bytes);
    match kind {
        PrimitiveKind::Void => String::new(),
        PrimitiveKind::Bool => (raw != 0).to_string(),
        PrimitiveKind::Char => {
            let c = raw as u8;
            if c.is_ascii_graphic() || c == b' ' {
                format!("'{}' ({})", c as char, c)
            } else {
                format!("{:#04x}", c)
            }
        }
        PrimitiveKind::I8 => (raw as u8 as i8).to_string(),
        PrimitiveKind::I16 => (raw as u16 as i16).to_string(),
        PrimitiveKind::I32 => (raw as u32 as i32).to_string(),
        PrimitiveKind::I64 => (raw as i64).to_string(),
        PrimitiveKind::U8 | PrimitiveKind::U16 | PrimitiveKind::U32 | PrimitiveKind::U64 => {
            format!("{} ({:#x})", raw, raw)
        }
        PrimitiveKind::F32 => f32::from_bits(raw as u32).to_string(),
        PrimitiveKind::F64 => f64::from_bits(raw).to_string(),
    }
}
