//! Command processing
//!
//! Watch commands parsed from REPL input.

/// Commands understood by every front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Render tick: p
    Print,
    /// Update tick: u
    Update,
    /// Stop the attached process and take an update tick: pause
    Pause,
    /// Resume the attached process: c
    Continue,
    /// Name filter for every namespace: f <text> (no text clears it)
    Filter(String),
    /// Collapse or expand a container: x <path>
    Toggle(String),
    /// Flip expand-all: ea
    ExpandAll,
    /// Retype a struct member: retype <path> <member> <type>
    Retype {
        path: String,
        member: String,
        type_name: String,
    },
    /// Drop directives attached to a path: unretype <path>
    ClearDirectives(String),
    /// Cache and history counters: stats
    Stats,
    /// Help: ? or help
    Help,
    /// Quit: q or exit
    Quit,
    /// Unknown command
    Unknown(String),
}

/// Parse a command string into a [`WatchCommand`]
pub fn parse_command(input: &str) -> WatchCommand {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts.first().copied().unwrap_or("");
    let arg = parts.get(1).map(|s| s.trim()).filter(|s| !s.is_empty());

    match cmd {
        "p" | "print" => WatchCommand::Print,
        "u" | "update" => WatchCommand::Update,
        "pause" | "break" => WatchCommand::Pause,
        "c" | "continue" | "dc" => WatchCommand::Continue,
        "f" | "filter" => WatchCommand::Filter(arg.unwrap_or("").to_string()),
        "x" | "toggle" => match arg {
            Some(path) => WatchCommand::Toggle(normalize_path(path)),
            None => WatchCommand::Unknown(input.to_string()),
        },
        "ea" | "expand" => WatchCommand::ExpandAll,
        "retype" => {
            let args: Vec<&str> = arg.map(|a| a.split_whitespace().collect()).unwrap_or_default();
            match args.as_slice() {
                [path, member, type_name] => WatchCommand::Retype {
                    path: normalize_path(path),
                    member: member.to_string(),
                    type_name: type_name.to_string(),
                },
                _ => WatchCommand::Unknown(input.to_string()),
            }
        }
        "unretype" => match arg {
            Some(path) => WatchCommand::ClearDirectives(normalize_path(path)),
            None => WatchCommand::Unknown(input.to_string()),
        },
        "stats" => WatchCommand::Stats,
        "?" | "help" => WatchCommand::Help,
        "q" | "quit" | "exit" => WatchCommand::Quit,
        _ => WatchCommand::Unknown(input.to_string()),
    }
}

/// Accept paths with or without the leading `root/`
fn normalize_path(path: &str) -> String {
    let path = path.trim_matches('/');
    if path == "root" || path.starts_with("root/") {
        path.to_string()
    } else {
        format!("root/{}", path)
    }
}

/// Parse an address from hex (`0x` prefix) or decimal
pub fn parse_address(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("p"), WatchCommand::Print);
        assert_eq!(parse_command("  u "), WatchCommand::Update);
        assert_eq!(parse_command("c"), WatchCommand::Continue);
        assert_eq!(parse_command("ea"), WatchCommand::ExpandAll);
        assert_eq!(parse_command("q"), WatchCommand::Quit);
        assert_eq!(parse_command("f"), WatchCommand::Filter(String::new()));
        assert_eq!(parse_command("f hp"), WatchCommand::Filter("hp".into()));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse_command("x .data/player"),
            WatchCommand::Toggle("root/.data/player".into())
        );
        assert_eq!(
            parse_command("x root/s"),
            WatchCommand::Toggle("root/s".into())
        );
        assert_eq!(
            parse_command("retype s foo float"),
            WatchCommand::Retype {
                path: "root/s".into(),
                member: "foo".into(),
                type_name: "float".into()
            }
        );
        assert!(matches!(parse_command("retype s foo"), WatchCommand::Unknown(_)));
        assert!(matches!(parse_command("x"), WatchCommand::Unknown(_)));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1000"), Some(0x1000));
        assert_eq!(parse_address("4096"), Some(4096));
        assert_eq!(parse_address("zz"), None);
    }
}
