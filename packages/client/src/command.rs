//! Parsing of terminal input lines into client commands.
//!
//! Pure functions without side effects, so the binary's input loop stays thin.

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text, sent as chat
    Chat(String),
    /// `/create` or `/create <id>`
    Create(Option<String>),
    Join(String),
    Leave,
    Validate(String),
    Mute,
    Video,
    Record,
    Deafen,
    MuteAll,
    Status,
    Discover,
    Connect(String),
    Localhost,
    Retry,
    Help,
    Quit,
    /// A slash command with a missing argument or an unknown name
    Invalid(String),
}

/// Usage text printed by `/help`
pub const HELP: &str = "\
/create [id]       create a meeting and host it
/join <id>         join a meeting by its 6-digit id
/leave             leave (or, as host, end) the current meeting
/validate <id>     check whether a meeting exists
/mute /video /record /deafen
                   toggle audio, video, recording, deafen
/muteall           mute or unmute everyone (host only)
/status            show connection and meeting status
/discover          scan the local network for servers
/connect <addr>    connect to ip, ip:port or a ws:// URL
/localhost         connect to ws://localhost:8887/ws
/retry             keep retrying the current server
/quit              leave and exit";

/// Parse one input line
///
/// # Arguments
///
/// * `line` - The trimmed input line
///
/// # Returns
///
/// The parsed command; text not starting with `/` is chat
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Chat(line.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let argument = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let with_argument = |build: fn(String) -> Command| match argument {
        Some(argument) => build(argument.to_string()),
        None => Command::Invalid(format!("/{} needs an argument", name)),
    };

    match name.as_str() {
        "create" => Command::Create(argument.map(str::to_string)),
        "join" => with_argument(Command::Join),
        "leave" | "end" => Command::Leave,
        "validate" => with_argument(Command::Validate),
        "mute" => Command::Mute,
        "video" => Command::Video,
        "record" => Command::Record,
        "deafen" => Command::Deafen,
        "muteall" => Command::MuteAll,
        "status" => Command::Status,
        "discover" => Command::Discover,
        "connect" => with_argument(Command::Connect),
        "localhost" => Command::Localhost,
        "retry" => Command::Retry,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Invalid(format!("Unknown command /{} (try /help)", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_chat() {
        // テスト項目: / で始まらない入力はチャットになる
        // given (前提条件):
        let line = "  hello | everyone ";

        // when (操作):
        let command = parse_command(line);

        // then (期待する結果):
        assert_eq!(command, Command::Chat("hello | everyone".to_string()));
    }

    #[test]
    fn test_commands_with_arguments() {
        // テスト項目: 引数付きコマンドは引数を保持する
        // given (前提条件):
        let cases = [
            ("/join 482913", Command::Join("482913".to_string())),
            ("/create 482913", Command::Create(Some("482913".to_string()))),
            ("/create", Command::Create(None)),
            ("/validate  482913 ", Command::Validate("482913".to_string())),
            (
                "/connect 192.168.1.10:9000",
                Command::Connect("192.168.1.10:9000".to_string()),
            ),
        ];

        for (line, expected) in cases {
            // when (操作):
            let command = parse_command(line);

            // then (期待する結果):
            assert_eq!(command, expected);
        }
    }

    #[test]
    fn test_missing_argument_is_invalid() {
        // テスト項目: 必須引数がない場合は Invalid になる
        // given (前提条件):
        let line = "/join";

        // when (操作):
        let command = parse_command(line);

        // then (期待する結果):
        assert_eq!(
            command,
            Command::Invalid("/join needs an argument".to_string())
        );
    }

    #[test]
    fn test_command_names_are_case_insensitive() {
        // テスト項目: コマンド名は大文字小文字を区別しない
        // given (前提条件):
        let line = "/MuteAll";

        // when (操作):
        let command = parse_command(line);

        // then (期待する結果):
        assert_eq!(command, Command::MuteAll);
    }

    #[test]
    fn test_unknown_command() {
        // テスト項目: 未知のコマンドは Invalid になる
        // given (前提条件):
        let line = "/dance";

        // when (操作):
        let command = parse_command(line);

        // then (期待する結果):
        assert!(matches!(command, Command::Invalid(message) if message.contains("/dance")));
    }
}
