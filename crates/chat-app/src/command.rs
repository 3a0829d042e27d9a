use crate::auth::{AuthInput, AuthScreen, FormField};

pub const HELP_TEXT: &str = "\
commands:
  /login <email> <password>
  /signup <email> <password> <confirm-password>
  /verify <code>
  /resend
  /screen <login|signup|verify>
  /email <email>
  /reconnect
  /relay <url>          save the relay used by the next session
  /logout
  /quit
anything else is sent as a chat message";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth(AuthInput),
    Send(String),
    Reconnect,
    SetRelay(String),
    Help,
    Quit,
    /// A known command with the wrong arguments; carries its usage line.
    Usage(&'static str),
    Unknown(String),
}

/// Parses a terminal line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    if line.trim().is_empty() {
        return None;
    }

    let Some(command_line) = line.trim_start().strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };
    let mut words = command_line.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let command = match (name, args.as_slice()) {
        ("login", [email, password]) => Command::Auth(AuthInput::SubmitLogin {
            email: (*email).to_string(),
            password: (*password).to_string(),
        }),
        ("login", _) => Command::Usage("/login <email> <password>"),
        ("signup", [email, password, confirm_password]) => Command::Auth(AuthInput::SubmitSignup {
            email: (*email).to_string(),
            password: (*password).to_string(),
            confirm_password: (*confirm_password).to_string(),
        }),
        ("signup", _) => Command::Usage("/signup <email> <password> <confirm-password>"),
        ("verify", [code]) => Command::Auth(AuthInput::SubmitVerification {
            code: (*code).to_string(),
        }),
        ("verify", _) => Command::Usage("/verify <code>"),
        ("resend", []) => Command::Auth(AuthInput::ResendCode),
        ("screen", [screen]) => match parse_screen(screen) {
            Some(screen) => Command::Auth(AuthInput::SwitchScreen(screen)),
            None => Command::Usage("/screen <login|signup|verify>"),
        },
        ("screen", _) => Command::Usage("/screen <login|signup|verify>"),
        ("email", [email]) => Command::Auth(AuthInput::Edit {
            field: FormField::Email,
            value: (*email).to_string(),
        }),
        ("email", _) => Command::Usage("/email <email>"),
        ("logout", []) => Command::Auth(AuthInput::SignOut),
        ("reconnect", []) => Command::Reconnect,
        ("relay", [endpoint]) if is_websocket_url(endpoint) => {
            Command::SetRelay((*endpoint).to_string())
        }
        ("relay", _) => Command::Usage("/relay <ws://... or wss://...>"),
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    };
    Some(command)
}

fn is_websocket_url(value: &str) -> bool {
    value.starts_with("ws://") || value.starts_with("wss://")
}

fn parse_screen(value: &str) -> Option<AuthScreen> {
    match value.to_ascii_lowercase().as_str() {
        "login" => Some(AuthScreen::Login),
        "signup" => Some(AuthScreen::Signup),
        "verify" => Some(AuthScreen::Verify),
        _ => None,
    }
}
