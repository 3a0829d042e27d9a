use std::future;
use std::sync::Arc;

use skychat::auth::{AuthFlow, AuthState};
use skychat::channel::{ChannelEvent, CloseReason, WebSocketConnector};
use skychat::command::{Command, HELP_TEXT, parse_command};
use skychat::session::ChatClient;
use skychat::settings::{SessionFile, SettingsStore};
use skychat_identity::{AuthError, CognitoIdentityClient};
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Snafu)]
enum StartupError {
    #[snafu(display(
        "identity service is not configured; set identity.client_id in {path} or SKYCHAT_IDENTITY__CLIENT_ID"
    ))]
    MissingIdentityConfig { path: String },
    #[snafu(display("failed to create identity client"))]
    IdentityClient { source: AuthError },
    #[snafu(display("failed to start async runtime"))]
    Runtime { source: std::io::Error },
    #[snafu(display("failed to read terminal input"))]
    ReadInput { source: std::io::Error },
}

#[snafu::report]
fn main() -> Result<(), StartupError> {
    let settings_store = SettingsStore::load();
    let settings = settings_store.settings();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let identity_config = settings
        .identity
        .to_identity_config()
        .context(MissingIdentityConfigSnafu {
            path: settings_store.config_path().display().to_string(),
        })?;
    let identity_client =
        CognitoIdentityClient::new(identity_config).context(IdentityClientSnafu)?;
    let auth = AuthFlow::new(Arc::new(identity_client));
    let session_file = SessionFile::in_dir(&SettingsStore::default_config_dir());
    let client = ChatClient::new(
        auth,
        Arc::new(WebSocketConnector),
        settings.relay.endpoint.clone(),
    )
    .with_session_file(session_file);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu)?;
    runtime.block_on(run(client, settings_store))
}

async fn run(mut client: ChatClient, settings_store: SettingsStore) -> Result<(), StartupError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP_TEXT}");
    println!("== checking for a saved session...");
    render_auth(client.restore_saved_session().await);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context(ReadInputSnafu)? else {
                    break;
                };
                let Some(command) = parse_command(&line) else {
                    continue;
                };
                if !handle_command(&mut client, &settings_store, command).await {
                    break;
                }
            }
            event = next_session_event(&mut client) => render_event(&client, &event),
        }
    }

    client.close();
    Ok(())
}

/// Runs one command. Returns `false` when the user asked to quit.
async fn handle_command(
    client: &mut ChatClient,
    settings_store: &SettingsStore,
    command: Command,
) -> bool {
    match command {
        Command::Auth(input) => {
            let state = client.handle(input).await;
            render_auth(state);
        }
        Command::Send(text) => match client.session() {
            Some(session) => {
                if let Err(error) = session.send(&text) {
                    println!("! {error}");
                }
            }
            None => println!("! sign in before sending messages"),
        },
        Command::Reconnect => match client.session_mut() {
            Some(session) => {
                let state = session.reconnect().await;
                println!("* connection {state:?}");
            }
            None => println!("! sign in before connecting"),
        },
        Command::SetRelay(endpoint) => match settings_store.set_relay_endpoint(&endpoint) {
            Ok(endpoint) => {
                println!("* relay set to {endpoint}; used from the next session");
                client.set_relay_endpoint(endpoint);
            }
            Err(error) => println!("! could not save settings: {error}"),
        },
        Command::Help => println!("{HELP_TEXT}"),
        Command::Quit => return false,
        Command::Usage(usage) => println!("usage: {usage}"),
        Command::Unknown(name) => println!("! unknown command /{name}; try /help"),
    }
    true
}

/// Next event of the live session; never resolves while there is none.
async fn next_session_event(client: &mut ChatClient) -> ChannelEvent {
    let event = match client.session_mut() {
        Some(session) => session.next_event().await,
        None => None,
    };
    match event {
        Some(event) => event,
        None => future::pending().await,
    }
}

fn render_auth(state: &AuthState) {
    match state {
        AuthState::Login(form) => println!("== sign in{}", pending_marker(form.pending)),
        AuthState::Signup(form) => println!("== create account{}", pending_marker(form.pending)),
        AuthState::Verify(form) => println!(
            "== verify {}{}",
            form.email_to_verify,
            pending_marker(form.pending)
        ),
        AuthState::Authenticated(session) => {
            println!("== chatting as {}", session.identity.display_name());
        }
    }
    if let Some(success) = state.success() {
        println!("* {success}");
    }
    if let Some(error) = state.error() {
        println!("! {error}");
    }
}

fn render_event(client: &ChatClient, event: &ChannelEvent) {
    match event {
        ChannelEvent::ConnectionOpened => println!("* connected"),
        ChannelEvent::MessageReceived(message) => {
            let own = client
                .session()
                .is_some_and(|session| session.is_own(message));
            let marker = if own { ">" } else { " " };
            println!("{marker} {}: {}", message.user, message.text);
        }
        ChannelEvent::ConnectionClosed(CloseReason::LocalClose) => println!("* disconnected"),
        ChannelEvent::ConnectionClosed(reason) => {
            println!("! connection lost ({reason:?}); /reconnect to retry");
        }
    }
}

fn pending_marker(pending: bool) -> &'static str {
    if pending { " (working...)" } else { "" }
}
