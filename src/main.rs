use std::sync::Arc;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tokio::sync::broadcast::error::RecvError;

use tunectl::{
    config::{self, Config},
    error, info,
    management::{KeyringCredentialStore, PublishedState, SessionController},
    server::{self, AppState},
    spotify::WebApiClient,
    success, warning,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the controller and its local control server
    Run(RunOptions),

    /// Forward an authorization callback URL to a running controller
    Callback(CallbackOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct RunOptions {
    /// Print the authorization URL instead of opening a browser
    #[clap(long)]
    no_browser: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CallbackOptions {
    /// Full callback URL as delivered by the OS, e.g. tunectl://callback?code=..&state=..
    url: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Run(opt) => run(opt.no_browser).await,
        Command::Callback(opt) => forward_callback(&opt.url).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}

async fn run(no_browser: bool) {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration: {}", e),
    };

    let api = Arc::new(WebApiClient::new(config.spotify.clone()));
    let store = Arc::new(KeyringCredentialStore::default());
    let controller = match SessionController::new(&config, api, store) {
        Ok(controller) => controller,
        Err(e) => error!("Invalid configuration: {}", e),
    };

    tokio::spawn(print_changes(Arc::clone(&controller)));
    controller.init().await;

    if !controller.is_authorized().await {
        let auth_url = controller.authorize();
        if no_browser || webbrowser::open(auth_url.as_str()).is_err() {
            warning!(
                "Please navigate to the following URL to sign in:\n{}",
                auth_url
            );
        }
    }

    let state = AppState {
        controller: Arc::clone(&controller),
        redirect_uri: config.spotify.redirect_uri.clone(),
    };

    tokio::select! {
        result = server::start_api_server(&config.server_address, state) => {
            if let Err(e) = result {
                controller.shutdown();
                error!("Control server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    controller.shutdown();
}

async fn print_changes(controller: Arc<SessionController>) {
    let mut changes = controller.subscribe();
    let mut previous = PublishedState::default();

    loop {
        let current = match changes.recv().await {
            Ok(state) => state,
            Err(RecvError::Lagged(_)) => controller.state(),
            Err(RecvError::Closed) => break,
        };

        if current.current_track != previous.current_track {
            match &current.current_track {
                Some(track) => info!(
                    "Now playing: {} - {}{}",
                    track.artists.join(", "),
                    track.name,
                    current
                        .playlist_context
                        .as_deref()
                        .map(|p| format!(" ({p})"))
                        .unwrap_or_default()
                ),
                None => info!("Nothing playing"),
            }
        }
        if current.playlists.len() != previous.playlists.len() && !current.playlists.is_empty() {
            success!("{} playlists available", current.playlists.len());
        }
        if current.last_error != previous.last_error {
            if let Some(message) = current.last_error_message() {
                warning!("{}", message);
            }
        }

        previous = current;
    }
}

async fn forward_callback(url: &str) {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration: {}", e),
    };

    let query = match url::Url::parse(url) {
        Ok(parsed) => parsed.query().unwrap_or_default().to_string(),
        Err(e) => error!("Invalid callback URL {}: {}", url, e),
    };

    let endpoint = format!("http://{}/callback?{}", config.server_address, query);
    match reqwest::get(&endpoint).await {
        Ok(res) if res.status().is_success() => success!("Authorization forwarded"),
        Ok(res) => error!("Controller rejected the callback: {}", res.status()),
        Err(e) => error!("Cannot reach a running controller: {}", e),
    }
}
