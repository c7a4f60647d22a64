use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use fleetbook::activity::{ActivityMonitor, InputEvent};
use fleetbook::adapters::{FileVault, HttpTransport, TokioClock};
use fleetbook::client::FleetClient;
use fleetbook::config::{ClientConfig, ConfigFile, DEFAULT_REQUEST_TIMEOUT};
use fleetbook::records::{Booking, BookingDraft, Team};
use fleetbook::store::StoreError;

const DEFAULT_COOKIE_FILE: &str = ".fleetbook-cookie.json";

type Client = FleetClient<HttpTransport, FileVault, TokioClock>;

pub(crate) enum RunOutcome {
    Run(ClientConfig, Command),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match resolve_config(&cli) {
        Ok(config) => RunOutcome::Run(config, cli.command),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fleetbook",
    version,
    about = "Terminal client for shared boat reservations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Base URL of the booking API, e.g. http://localhost:1323/data
    #[arg(long, env = "FLEETBOOK_SERVER_URL")]
    server_url: Option<String>,
    #[arg(long, env = "FLEETBOOK_CONFIG_FILE")]
    config_file: Option<PathBuf>,
    #[arg(long, env = "FLEETBOOK_COOKIE_FILE")]
    cookie_file: Option<PathBuf>,
    /// Request timeout as <number>[s|m|h], e.g. 45s
    #[arg(long, env = "FLEETBOOK_REQUEST_TIMEOUT")]
    request_timeout: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Sign in and persist the credential cookie
    Login {
        #[arg(long)]
        team: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the persisted credential
    Logout,
    /// Show the server configuration
    Config,
    /// List a collection
    List {
        #[arg(value_enum)]
        resource: ListResource,
    },
    /// Add a booking
    Add(AddArgs),
    /// Cancel or remove a booking
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Keep collections fresh; every stdin line counts as activity
    Watch,
    /// Pair the notification channel (prints QR payloads to scan)
    Pair,
    /// Unpair the notification channel
    Unpair,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub(crate) enum ListResource {
    Bookings,
    Boats,
    Users,
    Teams,
    Targets,
}

#[derive(Args, Debug)]
pub(crate) struct AddArgs {
    #[arg(long)]
    boat: String,
    #[arg(long)]
    date: String,
    #[arg(long)]
    time: String,
    #[arg(long)]
    duration: String,
    #[arg(long)]
    user: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "")]
    comment: String,
    /// Notification recipient for this booking
    #[arg(long, default_value = "")]
    notify: String,
    /// Recurrence code: 1=daily 2=weekly 3=monthly 4=yearly
    #[arg(long, default_value = "")]
    repeat: String,
    /// Boat to fall back to when the first choice is taken
    #[arg(long, default_value = "")]
    fallback: String,
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig, String> {
    let file = match cli.config_file.as_deref() {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let server_url = cli
        .server_url
        .clone()
        .or(file.server_url)
        .ok_or("--server-url is required (flag, FLEETBOOK_SERVER_URL, or config file)")?;
    if server_url.trim().is_empty() {
        return Err("server url cannot be empty".to_string());
    }
    let cookie_file = cli
        .cookie_file
        .clone()
        .or(file.cookie_file)
        .unwrap_or_else(|| DEFAULT_COOKIE_FILE.into());
    let request_timeout = match cli
        .request_timeout
        .as_deref()
        .or(file.request_timeout.as_deref())
    {
        Some(raw) => parse_timeout(raw)?,
        None => DEFAULT_REQUEST_TIMEOUT,
    };
    Ok(ClientConfig {
        server_url,
        cookie_file,
        request_timeout,
    })
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("request timeout cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid request timeout '{value}'; expected <number>[s|m|h]"))?;

    if amount == 0 {
        return Err("request timeout must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::from_secs(amount)),
        'm' => Ok(Duration::from_secs(amount * 60)),
        'h' => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(format!(
            "invalid request timeout '{value}'; expected <number>[s|m|h]"
        )),
    }
}

pub(crate) async fn execute(config: ClientConfig, command: Command) -> i32 {
    let transport = match HttpTransport::new(&config.server_url, config.request_timeout) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("cannot build http client: {err}");
            return 1;
        }
    };
    let client = FleetClient::new(transport, FileVault::new(config.cookie_file), TokioClock);

    match command {
        Command::Login { team, password } => match client.login(&team, &password).await {
            Ok(_) => {
                println!("Logged in as {team}.");
                0
            }
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::Logout => {
            client.logout().await;
            println!("Logged out.");
            0
        }
        Command::Config => {
            client.bootstrap().await;
            match client.remote_config() {
                Some(config) => {
                    println!("{} {} (myfleet {})", config.name, config.version, config.myfleet_version);
                    println!("team: {} ({})", config.team, config.title);
                    println!("timezone: {}", config.timezone);
                    println!(
                        "auth required: {}  admin: {}  whatsapp: {}  planner: {}",
                        config.auth_required, config.admin, config.whatsapp, config.planner
                    );
                    0
                }
                None => {
                    eprintln!("{}", StoreError::Connection);
                    1
                }
            }
        }
        Command::List { resource } => run_list(&client, resource).await,
        Command::Add(args) => run_add(&client, args).await,
        Command::Delete { id } => run_delete(&client, id).await,
        Command::Watch => run_watch(client).await,
        Command::Pair => run_pair(&client).await,
        Command::Unpair => {
            client.bootstrap().await;
            match client.unpair_notifications().await {
                Ok(()) => {
                    println!("Notification channel unpaired.");
                    0
                }
                Err(err) => {
                    eprintln!("{err}");
                    1
                }
            }
        }
    }
}

async fn run_list(client: &Client, resource: ListResource) -> i32 {
    client.bootstrap().await;
    let failed = match resource {
        ListResource::Bookings => {
            for line in render_bookings(&client.bookings.items()) {
                println!("{line}");
            }
            client.bookings.connection_failed()
        }
        ListResource::Boats => {
            for boat in client.boats.items() {
                println!("{boat}");
            }
            client.boats.connection_failed()
        }
        ListResource::Users => {
            for user in client.users.items() {
                println!("{:>4}  {:<12} {}", user.id, user.user, user.name);
            }
            client.users.connection_failed()
        }
        ListResource::Teams => {
            for team in client.teams.items() {
                println!("{:>4}  {:<12} {}{}", team.id, team.team, team.title, render_team_flags(&team));
            }
            client.teams.connection_failed()
        }
        ListResource::Targets => {
            for target in client.targets.items() {
                println!("{}", target.to);
            }
            client.targets.connection_failed()
        }
    };
    if failed {
        eprintln!("{}", StoreError::Connection);
        return 1;
    }
    0
}

fn render_team_flags(team: &Team) -> String {
    let mut flags = String::new();
    if team.admin {
        flags.push_str(" [admin]");
    }
    if !team.whatsappid.is_empty() {
        flags.push_str(" [paired]");
    }
    flags
}

fn render_bookings(bookings: &[Booking]) -> Vec<String> {
    bookings
        .iter()
        .map(|booking| {
            format!(
                "{:>4}  {:<10} {} {:>5} {:>4}m  {:<10} {:<10} {}",
                booking.id,
                booking.boat,
                booking.date,
                booking.time,
                booking.duration,
                booking.user,
                booking.state,
                booking.message,
            )
        })
        .collect()
}

async fn run_add(client: &Client, args: AddArgs) -> i32 {
    client.bootstrap().await;
    let draft = BookingDraft {
        id: None,
        boat: args.boat,
        fallback: args.fallback,
        date: args.date,
        time: args.time,
        duration: args.duration,
        user: args.user,
        password: args.password,
        comment: args.comment,
        whatsapp_to: args.notify,
        repeat: args.repeat,
    };
    match client.add_booking(&draft).await {
        Ok(()) => {
            println!("Booking added ({} total).", client.bookings.items().len());
            0
        }
        Err(StoreError::Validation(errors)) => {
            for error in errors {
                eprintln!("{error}");
            }
            1
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

async fn run_delete(client: &Client, id: i64) -> i32 {
    client.bootstrap().await;
    let Some(booking) = client
        .bookings
        .items()
        .into_iter()
        .find(|booking| booking.id == id)
    else {
        eprintln!("No booking with id {id}.");
        return 1;
    };
    match client.delete_booking(&booking).await {
        Ok(()) => {
            println!("Booking {id} cancelled.");
            0
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

async fn run_watch(client: Client) -> i32 {
    let session = client.bootstrap().await;
    let auth_required = client
        .remote_config()
        .map(|config| config.auth_required)
        .unwrap_or(true);
    if auth_required && !session.is_authenticated() {
        eprintln!("Not logged in.");
        return 1;
    }

    println!("Watching bookings; every input line counts as activity, Ctrl-D stops.");
    for line in render_bookings(&client.bookings.items()) {
        println!("{line}");
    }

    let (events, receiver) = tokio::sync::mpsc::channel(16);
    let monitor = ActivityMonitor::new(TokioClock).spawn(receiver, client.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        if events.send(InputEvent::KeyDown).await.is_err() {
            break;
        }
        for line in render_bookings(&client.bookings.items()) {
            println!("{line}");
        }
    }
    drop(events);
    monitor.abort();
    0
}

async fn run_pair(client: &Client) -> i32 {
    client.bootstrap().await;
    let result = client
        .pair_notifications(|team| {
            if !team.qrcode.is_empty() {
                println!("Scan to pair: {}", team.qrcode);
            } else if !team.whatsappid.is_empty() {
                println!("Paired as {}.", team.whatsappid);
            }
        })
        .await;
    match result {
        Ok(team) if team.whatsappid.is_empty() => {
            println!("Pairing ended without a device.");
            1
        }
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            command: Command::Logout,
            server_url: Some("http://localhost:1323/data".to_string()),
            config_file: None,
            cookie_file: None,
            request_timeout: None,
        }
    }

    #[test]
    fn parse_timeout__should_default_to_seconds() {
        // When
        let timeout = parse_timeout("45").expect("parse timeout");

        // Then
        assert_eq!(timeout, Duration::from_secs(45));
    }

    #[test]
    fn parse_timeout__should_parse_units() {
        assert_eq!(parse_timeout("2m").expect("parse"), Duration::from_secs(120));
        assert_eq!(parse_timeout("1h").expect("parse"), Duration::from_secs(3600));
    }

    #[test]
    fn parse_timeout__should_reject_invalid_values() {
        assert!(parse_timeout("").is_err());
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
        assert!(parse_timeout("5d").is_err());
    }

    #[test]
    fn resolve_config__should_apply_defaults() {
        // When
        let config = resolve_config(&base_cli()).expect("resolve config");

        // Then
        assert_eq!(config.server_url, "http://localhost:1323/data");
        assert_eq!(config.cookie_file, PathBuf::from(DEFAULT_COOKIE_FILE));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn resolve_config__should_require_a_server_url() {
        // Given
        let mut cli = base_cli();
        cli.server_url = None;

        // When
        let result = resolve_config(&cli);

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn resolve_config__should_let_flags_win_over_the_file() {
        // Given
        let path = std::env::temp_dir().join(format!(
            "fleetbook-cli-{}-config.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "server_url = \"http://file.example/data\"\nrequest_timeout = \"45s\"\n",
        )
        .expect("write config file");
        let mut cli = base_cli();
        cli.config_file = Some(path.clone());

        // When
        let config = resolve_config(&cli).expect("resolve config");

        // Then: the flag's URL wins, the file's timeout fills the gap.
        assert_eq!(config.server_url, "http://localhost:1323/data");
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        std::fs::remove_file(path).expect("clean up");
    }
}
