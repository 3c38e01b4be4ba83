use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::RegisterRequest;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod api;
mod auth;
mod commands;
mod config;
mod display;
mod store;
mod watch;

#[derive(Parser)]
#[command(name = "filings")]
#[command(about = "Company filings: search the register, order filing services, talk to support")]
#[command(version = env!("FILINGS_VERSION"))]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Auth token (overrides config)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: String,
        /// Read from FILINGS_PASSWORD or prompted when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        company_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Log in to the filings server
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show current login status
    Whoami,
    /// Email a password reset link
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Search the company register
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
    /// Your saved companies
    Companies {
        #[command(subcommand)]
        action: CompaniesAction,
    },
    /// List the filing services on offer
    Services,
    /// Services to purchase, per company
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Your orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Order conversations with support
    Messages {
        #[command(subcommand)]
        action: MessagesAction,
    },
    /// Bulk quote documents for several companies
    Bulk {
        #[command(subcommand)]
        action: BulkAction,
    },
    /// Back-office operations (admin accounts only)
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    Show,
    Set {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        company_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CompaniesAction {
    /// List saved companies, favourites first
    List,
    /// Look a company up on the register and save it
    Save { number: String },
    /// Remove a saved company
    Remove { id: Uuid },
    /// Toggle the favourite flag
    Favorite { id: Uuid },
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Add services for a company
    Add {
        #[arg(long)]
        company: String,
        /// Company name; looked up on the register when omitted
        #[arg(long)]
        name: Option<String>,
        /// Service slug or id (repeatable)
        #[arg(long = "service", required = true)]
        services: Vec<String>,
    },
    /// Remove one service line
    Remove {
        #[arg(long)]
        company: String,
        #[arg(long)]
        service: String,
    },
    Show,
    Clear,
    /// Place one order per company in the cart
    Checkout,
}

#[derive(Subcommand)]
pub enum OrdersAction {
    List,
    Show { id: Uuid },
    /// Refresh payment status from the payment provider
    Confirm { id: Uuid },
}

#[derive(Subcommand)]
pub enum MessagesAction {
    /// Show an order's conversation
    List { order: Uuid },
    /// Send a message, optionally with attachments
    Send {
        order: Uuid,
        #[arg(default_value = "")]
        text: String,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Mark support's messages on an order as read
    Read { order: Uuid },
    /// Count unread support messages across your orders
    Unread,
    /// Follow conversations live
    Watch {
        #[arg(required = true)]
        orders: Vec<Uuid>,
    },
}

#[derive(Subcommand)]
pub enum BulkAction {
    /// Toggle a company in the selection
    SelectCompany { number: String },
    /// Toggle a service in the selection
    SelectService { service: String },
    Show,
    Clear,
    /// Download a ZIP with one quote PDF per company
    Download {
        #[arg(short, long, default_value = "company-documents.zip")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// Order statistics
    Stats,
    /// List all orders
    Orders {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Change an order's status
    Update {
        order: Uuid,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        payment_status: Option<String>,
    },
    /// Conversation overview
    Threads,
    /// Show an order's conversation
    Messages { order: Uuid },
    /// Reply on an order as support
    Reply {
        order: Uuid,
        text: String,
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Mark the customer's messages on an order as read
    Read { order: Uuid },
    /// Service catalogue, inactive entries included
    Services,
    /// Add a service to the catalogue
    ServiceCreate {
        #[arg(long)]
        title: String,
        /// Price in minor units
        #[arg(long)]
        price: i64,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Change a service
    ServiceUpdate {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        price: Option<i64>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    ServiceDelete { id: Uuid },
    /// Companies looked up by any customer
    Companies,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filings=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load().unwrap_or_default();
    let server = config.server(cli.server.as_deref());
    let token = cli.token.clone().or_else(|| config.remote.token.clone());
    let client = api::ApiClient::new(server.clone(), token);

    match cli.command {
        Commands::Config { action } => handle_config_command(action)?,
        Commands::Register {
            email,
            password,
            full_name,
            company_name,
            phone,
        } => {
            let password = auth::password_or_prompt(password, "Password")?;
            let request = RegisterRequest {
                email,
                password,
                full_name,
                company_name,
                phone_number: phone,
            };
            auth::register(&mut config, &server, request).await?;
        }
        Commands::Login { email, password } => {
            let password = auth::password_or_prompt(password, "Password")?;
            auth::login(&mut config, &server, &email, password).await?;
        }
        Commands::Logout => auth::logout(&mut config)?,
        Commands::Whoami => auth::whoami(&config, &server).await?,
        Commands::ForgotPassword { email } => auth::forgot_password(&server, &email).await?,
        Commands::ResetPassword { token, password } => {
            let password = auth::password_or_prompt(password, "New password")?;
            auth::reset_password(&server, &token, password).await?;
        }
        Commands::Profile { action } => commands::profile(&client, action).await?,
        Commands::Search { query, start } => commands::search(&client, &query, start).await?,
        Commands::Companies { action } => commands::companies(&client, action).await?,
        Commands::Services => commands::services(&client).await?,
        Commands::Cart { action } => {
            commands::cart(&client, &store::Store::open()?, action).await?
        }
        Commands::Orders { action } => commands::orders(&client, action).await?,
        Commands::Messages { action } => commands::messages(&client, action).await?,
        Commands::Bulk { action } => {
            commands::bulk(&client, &store::Store::open()?, action).await?
        }
        Commands::Admin { action } => commands::admin(&client, action).await?,
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            match key.as_str() {
                "server" => config.remote.server = Some(config::normalize_server(&value)),
                "token" => config.remote.token = Some(value),
                _ => anyhow::bail!("Unknown config key: {}. Valid keys: server, token", key),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            let value = match key.as_str() {
                "server" => config.remote.server.unwrap_or_default(),
                "token" => config.remote.token.map(|_| "****").unwrap_or_default().to_string(),
                _ => anyhow::bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("server: {}", config.server(None));
            println!("token: {}", config.remote.token.map(|_| "****").unwrap_or_default());
            println!("email: {}", config.remote.email.unwrap_or_default());
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
