//! Hekto CLI - drive the cart and checkout flow from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add two chairs to the cart (price and stock as shown on the product page)
//! hekto cart add 64f1a2b3c4d5e6f708091011 --name "Mini LCW Chair" --price 500 --stock 12 --quantity 2
//!
//! # Save a shipping address
//! hekto shipping set --address "12 MG Road" --city Bengaluru --state Karnataka \
//!     --pin-code 560001 --phone 9876543210
//!
//! # Price the order, then pay (test mode accepts 4242 4242 4242 4242)
//! hekto checkout start
//! hekto checkout pay --card "4242 4242 4242 4242" --expiry 12/30 --cvc 123
//! ```
//!
//! # Commands
//!
//! - `cart add|update|remove|clear|show` - Manage the cart
//! - `shipping set|show` - Manage the shipping address
//! - `checkout start|pay|status|cancel` - Run the checkout
//!
//! Configuration is read from the environment; see `hekto_checkout::config`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use hekto_checkout::config::CheckoutConfig;
use hekto_checkout::error::set_sentry_user;
use hekto_checkout::state::AppState;
use hekto_checkout::telemetry;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "hekto")]
#[command(author, version, about = "Hekto cart and checkout")]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the shipping address
    Shipping {
        #[command(subcommand)]
        action: ShippingAction,
    },
    /// Run the checkout
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product, or change the quantity of one already in the cart
    Add(commands::cart::AddArgs),
    /// Change the quantity of a line
    Update {
        /// Product ID
        product_id: String,
        /// New quantity (clamped to stock, at most 10)
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product_id: String,
    },
    /// Empty the cart (the shipping address is kept)
    Clear,
    /// Show the cart and its totals
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShippingAction {
    /// Validate and save the shipping address
    Set(commands::shipping::ShippingArgs),
    /// Show the saved shipping address
    Show,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Start checkout with the saved shipping address and price the order
    Start,
    /// Pay for the priced order
    Pay(commands::checkout::PayArgs),
    /// Show where the checkout stands
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Abandon the priced order (the cart is kept)
    Cancel,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CheckoutConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(cli.json_logs);
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(cli.json_logs);

    if let Some(customer) = &config.customer {
        set_sentry_user(&customer.id, Some(customer.email.as_str()));
    }

    if let Err(e) = run(cli.command, config).await {
        e.report();
        e.print();
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: CheckoutConfig) -> Result<(), CliError> {
    let state = AppState::new(config)?;

    match command {
        Commands::Cart { action } => match action {
            CartAction::Add(args) => commands::cart::add(&state, args).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&state, &product_id, quantity).await?,
            CartAction::Remove { product_id } => commands::cart::remove(&state, &product_id)?,
            CartAction::Clear => commands::cart::clear(&state)?,
            CartAction::Show { json } => commands::cart::show(&state, json)?,
        },
        Commands::Shipping { action } => match action {
            ShippingAction::Set(args) => commands::shipping::set(&state, args)?,
            ShippingAction::Show => commands::shipping::show(&state),
        },
        Commands::Checkout { action } => match action {
            CheckoutAction::Start => commands::checkout::start(&state)?,
            CheckoutAction::Pay(args) => commands::checkout::pay(&state, args).await?,
            CheckoutAction::Status { json } => commands::checkout::status(&state, json)?,
            CheckoutAction::Cancel => commands::checkout::cancel(&state)?,
        },
    }
    Ok(())
}
