//! Shipping address commands.

use clap::Args;
use hekto_checkout::state::AppState;
use hekto_core::ShippingForm;

use super::CliError;

#[derive(Args)]
pub struct ShippingArgs {
    #[arg(long, default_value = "")]
    pub address: String,
    #[arg(long, default_value = "")]
    pub city: String,
    #[arg(long, default_value = "")]
    pub state: String,
    /// Six-digit PIN code
    #[arg(long, default_value = "")]
    pub pin_code: String,
    /// Ten-digit mobile number
    #[arg(long, default_value = "")]
    pub phone: String,
    #[arg(long)]
    pub landmark: Option<String>,
}

impl From<ShippingArgs> for ShippingForm {
    fn from(args: ShippingArgs) -> Self {
        Self {
            address: args.address,
            city: args.city,
            state: args.state,
            pin_code: args.pin_code,
            phone_number: args.phone,
            landmark: args.landmark,
        }
    }
}

/// Validate and save the shipping address.
#[allow(clippy::print_stdout)]
pub fn set(state: &AppState, args: ShippingArgs) -> Result<(), CliError> {
    let info = state.cart().set_shipping_info(&args.into())?;
    println!("Shipping to {}, {}, {} {}.", info.address, info.city, info.state, info.pin_code);
    Ok(())
}

/// Print the saved shipping address.
#[allow(clippy::print_stdout)]
pub fn show(state: &AppState) {
    let Some(info) = state.cart().shipping_info() else {
        println!("No shipping address saved.");
        return;
    };

    println!("Address:  {}", info.address);
    if let Some(landmark) = &info.landmark {
        println!("Landmark: {landmark}");
    }
    println!("City:     {}", info.city);
    println!("State:    {}", info.state);
    println!("PIN code: {}", info.pin_code);
    println!("Phone:    {}", info.phone_number);
}
