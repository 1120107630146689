//! Cart commands.

use clap::Args;
use hekto_checkout::{AddItemRequest, CheckoutError};
use hekto_checkout::state::AppState;
use hekto_core::{CartLineItem, Price, ProductId};
use rust_decimal::Decimal;

use super::{CliError, line_total_text, print_totals};

#[derive(Args)]
pub struct AddArgs {
    /// Product ID
    pub product_id: String,
    /// Product name as shown on the product page
    #[arg(long)]
    pub name: String,
    /// Unit price as shown on the product page (rupees)
    #[arg(long)]
    pub price: Decimal,
    /// Quantity to put in the cart (clamped to stock, at most 10)
    #[arg(long, default_value_t = 1)]
    pub quantity: u32,
    /// Stock count as shown on the product page
    #[arg(long)]
    pub stock: u32,
    /// Product image URL
    #[arg(long, default_value = "")]
    pub image: String,
}

/// Add a product to the cart.
pub async fn add(state: &AppState, args: AddArgs) -> Result<(), CliError> {
    let unit_price =
        Price::new(args.price).map_err(|e| CliError::Usage(format!("--price: {e}")))?;

    let line = state
        .cart()
        .add_item(AddItemRequest {
            product_id: ProductId::new(args.product_id),
            name: args.name,
            unit_price,
            quantity: args.quantity,
            image_url: args.image,
            available_stock: args.stock,
        })
        .await?;

    print_line_saved(&line, args.quantity);
    Ok(())
}

/// Change the quantity of a cart line.
pub async fn update(state: &AppState, product_id: &str, quantity: u32) -> Result<(), CliError> {
    let line = state
        .cart()
        .update_quantity(&ProductId::new(product_id), quantity)
        .await?;

    print_line_saved(&line, quantity);
    Ok(())
}

/// Remove a product from the cart.
#[allow(clippy::print_stdout)]
pub fn remove(state: &AppState, product_id: &str) -> Result<(), CliError> {
    if state.cart().remove_item(&ProductId::new(product_id))? {
        println!("Removed {product_id} from the cart.");
    } else {
        println!("{product_id} was not in the cart.");
    }
    Ok(())
}

/// Empty the cart.
#[allow(clippy::print_stdout)]
pub fn clear(state: &AppState) -> Result<(), CliError> {
    state.cart().clear_cart()?;
    println!("Cart cleared.");
    Ok(())
}

/// Print the cart with its totals.
#[allow(clippy::print_stdout)]
pub fn show(state: &AppState, json: bool) -> Result<(), CliError> {
    let cart = state.cart().snapshot();
    let totals = state
        .checkout()
        .pricing()
        .totals(&cart)
        .map_err(CheckoutError::from)?;

    if json {
        let body = serde_json::json!({
            "cart": cart,
            "totals": totals,
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| CliError::Usage(format!("failed to encode cart: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    if cart.is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }

    println!("{:<26} {:<30} {:>4} {:>12}", "PRODUCT", "NAME", "QTY", "LINE TOTAL");
    println!("{}", "-".repeat(75));
    for line in &cart.line_items {
        println!(
            "{:<26} {:<30} {:>4} {:>12}",
            line.product_id.as_str(),
            truncate(&line.name, 30),
            line.quantity,
            line_total_text(line)
        );
    }
    println!();
    print_totals(&totals);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_line_saved(line: &CartLineItem, requested: u32) {
    println!(
        "{} x {} ({} each) in cart.",
        line.quantity, line.name, line.unit_price
    );
    if line.quantity != requested {
        println!(
            "Requested {requested}; only {} can be ordered right now.",
            line.max_quantity()
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
