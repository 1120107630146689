//! Checkout commands.
//!
//! Every command first resumes the checkout from session storage, so a
//! priced draft left by `checkout start` (or a paid draft left by a failed
//! order submission) is picked up by the next invocation.

use clap::Args;
use hekto_checkout::CheckoutStage;
use hekto_checkout::payment::CardInput;
use hekto_checkout::state::AppState;
use hekto_core::{OrderDraft, ShippingForm};

use super::{CliError, line_total_text, print_totals};

#[derive(Args)]
pub struct PayArgs {
    /// Card number (spaces allowed)
    #[arg(long)]
    pub card: String,
    /// Expiry as MM/YY
    #[arg(long)]
    pub expiry: String,
    #[arg(long)]
    pub cvc: String,
}

/// Begin checkout with the saved shipping address and price the order.
#[allow(clippy::print_stdout)]
pub fn start(state: &AppState) -> Result<(), CliError> {
    let checkout = state.checkout();
    checkout.resume()?;
    checkout.begin(state.config().customer.as_ref())?;

    let shipping = state.cart().shipping_info().ok_or_else(|| {
        CliError::Usage("no shipping address saved; run `hekto shipping set` first".to_string())
    })?;
    let draft = checkout.submit_shipping(&ShippingForm::from(&shipping))?;

    println!("Order priced. Review before paying:");
    print_draft(&draft);
    println!();
    println!("Run `hekto checkout pay` to pay {}.", draft.totals.total_price);
    Ok(())
}

/// Pay for the priced order.
#[allow(clippy::print_stdout)]
pub async fn pay(state: &AppState, args: PayArgs) -> Result<(), CliError> {
    let checkout = state.checkout();
    checkout.resume()?;

    let card = CardInput {
        number: args.card,
        expiry: args.expiry,
        cvc: args.cvc,
    };
    let receipt = checkout.pay(state.config().customer.as_ref(), &card).await?;

    println!("Payment received. Order {} placed.", receipt.order_id);
    println!("Status: {:?}", receipt.status);
    Ok(())
}

/// Print the current stage and the saved draft.
#[allow(clippy::print_stdout)]
pub fn status(state: &AppState, json: bool) -> Result<(), CliError> {
    let checkout = state.checkout();
    let stage = checkout.resume()?;
    let draft = checkout.draft()?;

    if json {
        let body = serde_json::json!({
            "stage": stage,
            "draft": draft,
            "checkoutEnabled": checkout.checkout_enabled(),
            "submitEnabled": checkout.submit_enabled(),
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| CliError::Usage(format!("failed to encode status: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("Stage: {stage}");
    if let CheckoutStage::Failed(failure) = &stage {
        println!("  {}", failure.message);
        if failure.retriable {
            println!("  You can try paying again.");
        }
    }
    match draft {
        Some(draft) => {
            println!();
            print_draft(&draft);
        }
        None => println!("No order in progress."),
    }
    Ok(())
}

/// Abandon an unpaid draft.
#[allow(clippy::print_stdout)]
pub fn cancel(state: &AppState) -> Result<(), CliError> {
    let checkout = state.checkout();
    checkout.resume()?;
    checkout.abandon()?;
    println!("Checkout cancelled. Your cart has been kept.");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_draft(draft: &OrderDraft) {
    println!("Order {}", draft.draft_id);
    for line in &draft.order_items {
        println!("  {} x {}  {}", line.quantity, line.name, line_total_text(line));
    }
    let ship = &draft.shipping_info;
    println!("Ship to: {}, {}, {} {}", ship.address, ship.city, ship.state, ship.pin_code);
    if let Some(payment) = &draft.payment_info {
        println!("Payment: {} ({})", payment.id, payment.status);
    } else if let Some(intent_id) = &draft.payment_attempt {
        println!("Payment attempt: {intent_id} (outcome not recorded)");
    }
    print_totals(&draft.totals);
}
