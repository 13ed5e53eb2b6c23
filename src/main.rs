use billing_bridge::application::dispatcher::BillingClient;
use billing_bridge::application::propagator::ResultPropagator;
use billing_bridge::config::StoreConfig;
use billing_bridge::domain::flow::{PurchaseOptions, UpgradeParameters};
use billing_bridge::domain::ports::SurfaceRef;
use billing_bridge::domain::product::ProductType;
use billing_bridge::infrastructure::executor::{SerialWorker, UiThread};
use billing_bridge::infrastructure::in_memory::{HeadlessSurface, InMemoryBillingService};
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store configuration JSON file
    #[arg(long)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report which optional billing features the store supports
    Features,
    /// Look up product details
    Products {
        #[arg(long = "type", value_enum, default_value = "one-time")]
        product_type: Kind,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Buy a one-time product
    Buy {
        product_id: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Buy a subscription with its first offer
    Subscribe {
        product_id: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Replace an owned subscription
    Upgrade {
        product_id: String,
        /// Purchase token of the subscription being replaced
        #[arg(long)]
        old_token: String,
        /// Vendor replacement mode code
        #[arg(long, default_value_t = 1)]
        mode: i32,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// List owned purchases
    Purchases {
        #[arg(long = "type", value_enum, default_value = "one-time")]
        product_type: Kind,
    },
    /// Consume a one-time purchase
    Consume { token: String },
    /// Acknowledge a purchase
    Acknowledge { token: String },
}

#[derive(Args)]
struct OptionArgs {
    /// Obfuscated account id attached to the purchase
    #[arg(long)]
    account_id: Option<String>,
    /// Obfuscated profile id attached to the purchase
    #[arg(long)]
    profile_id: Option<String>,
}

impl From<OptionArgs> for PurchaseOptions {
    fn from(args: OptionArgs) -> Self {
        PurchaseOptions {
            obfuscated_account_id: args.account_id,
            obfuscated_profile_id: args.profile_id,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    OneTime,
    Subscription,
}

impl From<Kind> for ProductType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::OneTime => ProductType::OneTime,
            Kind::Subscription => ProductType::Subscription,
        }
    }
}

fn print_line(value: &Value) {
    println!("{}", value);
}

/// Starts a callback-style call and waits for its single answer.
async fn call<T>(start: impl FnOnce(oneshot::Sender<T>)) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    start(tx);
    rx.await.into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::from_path(&cli.store).into_diagnostic()?;

    let propagator = Arc::new(ResultPropagator::new());
    propagator.subscribe_fn(|outcome, purchases| {
        print_line(&json!({
            "event": "purchases_updated",
            "outcome": outcome,
            "purchases": purchases,
        }));
    });

    let service = Arc::new(InMemoryBillingService::new(config, propagator));
    let client = BillingClient::new(
        service,
        Arc::new(SerialWorker::start().into_diagnostic()?),
        Arc::new(UiThread::start().into_diagnostic()?),
    );
    let surface: SurfaceRef = Arc::new(HeadlessSurface::new("cli"));

    let result = match cli.command {
        Command::Features => {
            let product_details = call(|tx| {
                client.is_product_details_supported(move |supported| {
                    let _ = tx.send(supported);
                })
            })
            .await?;
            let subscriptions = call(|tx| {
                client.is_subscriptions_supported(move |supported| {
                    let _ = tx.send(supported);
                })
            })
            .await?;
            let subscriptions_update = call(|tx| {
                client.is_subscriptions_update_supported(move |supported| {
                    let _ = tx.send(supported);
                })
            })
            .await?;
            json!({
                "event": "features",
                "product_details": product_details,
                "subscriptions": subscriptions,
                "subscriptions_update": subscriptions_update,
            })
        }
        Command::Products { product_type, ids } => {
            let (outcome, products) = call(|tx| {
                client.query_product_details(product_type.into(), ids, move |outcome, products| {
                    let _ = tx.send((outcome, products));
                })
            })
            .await?;
            json!({ "event": "products", "outcome": outcome, "products": products })
        }
        Command::Buy {
            product_id,
            options,
        } => {
            let outcome = call(|tx| {
                client.buy_new(surface, product_id, options.into(), move |outcome| {
                    let _ = tx.send(outcome);
                })
            })
            .await?;
            json!({ "event": "launch", "outcome": outcome })
        }
        Command::Subscribe {
            product_id,
            options,
        } => {
            let outcome = call(|tx| {
                client.buy_subscription(surface, product_id, options.into(), move |outcome| {
                    let _ = tx.send(outcome);
                })
            })
            .await?;
            json!({ "event": "launch", "outcome": outcome })
        }
        Command::Upgrade {
            product_id,
            old_token,
            mode,
            options,
        } => {
            let upgrade = UpgradeParameters::new(old_token, mode);
            let outcome = call(|tx| {
                client.upgrade_subscription(
                    surface,
                    product_id,
                    upgrade,
                    options.into(),
                    move |outcome| {
                        let _ = tx.send(outcome);
                    },
                )
            })
            .await?;
            json!({ "event": "launch", "outcome": outcome })
        }
        Command::Purchases { product_type } => {
            let (outcome, purchases) = call(|tx| {
                client.query_purchases(product_type.into(), move |outcome, purchases| {
                    let _ = tx.send((outcome, purchases));
                })
            })
            .await?;
            json!({ "event": "purchases", "outcome": outcome, "purchases": purchases })
        }
        Command::Consume { token } => {
            let (outcome, token) = call(|tx| {
                client.consume(token, move |outcome, token| {
                    let _ = tx.send((outcome, token));
                })
            })
            .await?;
            json!({ "event": "consume", "outcome": outcome, "purchase_token": token })
        }
        Command::Acknowledge { token } => {
            let outcome = call(|tx| {
                client.acknowledge(token, move |outcome| {
                    let _ = tx.send(outcome);
                })
            })
            .await?;
            json!({ "event": "acknowledge", "outcome": outcome })
        }
    };

    print_line(&result);
    Ok(())
}
