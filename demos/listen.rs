// ABOUTME: Example application printing inbound SMS received by a SIM800 modem
// ABOUTME: Registers an inbound handler and keeps the link alive until Ctrl+C

use argh::FromArgs;
use sim800::client::{InboundSms, ModemBuilder, ModemConnection};
use std::error::Error;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Print every SMS the modem receives
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the serial port the modem is attached to (e.g. /dev/ttyUSB0 or COM3)
    #[argh(option, short = 'p')]
    port: String,

    /// seconds between link tests (default: 60)
    #[argh(option, short = 'i')]
    test_interval: Option<u64>,
}

fn print_message(sms: InboundSms) {
    println!("From {}: {}", sms.sender, sms.body);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let level = if cli_args.debugging {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut modem = ModemBuilder::new()
        .on_message(print_message)
        .connect(&cli_args.port)
        .await
        .map_err(|e| Box::<dyn Error>::from(e.to_string()))?;
    info!("Listening on {}", cli_args.port);

    let mut ticker =
        tokio::time::interval(Duration::from_secs(cli_args.test_interval.unwrap_or(60)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if !modem.test_connection().await {
                    warn!("Modem did not answer AT");
                }
            }
        }
    }

    modem.disconnect().await?;
    Ok(())
}
