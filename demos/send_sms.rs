// ABOUTME: Example application sending one SMS through a SIM800 modem on a serial port
// ABOUTME: Shows ModemBuilder::connect followed by a link test and send_sms

use argh::FromArgs;
use sim800::client::{ModemBuilder, ModemConnection, ModemOptions, SmsTransmitter};
use sim800::connection::{FlowControl, SerialSettings};
use std::error::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Send a single SMS through a SIM800 modem
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the serial port the modem is attached to (e.g. /dev/ttyUSB0 or COM3)
    #[argh(option, short = 'p')]
    port: String,

    /// the serial baud rate (default: 9600)
    #[argh(option, short = 'b')]
    baud: Option<u32>,

    /// use RTS/CTS hardware flow control
    #[argh(switch)]
    rtscts: bool,

    /// the message to send
    #[argh(option, short = 'm')]
    message: String,

    /// the recipient telephone number
    #[argh(option, short = 't')]
    to: String,

    /// print the modem diagnostic log before exiting
    #[argh(switch, short = 'l')]
    show_log: bool,
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

    let mut serial = SerialSettings::default().with_baud_rate(cli_args.baud.unwrap_or(9600));
    if cli_args.rtscts {
        serial = serial.with_flow_control(FlowControl::Hardware);
    }
    let options = ModemOptions::default().with_serial(serial);

    println!("Connecting to {}", cli_args.port);
    let mut modem = ModemBuilder::new()
        .options(options)
        .connect(&cli_args.port)
        .await
        .map_err(|e| {
            eprintln!("Connection failed: {e}");
            Box::<dyn Error>::from(e.to_string())
        })?;

    if !modem.test_connection().await {
        eprintln!("Warning: modem did not answer AT");
    }

    let result = modem.send_sms(&cli_args.to, &cli_args.message).await;
    match &result {
        Ok(()) => println!("Message sent successfully!"),
        Err(e) => eprintln!("Failed to send message: {e}"),
    }

    if cli_args.show_log {
        print!("{}", modem.logs());
    }

    if let Err(e) = modem.disconnect().await {
        eprintln!("Warning: Disconnect failed: {e}");
    }

    result.map_err(|e| Box::<dyn Error>::from(e.to_string()))
}
