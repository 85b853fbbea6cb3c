//! Example of an SMS echo service: every received message is answered with its own text.
//!
//! Usage: `sms_gateway [config.json]`, see `ModemConfig` for the keys.

use rpi_sim7000::{gateway::Gateway, ModemConfig, TaskJoinHandle};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: ModemConfig = match std::env::args().nth(1) {
        Some(path) => ModemConfig::from_file(path)?,
        None => ModemConfig::default(),
    };
    rpi_sim7000::init_logger(config.log_level);

    let (mut gateway, handle) = Gateway::from_config(&config)?;
    let (inbox, mut received) = mpsc::unbounded_channel::<(String, String)>();

    // callbacks run inside the engine tick, hand the work over to the main task
    gateway.modem_mut().on_received(move |number, date, text| {
        println!("{number} wrote at {date}: {text}");
        let _ = inbox.send((number.to_string(), text.to_string()));
    });
    gateway.modem_mut().on_sent(|number, date, text| {
        println!("Sent to {number} at {date}: {text}");
    });
    gateway
        .modem_mut()
        .on_line(|line| println!("Modem says: {line}"));

    let runner = tokio::spawn(gateway.run());

    while let Some((number, text)) = received.recv().await {
        let reply: TaskJoinHandle<()> = handle.send_sms(&number, &format!("Echo: {text}"));
        if let Err(e) = reply.await? {
            println!("Problem with answering {number}: {e}");
        }
    }

    drop(handle);
    runner.await??;
    Ok(())
}
