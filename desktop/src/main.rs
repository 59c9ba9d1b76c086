use anyhow::{Context, Result};
use env_logger::Env;
use tokio::sync::mpsc::unbounded_channel;

use perch_desktop::{Config, Server, headless::Headless};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let headless = Headless::create(&config).context("Failed to create the headless platform")?;
    let server = Server::new(config.clone(), headless.platform())?;

    // The sender stays alive until the server returns, so only Ctrl-C ends the session.
    let (events, receiver) = unbounded_channel();
    for event in headless.startup_events(&config.headless) {
        events.send(event)?;
    }

    server.run(receiver).await
}
