use relayq::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct WelcomeEmailHandler;

#[async_trait::async_trait]
impl JobHandler for WelcomeEmailHandler {
    async fn execute(&self, payload: &serde_json::Value) -> RelayResult<()> {
        println!("sending welcome email to {}", payload["email"]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> RelayResult<()> {
    tracing_subscriber::fmt::init();

    let relay = Relay::new(RelayConfig::development(), Arc::new(WelcomeEmailHandler))?;

    relay
        .enqueue(json!({ "email": "user@example.com" }), EnqueueOptions::new())
        .await?;
    relay
        .enqueue(
            json!({ "email": "late@example.com" }),
            EnqueueOptions::new().with_delay(Duration::from_secs(5)),
        )
        .await?;

    relay.start().await?;
    println!("relay is processing, press Ctrl+C to stop");

    relay.wait_for_shutdown().await?;

    let counts = relay.counts().await?;
    println!(
        "done: {} completed, {} failed, {} still waiting",
        counts.completed, counts.failed, counts.waiting
    );
    Ok(())
}
