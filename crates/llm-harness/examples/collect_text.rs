use std::time::Duration;

use llm_harness::observability::init_observability;
use llm_harness::prelude::*;

// Works against local inference servers that close the stream without a
// terminal frame, e.g. OPENAI_BASE_URL=http://localhost:11434.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    init_observability();

    let config = ProviderConfig::from_env()?;
    let client = StreamingClient::from_config(&config)?;
    let request = StreamRequest::chat(
        &config,
        &[ChatMessage::user("Say hello")],
        &ChatOptions::new(std::env::var("MODEL").unwrap_or_else(|_| "gpt-4o-mini".into())),
    )?;

    let options = StreamOptions::default()
        .detect_end_of_stream(true)
        .idle_timeout(Duration::from_secs(5));
    let text = client.stream(request, options).await?.events.collect_text().await?;
    println!("{text}");
    Ok(())
}
