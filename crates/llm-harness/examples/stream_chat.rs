use llm_harness::observability::init_observability;
use llm_harness::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    init_observability();

    let config = ProviderConfig::from_env()?;
    let client = StreamingClient::from_config(&config)?;
    let request = StreamRequest::chat(
        &config,
        &[
            ChatMessage::system("Reply briefly."),
            ChatMessage::user("Stream a greeting."),
        ],
        &ChatOptions::new("gpt-4o-mini").include_usage(true),
    )?;

    let mut response = client
        .stream(request, StreamOptions::default().filter_metadata(true))
        .await?;
    for warning in &response.warnings {
        eprintln!("warning: {warning}");
    }

    while let Some(event) = response.events.next_event().await {
        match event {
            StreamEvent::TextDelta { content } => print!("{content}"),
            StreamEvent::Metadata { data } => eprintln!("\nmetadata: {data}"),
            StreamEvent::ToolCall { name, arguments, .. } => {
                eprintln!("\ntool call {name}({arguments})")
            }
            StreamEvent::Finish { reason } => println!("\n[finish: {reason}]"),
            StreamEvent::Error { error } => eprintln!("\nstream error: {error}"),
        }
    }
    Ok(())
}
