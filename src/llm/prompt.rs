//! Prompt template for trade advice.

use anyhow::Result;

use crate::engine::trigger::AnalysisSnapshot;

/// Build the natural-language prompt for one snapshot. Events and the tick
/// are embedded as pretty-printed JSON, exactly as the feeds delivered them.
pub fn build_prompt(snapshot: &AnalysisSnapshot) -> Result<String> {
    let events = serde_json::to_string_pretty(&snapshot.events)?;
    let tick = serde_json::to_string_pretty(&snapshot.latest_tick)?;

    let mut prompt = String::with_capacity(events.len() + tick.len() + 512);
    prompt.push_str(&format!(
        "Analyze these events for {} and suggest a trading action:\n",
        snapshot.entity_id
    ));
    prompt.push_str("Events:\n");
    prompt.push_str(&events);
    prompt.push_str("\nLatest Market Data:\n");
    prompt.push_str(&tick);
    prompt.push_str(
        "\nShould we buy, sell, or hold? Provide reasoning and suggest:\n\
         1. Order type (market or limit)\n\
         2. Quantity\n\
         3. If limit order, suggest price\n",
    );
    Ok(prompt)
}
