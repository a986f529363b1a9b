// Prompt constants for idea generation.
// Reuses the JSON-only fragment from llm_client::prompts.

/// Idea prompt template. Replace every `{placeholder}` before sending.
pub const IDEA_PROMPT_TEMPLATE: &str = r#"You are a startup strategist. Propose ONE original, specific startup idea.

Founder inputs:
- Preferences: {preferences}
- Constraints: {constraints}
- Industry: {industry}
- Budget: {budget}
- Difficulty: {difficulty}

Market research:
{research}

Return a JSON object with this EXACT schema (no extra fields):
{
  "title": "short product name",
  "problem": "the problem, one or two sentences",
  "solution": "how the product solves it, two or three sentences",
  "market_size": "estimated market size with a figure",
  "target_audience": "who buys it",
  "revenue_streams": ["stream one", "stream two"],
  "validation_data": {
    "market_trends": ["trend one", "trend two"],
    "competitor_analysis": "one or two sentences on competitors",
    "demand_indicators": ["indicator one", "indicator two"]
  }
}

{json_only_instruction}"#;

/// Shown in place of any founder input that was not provided.
pub const NOT_SPECIFIED: &str = "not specified";
