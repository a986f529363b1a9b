// Shared prompt fragments. Each feature that calls the model defines its own
// prompts.rs alongside it; this file holds the cross-cutting pieces.

/// Instruction appended to every prompt that expects a JSON object back.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Respond with valid JSON only, matching the schema exactly. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
