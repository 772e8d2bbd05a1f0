// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction appended to every prompt that restructures resume content.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Keep every value faithful to the resume text you are given. \
    Do NOT infer, interpolate, or invent names, dates, employers, metrics or links. \
    If the resume does not contain a value, leave the field empty.";

/// Instruction that forbids wrapper text around machine-consumed output.
pub const RAW_OUTPUT_INSTRUCTION: &str = "\
    Output the requested content only. \
    Do NOT use markdown code fences. \
    Do NOT include headings, explanations or apologies.";
