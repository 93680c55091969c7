//! Prompt construction for plan generation.
//!
//! Pure and deterministic: the same kind, context, and retry flag always
//! produce the same string.

use somni_db::models::PlanKind;

use crate::context::PlanContext;

/// Exact reply the model must give when it cannot build a plan.
pub const INSUFFICIENT_DATA_REPLY: &str = r#"{"error":"insufficient_data","reason":"<cause>"}"#;

/// Shape of the expected JSON body.
const SHAPE_HINT: &str = r#"```json
{
  "planType": "<plan kind>",
  "title": "string",
  "summary": "string",
  "schedule": {
    "bedtime": "HH:MM",
    "wakeTime": "HH:MM",
    "meals": [{ "time": "HH:MM", "type": "string", "description": "string" }],
    "activities": [{ "time": "HH:MM", "activity": "string", "duration": "string", "description": "string" }],
    "naps": [{ "time": "HH:MM", "duration": "string", "description": "string (optional)" }]
  },
  "objectives": ["string"],
  "recommendations": ["string"],
  "window": { "from": "ISO-8601 timestamp", "to": "ISO-8601 timestamp" },
  "metrics": {
    "eventCount": 0,
    "distinctTypes": 0,
    "byType": { "<event type>": 0 },
    "ageInMonths": 0
  },
  "metadata": { "ragSources": ["string"], "notes": "string (optional)" }
}
```
"#;

const OUTPUT_RULES: &str = "\
## Output Rules

- Respond with one JSON object and nothing else. No prose, no Markdown, \
no code fences before or after the object.
- Every field above is required unless marked optional. Use the exact key \
names and JSON types shown; numbers are numbers, strings are strings.
- Every `time`, `bedtime`, and `wakeTime` value is a 24-hour `HH:MM` time \
with two-digit hours (for example `07:05`, `19:30`).
- Copy `window` and `metrics` from the context below. Use `null` for \
`ageInMonths` when the context has no age.
- Recommendations must be concrete and appropriate for the child's age.
";

/// Appended to the prompt on the second attempt, regardless of why the
/// first one failed.
pub const RETRY_SUFFIX: &str = "\
## Correction

Your previous response could not be used. It was not valid JSON or did not \
match the required shape. Respond again with a single JSON object that \
matches the shape above exactly, with every required field present and \
every time in 24-hour HH:MM format. Output the JSON object only.
";

fn kind_guidance(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Initial => {
            "This is the child's first plan. Base it primarily on the parent's \
             survey answers; logged events may be sparse or absent."
        }
        PlanKind::EventBased => {
            "Base the plan on the patterns in the logged events: sleep, nap, \
             and feeding counts over the window. Use survey answers only to \
             fill gaps."
        }
        PlanKind::TranscriptRefinement => {
            "Refine the child's routine using the extra context, which holds \
             notes or a transcript from a consultation. Keep what the logged \
             events support and change what the consultation asks for."
        }
    }
}

/// Build the instruction string for one attempt.
pub fn build_prompt(kind: PlanKind, context: &PlanContext, retry: bool) -> String {
    let mut prompt = String::with_capacity(4096);

    prompt.push_str("# Daily Routine Plan\n\n");
    prompt.push_str(
        "You are a pediatric sleep consultant. Produce a daily routine plan \
         for the child described in the context below.\n\n",
    );
    prompt.push_str(&format!("- **Plan kind:** `{kind}`\n"));
    prompt.push_str(&format!("- **Guidance:** {}\n\n", kind_guidance(kind)));

    prompt.push_str("## Required Shape\n\n");
    prompt.push_str(SHAPE_HINT);
    prompt.push('\n');
    prompt.push_str(OUTPUT_RULES);
    prompt.push('\n');

    prompt.push_str("## Insufficient Information\n\n");
    prompt.push_str(
        "If the context does not hold enough information for a safe, specific \
         plan, respond with exactly this object and nothing else:\n\n",
    );
    prompt.push_str(INSUFFICIENT_DATA_REPLY);
    prompt.push_str("\n\n");

    // PlanContext has only string map keys, so serialization cannot fail.
    let context_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| String::from("{}"));
    prompt.push_str("## Context\n\n");
    prompt.push_str(&context_json);
    prompt.push('\n');

    if retry {
        prompt.push('\n');
        prompt.push_str(RETRY_SUFFIX);
    }

    prompt
}
