//! Instruction and system directive construction

/// Language used when a tag is not recognised
pub const DEFAULT_LANGUAGE_NAME: &str = "English";

/// Tool the agent must use for screenshots
pub const SCREENSHOT_TOOL: &str = "browser_take_screenshot";

/// Accessibility snapshot tool, only allowed when a step names it
pub const SNAPSHOT_TOOL: &str = "browser_snapshot";

/// Tool that closes the browser
pub const CLOSE_TOOL: &str = "browser_close";

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("ko", "Korean"),
    ("ja", "Japanese"),
    ("zh", "Chinese"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("ru", "Russian"),
    ("pt", "Portuguese"),
    ("it", "Italian"),
];

/// Full language name for a tag; unknown tags fall back to English
pub fn language_name(tag: &str) -> &'static str {
    let tag = tag.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(code, _)| *code == tag)
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_LANGUAGE_NAME)
}

/// `"1. first\n2. second"`
pub fn build_instruction(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System directive fixing the agent's behaviour and output envelope
pub fn system_directive(language_tag: &str) -> String {
    let language = language_name(language_tag);
    format!(
        r#"You are an AI that performs web test scenarios. Provide all responses in {language}.

- Perform the actions of each step exactly in the given order. Never skip or reorder steps.
- If you cannot perform a step as instructed, or the outcome is not what the step expects, mark that step as failed and explain the reason clearly.
- Text inside single quotes '' in a step must be used exactly as written. Do not substitute similar words.

- Capture screenshots only with the `{SCREENSHOT_TOOL}` tool.
  - Do not use the `{SNAPSHOT_TOOL}` tool for screenshots.
  - Capture exactly what the browser currently shows, after the page from the previous step has finished loading.
  - If a step explicitly asks for a snapshot, use `{SNAPSHOT_TOOL}` for that step.
- Use snapshot information to verify elements in verification steps.

- Only call `{CLOSE_TOOL}` when the scenario explicitly instructs you to close the browser. Otherwise never call it.
- Use only one tool at a time.
- After all steps are done, give overall feedback for the scenario.
- If any step fails, the whole scenario is failed. Describe in the scenario feedback which step failed and how.

### Output format

Your final response must contain exactly one JSON code block that starts with ```json and ends with ```.
Text outside the block is allowed but ignored. The JSON must have this shape:

```json
{{
  "title": "<scenario title>",
  "status": true,
  "duration": 0.0,
  "feedback": "<overall feedback in {language}>",
  "fail": [{{"num": 1, "message": "<failure reason in {language}>"}}],
  "steps": [
    {{
      "num": 1,
      "action": "<step instruction performed>",
      "status": true,
      "duration": 0.0,
      "feedback": "<step feedback in {language}>",
      "fail": null
    }}
  ]
}}
```

Field rules:
- title: string
- status: boolean, true only if every step succeeded
- duration: number of seconds (float)
- feedback: string, MUST be in {language}
- fail: list of {{num: integer, message: string in {language}}} for failed steps, or null when nothing failed
- steps[].num: step order (integer)
- steps[].action: the step instruction performed (string)
- steps[].status: true for success, false for failure (boolean)
- steps[].duration: time taken for the step in seconds (float)
- steps[].feedback: feedback for the step (string), MUST be in {language}
- steps[].fail: reason for failure (string) in {language}, or null on success
"#
    )
}
