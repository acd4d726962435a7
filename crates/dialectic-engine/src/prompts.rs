//! Prompt templates for each phase and the conflict classifier.
//!
//! Templates live in `prompts/*.md` and use `{name}` placeholders.

/// System preamble shared by the thesis, antithesis, and synthesis calls.
pub const DIALECTIC_SYSTEM: &str = include_str!("prompts/system.md");

pub const THESIS_TEMPLATE: &str = include_str!("prompts/thesis.md");
pub const ANTITHESIS_TEMPLATE: &str = include_str!("prompts/antithesis.md");
pub const SYNTHESIS_TEMPLATE: &str = include_str!("prompts/synthesis.md");
pub const PERSPECTIVE_TEMPLATE: &str = include_str!("prompts/perspective.md");

/// System prompt for the conflict classifier sub-call.
pub const CONFLICT_SYSTEM: &str = include_str!("prompts/conflict_system.md");
pub const CONFLICT_TEMPLATE: &str = include_str!("prompts/conflict.md");

/// Placeholder used in the synthesis prompt when the antithesis yielded no contradictions.
pub const NO_CONTRADICTIONS: &str = "None noted";

/// Substitute `{name}` placeholders in a single pass.
///
/// Values are never re-scanned, so model output containing `{query}` stays literal.
/// Braces that don't name a known variable (e.g. JSON examples) are kept as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn thesis_prompt(query: &str) -> String {
    render(THESIS_TEMPLATE, &[("query", query)])
}

pub fn antithesis_prompt(query: &str, thesis: &str) -> String {
    render(ANTITHESIS_TEMPLATE, &[("query", query), ("thesis", thesis)])
}

pub fn synthesis_prompt(
    query: &str,
    thesis: &str,
    antithesis: &str,
    contradictions: &[String],
) -> String {
    let bullets = format_contradictions(contradictions);
    render(
        SYNTHESIS_TEMPLATE,
        &[
            ("query", query),
            ("thesis", thesis),
            ("antithesis", antithesis),
            ("contradictions", &bullets),
        ],
    )
}

pub fn perspective_prompt(query: &str, thesis: &str, perspective: &str) -> String {
    render(
        PERSPECTIVE_TEMPLATE,
        &[
            ("query", query),
            ("thesis", thesis),
            ("perspective", perspective),
        ],
    )
}

pub fn conflict_prompt(thesis_excerpt: &str, antithesis_excerpt: &str) -> String {
    render(
        CONFLICT_TEMPLATE,
        &[("thesis", thesis_excerpt), ("antithesis", antithesis_excerpt)],
    )
}

/// Render contradictions as a markdown bullet list, or the "None noted" placeholder.
pub fn format_contradictions(contradictions: &[String]) -> String {
    if contradictions.is_empty() {
        return NO_CONTRADICTIONS.to_string();
    }
    contradictions
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}
