//! Extract structured contradictions and research proposals from free-form model output.
//!
//! Both parsers are line scans that never fail: text without markers yields an empty
//! list, and a half-finished item (header without evidence/prediction) is kept bare.
//! Contradiction headers match by prefix after trim, emphasis removal and case-fold,
//! so `**Contradiction 2: ...**` and `CONTRADICTION: ...` resolve the same way.
//! Research labels must match exactly (`RESEARCH_PROPOSAL:`, `TESTABLE_PREDICTION:`),
//! up to case and emphasis.

use crate::llm::strip_think_blocks;

/// Description used when a contradiction header has nothing after its colon.
pub const UNSPECIFIED_CONTRADICTION: &str = "Unspecified contradiction";

const EMPHASIS_WRAPPERS: [&str; 4] = ["**", "__", "*", "_"];
const EMPHASIS_CHARS: [char; 2] = ['*', '_'];

/// Repeatedly strip symmetric markdown emphasis (`**x**`, `__x__`, `*x*`, `_x_`) from a line.
fn strip_emphasis(line: &str) -> &str {
    let mut s = line.trim();
    loop {
        let wrapper = EMPHASIS_WRAPPERS
            .iter()
            .find(|w| s.len() >= 2 * w.len() && s.starts_with(**w) && s.ends_with(**w));
        match wrapper {
            Some(w) => s = s[w.len()..s.len() - w.len()].trim(),
            None => return s,
        }
    }
}

/// Clean the value after a label's colon: drop emphasis left over from `**LABEL:** value`.
fn clean_value(rest: &str) -> &str {
    strip_emphasis(rest)
        .trim_start_matches(EMPHASIS_CHARS)
        .trim()
}

/// If the label before the first colon starts with `label` (case-insensitive),
/// return the cleaned text after the colon. Lines without a colon never match.
fn labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    label_matches(head, label).then(|| clean_value(rest))
}

/// Like [`labelled`], but the whole label must equal `label`.
fn exactly_labelled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let (head, rest) = line.split_once(':')?;
    (normalize_label(head) == label).then(|| clean_value(rest))
}

fn normalize_label(head: &str) -> String {
    head.trim().trim_matches(EMPHASIS_CHARS).trim().to_uppercase()
}

fn label_matches(head: &str, label: &str) -> bool {
    normalize_label(head).starts_with(label)
}

/// Evidence lines only need to start with `EVIDENCE`; the colon is optional.
fn evidence_value(line: &str) -> Option<&str> {
    match line.split_once(':') {
        Some((head, rest)) if label_matches(head, "EVIDENCE") => Some(clean_value(rest)),
        Some(_) => None,
        None => label_matches(line, "EVIDENCE").then_some(""),
    }
}

/// Parse `CONTRADICTION: ... / EVIDENCE: ...` pairs from antithesis text.
///
/// Each entry is `"<description>"` or `"<description> — <evidence>"`, in order of
/// appearance. A header followed by another header (or end of text) is kept bare.
pub fn extract_contradictions(text: &str) -> Vec<String> {
    let text = strip_think_blocks(text);
    let mut contradictions = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = strip_emphasis(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(description) = labelled(line, "CONTRADICTION") {
            if let Some(previous) = pending.take() {
                contradictions.push(previous);
            }
            pending = Some(if description.is_empty() {
                UNSPECIFIED_CONTRADICTION.to_string()
            } else {
                description.to_string()
            });
        } else if let Some(evidence) = evidence_value(line)
            && let Some(description) = pending.take()
        {
            if evidence.is_empty() {
                contradictions.push(description);
            } else {
                contradictions.push(format!("{} — {}", description, evidence));
            }
        }
    }

    contradictions.extend(pending);
    contradictions
}

/// Parse `RESEARCH_PROPOSAL: ... / TESTABLE_PREDICTION: ...` pairs from synthesis text.
///
/// Each entry is `"<proposal>"`, `"<proposal> | Prediction: <prediction>"`, or, for a
/// prediction with no open proposal, `"Prediction: <prediction>"`.
pub fn extract_research_proposals(text: &str) -> Vec<String> {
    let text = strip_think_blocks(text);
    let mut proposals = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = strip_emphasis(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(proposal) = exactly_labelled(line, "RESEARCH_PROPOSAL") {
            if let Some(previous) = pending.take() {
                proposals.push(previous);
            }
            pending = (!proposal.is_empty()).then(|| proposal.to_string());
        } else if let Some(prediction) = exactly_labelled(line, "TESTABLE_PREDICTION") {
            match pending.take() {
                Some(proposal) if prediction.is_empty() => proposals.push(proposal),
                Some(proposal) => {
                    proposals.push(format!("{} | Prediction: {}", proposal, prediction));
                }
                None if !prediction.is_empty() => {
                    proposals.push(format!("Prediction: {}", prediction));
                }
                None => {}
            }
        }
    }

    proposals.extend(pending);
    proposals
}
