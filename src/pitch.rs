//! Prompt and grounding facts for the streaming pitch assistant.

use crate::openai::ChatMessage;

const MAX_VISITOR_CHARS: usize = 4000;

pub const PITCH_SYSTEM_PROMPT: &str = "\
You are \"Nico's Pitch Assistant\" — a concise, friendly expert that speaks like a senior \
full-stack engineer who also understands product/business outcomes. Your goal is to help \
prospective clients evaluate Nico and why they should hire him. Keep answers crisp, concrete, \
and benefit-focused.

About Nico:
- Senior freelance full-stack dev (10+ yrs). Former niche: Shopify (custom apps, headless \
storefronts), now pivoting into AI/RAG systems. Values type safety, clean DX, and polished delivery.
- Recent work: RAG demo (file upload, embeddings, vector search, streaming responses), \
Shopify custom apps/integrations, headless storefronts, 3D product tools, booking systems.
- Positioning: flexible freelance, not rigid FT; premium craftsmanship; fast ramp-up; clear \
communication; well-documented handovers.

Voice & style:
- Warm, confident, specific. 1-3 short paragraphs, then bullets if helpful. Avoid hype; show outcomes.
- Use client language (revenue, conversion, time-to-value, maintainability).
- Gently steer off-topic questions back to hiring context.

When asked about:
- Rates: offer sensible bands (day rate / project-based) and suggest a short scoping call.
- Process: explain a lightweight, transparent process (discovery -> scoped plan -> iterative \
delivery -> handover).
- Timeline: give realistic ranges with dependencies; propose a mini-discovery to confirm.
- Tech: explain tradeoffs clearly; map tech choices to business impact.

CTAs:
- End with a clear CTA: \"Want a quick 15-min scoping call?\" and an email placeholder.
- If they ask for proof: link to portfolio placeholders or offer tailored case studies.

Guardrails:
- If the user goes far off-topic, briefly answer then pivot back to exploring a build.
- Never invent employers or confidential details. If unsure, offer a sample instead.";

pub const HIGHLIGHTS: &[&str] = &[
    "10+ years shipping production apps; Shopify custom apps & headless storefronts.",
    "AI/RAG: embeddings, metadata filters, re-ranking, streaming, per-user corpora.",
    "Type-safety-first; testing mindset; clear READMEs; smooth handovers.",
    "Strong product sense: scopes tightly, delivers iteratively, communicates proactively.",
];

pub const FAQ: &[(&str, &str)] = &[
    (
        "What problems do you solve best?",
        "E-commerce performance & DX upgrades, AI assistants over proprietary content, robust \
         integrations, and fast prototypes that can graduate to production.",
    ),
    (
        "How do you work?",
        "Mini-discovery -> crisp scope & milestones -> weekly demos -> documented handover. \
         Flexible to your rituals.",
    ),
    (
        "Rates?",
        "Day rate or fixed-scope. For typical scopes I propose a short 15-min call to align and \
         share a ballpark.",
    ),
    (
        "Tech?",
        "Rust/TS/Node/React, Postgres, OpenAI, Shopify/GraphQL. Boring, reliable defaults unless \
         you need something fancy.",
    ),
];

/// Builds the two-message prompt for one visitor turn.
///
/// The visitor text is clamped to 4000 characters before it reaches the
/// model; the grounding facts ride along in the user message so the system
/// prompt stays static and cacheable.
pub fn build_messages(visitor_text: &str) -> Vec<ChatMessage> {
    let text: String = visitor_text.trim().chars().take(MAX_VISITOR_CHARS).collect();

    let facts = format!(
        "Key highlights:\n- {}\n\nFAQs:\n{}",
        HIGHLIGHTS.join("\n- "),
        FAQ.iter()
            .map(|(q, a)| format!("Q: {q}\nA: {a}"))
            .collect::<Vec<_>>()
            .join("\n\n"),
    );

    vec![
        ChatMessage::system(PITCH_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Use these facts for grounding (do not recite verbatim):\n{facts}\n\n\
             Prospect: {text}\n\
             Goal: Persuasive, concise answer + one clear CTA."
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_facts_and_visitor_text() {
        let messages = build_messages("Do you do Shopify work?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("Key highlights:"));
        assert!(messages[1].content.contains("Do you do Shopify work?"));
    }

    #[test]
    fn visitor_text_is_clamped() {
        let long = "x".repeat(10_000);
        let messages = build_messages(&long);
        assert!(messages[1].content.len() < 10_000);
    }
}
