//! Instructions sent to the text models.
//!
//! Every instruction the pipeline sends lives here, so unit tests can
//! inspect prompts directly without a model. Callers can replace the
//! stage-level instruction through
//! [`crate::config::PodcastConfig::system_prompts`]; the functions here are
//! used only when no override is provided.

use crate::config::{Length, PodcastFormat, Style};
use crate::pipeline::turns::{serialize_turns, Turn};

// ── Stage 1 ──────────────────────────────────────────────────────

/// Cleaning instruction with the chunk embedded, sent as one user message.
pub fn clean_prompt(format: PodcastFormat, chunk: &str) -> String {
    format!(
        r#"You are a meticulous text pre-processor. Below is raw text extracted from a PDF. Clean it so a {format} writer can work from it directly.

The raw text is full of broken line wraps, hyphenation, page furniture, LaTeX fragments, reference markers and similar noise. Remove what a {format} author would never read aloud, and repair what is merely mangled.

DO NOT SUMMARIZE. You are only cleaning and, where needed, re-wording broken passages. The output should be about as long as the input.

You will receive a running portion of a longer document; return only the processed portion.

Do not use Markdown or any other markup. Do not acknowledge these instructions. Start directly with the processed text.

Here is the text:

{chunk}
"#
    )
}

/// User message paired with a configured stage-1 override.
pub fn clean_override_user_message(chunk: &str) -> String {
    format!("Here is the text:\n\n{chunk}")
}

// ── Stage 2 ──────────────────────────────────────────────────────

/// Script-writing instruction for `format`, composed with length, style and
/// the caller's preference text.
pub fn script_system_prompt(
    format: PodcastFormat,
    length: Length,
    style: Style,
    preference: Option<&str>,
) -> String {
    let speakers = format.speaker_count();
    let cast = cast_description(speakers);
    let preference = preference.unwrap_or("").trim();
    let interplay = if speakers == 1 {
        "Speaker 1 narrates alone: use rhetorical questions, analogies and small tangents that always return to the main topic. No robotic monologue."
    } else {
        "The speakers interrupt each other naturally, with \"umm\", \"hmm\" and \"right\" where a real conversation would have them, and follow up questions with real-world examples."
    };
    format!(
        r#"You are an award-winning {format} writer and ghostwriter. Write the complete spoken script, word by word, based on the document provided by the user.

{cast}

{interplay}

The author of the document is NOT in this {format}. The speakers have no names and are not the researchers or authors.

MY PREFERENCES:
"{preference}"
Treat these preferences as hard requirements.

Open with a catchy overview that hooks the listener, then cover the material with every fine nuance in as much detail as the length allows.

ALWAYS START YOUR RESPONSE DIRECTLY WITH "Speaker 1:".
Do not give episode or chapter titles. Do not add section headers. Write ONLY dialogue, each line labeled "Speaker N:".

FORMAT GUIDANCE:
{format_guide}

LENGTH GUIDANCE:
{length_guide}

STYLE GUIDANCE:
{style_guide}
"#,
        format_guide = format_guide(format),
        length_guide = length_guide(length, format),
        style_guide = style_guide(style),
    )
}

/// Prefix of the first chunk's user message on the chunked path.
pub const SCRIPT_FIRST_CHUNK: &str =
    "This is the first part of a longer document. Write the beginning of the transcript from it:";

/// Instruction for every chunk after the first on the chunked path.
pub const SCRIPT_CONTINUATION: &str = "Continue the transcript from this next part of the document. Do not repeat introductions or greetings, do not re-introduce the speakers, and do not conclude unless told this is the final part. Keep the same speaker labels.";

/// Extra line for the final chunk on the chunked path.
pub const SCRIPT_FINAL_PART: &str =
    "This is the final part of the document; you may bring the transcript to a natural close.";

fn cast_description(speakers: usize) -> String {
    let roles = [
        "Speaker 1 (the host): leads and teaches, with vivid anecdotes and analogies.",
        "Speaker 2 (the curious one): new to the topic, asks follow-up and confirmation questions, gets excited or confused, and occasionally goes on wild tangents.",
        "Speaker 3 (the enthusiast): reacts with passion, pushes for deeper insight and amplifies key moments without overpowering the others.",
        "Speaker 4 (the skeptic): challenges claims respectfully, asks for evidence and changes stance only when convinced.",
        "Speaker 5 (the synthesizer): connects threads, summarises disagreements and brings in adjacent fields.",
    ];
    let mut out = format!("The script has exactly {speakers} speaker(s):\n");
    for role in roles.iter().take(speakers.clamp(1, roles.len())) {
        out.push_str("- ");
        out.push_str(role);
        out.push('\n');
    }
    if speakers > 2 {
        out.push_str("The order of the supporting speakers varies; anyone may jump in after Speaker 1.\n");
    }
    out
}

/// One-line guidance for each format.
pub fn format_guide(format: PodcastFormat) -> &'static str {
    use PodcastFormat::*;
    match format {
        Podcast => "A lively back-and-forth conversation with storytelling and engaging discussion.",
        Interview => "Structured questions and answers that draw out expert insight.",
        PanelDiscussion => "Different perspectives on a central topic, with a mix of agreement, challenge and unique viewpoints.",
        Debate => "Opposing viewpoints with structured arguments and counterpoints.",
        Summary => "A concise overview that highlights the key points.",
        Narration => "A continuous monologue guiding the listener through the material.",
        Storytelling => "A vivid, narrative-driven story with emotional appeal.",
        Explainer => "Complex concepts broken down into simple, clear explanations.",
        Lecture => "Structured educational content in a formal register.",
        Tutorial => "Step-by-step instructions guiding the listener through a process.",
        QAndA => "Common questions answered with clear, informative responses.",
        NewsReport => "Factual information presented clearly and without bias.",
        ExecutiveBrief => "Critical information summarised for decision-makers.",
        Meeting => "Key points and decisions documented as they come up in discussion.",
        Analysis => "In-depth insight and evaluation of the topic.",
        ThreePeoplePodcast => "A three-way conversation where each voice adds something distinct.",
        ThreePeoplePanelDiscussion => "One speaker moderates while the other two engage from distinct perspectives, with organic interruptions.",
        ThreePeopleDebate => "Two main opposing speakers and a wildcard who shifts between perspectives.",
        FourPeoplePodcast => "A four-way conversation that stays easy to follow.",
        FourPeoplePanelDiscussion => "A balanced conversation where each speaker holds a unique stance and reacts to the others.",
        FourPeopleDebate => "Each speaker defends a clear stance, with rebuttals and cross-examination.",
        FivePeoplePodcast => "A fast-paced five-way conversation without speakers talking over each other.",
        FivePeoplePanelDiscussion => "Diverse viewpoints in a dynamic but structured conversation.",
        FivePeopleDebate => "A multi-angle debate with varied, sometimes overlapping viewpoints and focused rebuttals.",
    }
}

/// Target-duration guidance for each length.
pub fn length_guide(length: Length, format: PodcastFormat) -> String {
    match length {
        Length::Short => format!(
            "Keep the {format} very concise, covering only the main concepts. Aim for about 5-10 minutes of content."
        ),
        Length::Medium => format!(
            "Cover the main points with some examples. Aim for about 20-30 minutes of {format} content."
        ),
        Length::Long => format!(
            "Develop a comprehensive {format} with detailed examples and discussion. Aim for about 45-60 minutes of content."
        ),
        Length::VeryLong => format!(
            "Explore every aspect in depth with extensive examples. Aim for 100+ minutes of {format} content; make it as long as the material allows."
        ),
    }
}

/// Tone guidance for each style.
pub fn style_guide(style: Style) -> &'static str {
    match style {
        Style::Normal => "Balanced tone, neutral language, straightforward explanations.",
        Style::Friendly => "Casual and approachable, with everyday language and relatable examples.",
        Style::Professional => "Polished and business-like while staying engaging and clear.",
        Style::Academic => "Precise terminology and structured explanations for an academic audience.",
        Style::Casual => "Very conversational and informal, with jokes and banter.",
        Style::Technical => "Technical accuracy first, with detailed explanations of the concepts.",
        Style::GenZ => "Laid-back, playful and a little chaotic, full of current internet slang (bet, no cap, lowkey, it's giving, W/L) used naturally, yet still clear and informative. Open with something like \"Ayo\" or \"Hold up fam\" rather than a formal welcome.",
        Style::Funny => "Playful humour and witty remarks that keep it highly entertaining.",
    }
}

// ── Stage 3 ──────────────────────────────────────────────────────

/// Reformat-and-translate instruction.
pub fn reformat_system_prompt(format: PodcastFormat, language: &str) -> String {
    format!(
        r#"You are a professional script formatter and translator working on a {format}.

Rewrite the transcript the user sends into a list of tuples without changing its content. Each tuple holds:
- the speaker label exactly as it appears in the input, as "Speaker N";
- that speaker's text, translated into {language} if it is not already in {language}, otherwise unchanged.

Keep exactly the speakers present in the input. Never add, remove, merge or rename speakers. Preserve wording, slang and tone; only the structure and language may change. Only one speaker talks per tuple.

Answer with the list and nothing else, exactly like this:

[
    ("Speaker 1", "text"),
    ("Speaker 2", "text"),
]

No titles, no headers, no commentary, no code fences."#
    )
}

/// Continuity message sent with every chunk after the first.
pub fn reformat_context_message(previous: &[Turn], is_last: bool) -> String {
    let ending = if is_last {
        "This is the final part of the transcript; a natural conclusion is allowed."
    } else {
        "This is a continuation, not the ending. Do not add goodbyes, thanks for listening, or any wrap-up language."
    };
    format!(
        "The transcript so far ends with these turns (already converted, do not repeat them):\n{}\n\nConvert the next part, continuing from there. {ending}",
        serialize_turns(previous)
    )
}

/// Instruction for the one repair attempt after a parse failure.
pub const REPAIR_PROMPT: &str = r#"The text the user sends was meant to be a list of ("Speaker N", "text") tuples but is not valid. Convert it into exactly that syntax: one opening '[', one tuple per turn, each tuple two double-quoted strings, one closing ']'. Keep every turn and its wording. Answer with the list only."#;
