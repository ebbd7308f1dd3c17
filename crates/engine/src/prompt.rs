//! Prompt construction for each category.

use fortune_completion::{ChatMessage, CompletionRequest};
use fortune_core::category::CategoryGroup;
use fortune_core::profile::UserProfile;

const SYSTEM_BASE: &str = "You are a fortune teller with forty years of experience in saju, \
tarot, physiognomy and palmistry. You give modern, practical advice.\n\
Rules:\n\
1. Respond with a single JSON object only.\n\
2. Write in natural, friendly Korean.\n\
3. Give concrete, actionable advice.\n\
4. Stay positive but realistic.\n\
5. Respect privacy and answer ethically.";

const SYSTEM_DAILY: &str = "When reading a day: consider how luck flows through the day, \
call out anything to watch for, and name the luckiest time and how to use it.";

const SYSTEM_COMPATIBILITY: &str = "When reading compatibility: analyse how the personalities fit, \
give concrete advice for growing the relationship, and explain how to avoid conflict.";

const SYSTEM_SPECIALIZED: &str = "For specialised readings: use the field's vocabulary where \
it helps, give practical information, and balance short- and long-term outlook.";

const DAILY_SHAPE: &str = r#"{
  "overall_score": 1-100,
  "summary": "two or three sentences",
  "time_fortune": { "morning": "...", "afternoon": "...", "evening": "..." },
  "love_score": 1-100,
  "money_score": 1-100,
  "health_score": 1-100,
  "career_score": 1-100,
  "lucky_color": "...",
  "lucky_number": 1-45,
  "lucky_items": ["...", "...", "..."],
  "advice": "...",
  "warning": "..."
}"#;

const LOVE_SHAPE: &str = r#"{
  "overall_score": 1-100,
  "summary": "...",
  "current_relationship": "...",
  "ideal_partner": "...",
  "meeting_chance": 1-100,
  "lucky_place": "...",
  "lucky_color": "...",
  "advice": "..."
}"#;

const CAREER_SHAPE: &str = r#"{
  "overall_score": 1-100,
  "summary": "...",
  "strengths": ["...", "..."],
  "opportunities": "...",
  "cautions": "...",
  "best_fields": ["...", "..."],
  "lucky_color": "...",
  "advice": "..."
}"#;

const GENERIC_SHAPE: &str = r#"{
  "overall_score": 1-100,
  "summary": "...",
  "details": "...",
  "lucky_color": "...",
  "lucky_number": 1-45,
  "lucky_items": ["...", "...", "..."],
  "advice": "..."
}"#;

/// Inputs shared by every prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub category: &'a str,
    pub group: CategoryGroup,
    pub profile: &'a UserProfile,
    pub interactive_input: Option<&'a serde_json::Value>,
    /// Local date the reading is for, `YYYY-MM-DD`.
    pub date: &'a str,
}

/// Build the completion request for a single category.
pub fn build_prompt(ctx: &PromptContext<'_>) -> CompletionRequest {
    let system = format!("{SYSTEM_BASE}\n\n{}", system_focus(ctx.category, ctx.group));
    let user = format!(
        "Give {name} a '{category}' reading for {date}.\n\n{profile}{input}\nRespond using this JSON shape:\n{shape}",
        name = ctx.profile.display_name(),
        category = ctx.category,
        date = ctx.date,
        profile = profile_block(ctx.profile),
        input = input_block(ctx.interactive_input),
        shape = response_shape(ctx.category),
    );

    CompletionRequest {
        messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        max_tokens: None,
    }
}

/// Build one request covering several categories; the reply is an object
/// keyed by category name.
pub fn build_batch_prompt(categories: &[String], ctx: &PromptContext<'_>) -> CompletionRequest {
    let list = categories
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let user = format!(
        "Give {name} the following readings for {date} in one answer: {list}.\n\n{profile}\n\
         Return one JSON object whose keys are exactly those category names. Each value must \
         follow this shape, kept short:\n{shape}",
        name = ctx.profile.display_name(),
        date = ctx.date,
        profile = profile_block(ctx.profile),
        shape = GENERIC_SHAPE,
    );

    CompletionRequest {
        messages: vec![
            ChatMessage::system(format!("{SYSTEM_BASE}\n\n{SYSTEM_SPECIALIZED}")),
            ChatMessage::user(user),
        ],
        max_tokens: None,
    }
}

fn system_focus(category: &str, group: CategoryGroup) -> &'static str {
    match (category, group) {
        ("daily" | "today" | "tomorrow" | "hourly", _) | (_, CategoryGroup::DailyComprehensive) => {
            SYSTEM_DAILY
        }
        (_, CategoryGroup::LovePackage) => SYSTEM_COMPATIBILITY,
        _ => SYSTEM_SPECIALIZED,
    }
}

fn response_shape(category: &str) -> &'static str {
    match category {
        "daily" | "today" => DAILY_SHAPE,
        "love" => LOVE_SHAPE,
        "career" => CAREER_SHAPE,
        _ => GENERIC_SHAPE,
    }
}

fn profile_block(profile: &UserProfile) -> String {
    let fields = [
        ("Birth date", &profile.birth_date),
        ("Birth time", &profile.birth_time),
        ("Gender", &profile.gender),
        ("MBTI", &profile.mbti),
        ("Blood type", &profile.blood_type),
        ("Zodiac sign", &profile.zodiac_sign),
        ("Chinese zodiac", &profile.chinese_zodiac),
        ("Job", &profile.job),
        ("Location", &profile.location),
    ];
    let mut out = String::from("Profile:\n");
    for (label, value) in fields {
        let value = value.as_deref().map(str::trim).filter(|v| !v.is_empty());
        out.push_str(&format!("- {label}: {}\n", value.unwrap_or("not provided")));
    }
    out
}

fn input_block(input: Option<&serde_json::Value>) -> String {
    match input {
        Some(value) if !value.is_null() => format!("\nUser input:\n{value}\n"),
        _ => String::new(),
    }
}
