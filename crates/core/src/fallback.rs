//! Deterministic placeholder content for when the completion service is
//! unavailable.
//!
//! Everything here is a pure function of `(user_id, date, category)`: the same
//! inputs always yield the same reading, so a user who hits the fallback twice
//! on one day sees the same text both times.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use crate::category::{CategoryGroup, FortuneCategory};
use crate::error::CoreError;
use crate::hashing::sha256_hex;

/// Value of `ai_source` on placeholder payloads.
pub const FALLBACK_SOURCE: &str = "fallback";

// ---------------------------------------------------------------------------
// Seeded generator
// ---------------------------------------------------------------------------

/// Reproducible PRNG seeded from a user, a local date and a category.
#[derive(Debug, Clone)]
pub struct SeededRng {
    rng: StdRng,
}

impl SeededRng {
    pub fn new(user_id: &str, date: &str, category: &str) -> Self {
        Self::from_seed_str(&format!("{user_id}:{date}:{category}"))
    }

    /// Seed from an arbitrary string: SHA-256, first 8 bytes as a `u64`.
    pub fn from_seed_str(seed: &str) -> Self {
        let digest = sha256_hex(seed.as_bytes());
        let seed = u64::from_str_radix(&digest[..16], 16).unwrap_or_default();
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform float in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform integer in `[min, max]`. Bounds may be given in either order.
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(lo..=hi)
    }

    /// Score in `[min, max]`, clamped to the 0-100 scale.
    pub fn random_score(&mut self, min: i64, max: i64) -> i64 {
        self.random_int(min, max).clamp(0, 100)
    }

    pub fn random_element<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// `n` distinct picks (by position) from `items`.
    pub fn random_elements<T: Clone>(&mut self, items: &[T], n: usize) -> Result<Vec<T>, CoreError> {
        if n > items.len() {
            return Err(CoreError::Validation(format!(
                "cannot pick {n} elements from a list of {}",
                items.len()
            )));
        }
        let mut picked = self.shuffle(items);
        picked.truncate(n);
        Ok(picked)
    }

    /// A shuffled copy of `items`; the input is left untouched.
    pub fn shuffle<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut out = items.to_vec();
        out.shuffle(&mut self.rng);
        out
    }

    /// `true` with probability `p` (clamped to `[0, 1]`).
    pub fn random_boolean(&mut self, p: f64) -> bool {
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        self.rng.random_bool(p)
    }
}

// ---------------------------------------------------------------------------
// Placeholder content
// ---------------------------------------------------------------------------

const SUMMARIES: &[&str] = &[
    "A steady day: small, careful steps will carry you further than bold leaps.",
    "Good energy surrounds you. Share it and it comes back doubled.",
    "Patience pays off today. What you have been waiting for is closer than it looks.",
    "An ordinary day with a quiet opportunity hidden in it. Keep your eyes open.",
    "Your instincts are sharp. Trust the first answer that comes to mind.",
    "A day for tidying up loose ends before starting anything new.",
];

const ADVICE: &[&str] = &[
    "Reach out to someone you have not talked to in a while.",
    "Write down one thing you want to finish this week and start it today.",
    "Take a short walk when your focus drops.",
    "Say yes to a small invitation; it may lead somewhere unexpected.",
    "Review your spending before making any large decision.",
    "Get to bed a little earlier than usual tonight.",
];

const COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "blue", "navy", "purple", "white", "black", "gold",
];

const ITEMS: &[&str] = &[
    "silver ring",
    "notebook",
    "fountain pen",
    "green tea",
    "wristwatch",
    "scarf",
    "hand cream",
    "coin purse",
    "keychain",
    "sunglasses",
];

/// Placeholder payload for `category`. Contains no timestamps so the result
/// depends only on its arguments.
pub fn fallback_content(
    category: &str,
    group: CategoryGroup,
    display_name: &str,
    date: &str,
    user_id: &str,
) -> Value {
    let mut rng = SeededRng::new(user_id, date, category);

    let overall_score = rng.random_score(60, 90);
    let summary = rng.random_element(SUMMARIES).copied().unwrap_or_default();
    let advice = rng.random_element(ADVICE).copied().unwrap_or_default();
    let lucky_color = rng.random_element(COLORS).copied().unwrap_or_default();
    let lucky_number = rng.random_int(1, 45);
    let lucky_items = rng.random_elements(ITEMS, 3).unwrap_or_default();

    let title = FortuneCategory::from_name(category)
        .map(|c| c.as_str().replace('-', " "))
        .unwrap_or_else(|_| category.to_string());

    let mut content = json!({
        "title": format!("{display_name}'s {title} reading"),
        "overall_score": overall_score,
        "summary": summary,
        "advice": advice,
        "lucky_color": lucky_color,
        "lucky_number": lucky_number,
        "lucky_items": lucky_items,
        "ai_source": FALLBACK_SOURCE,
    });

    if group == CategoryGroup::DailyComprehensive {
        if let Some(obj) = content.as_object_mut() {
            obj.insert("love_score".into(), rng.random_score(50, 95).into());
            obj.insert("money_score".into(), rng.random_score(50, 95).into());
            obj.insert("health_score".into(), rng.random_score(50, 95).into());
            obj.insert("career_score".into(), rng.random_score(50, 95).into());
        }
    }

    content
}

/// Whether a payload was produced by [`fallback_content`].
pub fn is_fallback(payload: &Value) -> bool {
    payload.get("ai_source").and_then(Value::as_str) == Some(FALLBACK_SOURCE)
}
