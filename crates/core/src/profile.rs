//! Caller-supplied profile data used to personalise prompts.

use serde::{Deserialize, Serialize};

/// Name shown when the profile carries none.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Profile fields the engine may fold into a prompt. All optional: the
/// profile store is an external collaborator and may be incomplete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub birth_time: Option<String>,
    pub gender: Option<String>,
    pub mbti: Option<String>,
    pub blood_type: Option<String>,
    pub zodiac_sign: Option<String>,
    pub chinese_zodiac: Option<String>,
    pub job: Option<String>,
    pub location: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_when_blank() {
        let mut p = UserProfile::default();
        assert_eq!(p.display_name(), DEFAULT_DISPLAY_NAME);
        p.name = Some("   ".into());
        assert_eq!(p.display_name(), DEFAULT_DISPLAY_NAME);
        p.name = Some("Minji".into());
        assert_eq!(p.display_name(), "Minji");
    }
}
