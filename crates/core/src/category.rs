//! Category classifier: maps a fortune category to its cache-policy group,
//! token cost, and the related categories that share its group.
//!
//! The catalog below is the single source of truth for group and price
//! membership. Every lookup is a pure function over it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::TokenAmount;

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Cache-policy class of a category. Governs TTL and key shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryGroup {
    LifeProfile,
    DailyComprehensive,
    Interactive,
    LovePackage,
    CareerWealthPackage,
    LuckyItemsPackage,
    LifeCareerPackage,
    ClientBased,
}

impl CategoryGroup {
    /// All groups in declaration order.
    pub const ALL: [CategoryGroup; 8] = [
        CategoryGroup::LifeProfile,
        CategoryGroup::DailyComprehensive,
        CategoryGroup::Interactive,
        CategoryGroup::LovePackage,
        CategoryGroup::CareerWealthPackage,
        CategoryGroup::LuckyItemsPackage,
        CategoryGroup::LifeCareerPackage,
        CategoryGroup::ClientBased,
    ];

    /// Stable name used in cache keys and the `group_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LifeProfile => "life_profile",
            Self::DailyComprehensive => "daily_comprehensive",
            Self::Interactive => "interactive",
            Self::LovePackage => "love_package",
            Self::CareerWealthPackage => "career_wealth_package",
            Self::LuckyItemsPackage => "lucky_items_package",
            Self::LifeCareerPackage => "life_career_package",
            Self::ClientBased => "client_based",
        }
    }

    /// Parse from the stored `group_type` name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown category group '{name}'")))
    }

    /// Whether cached content for this group is bound to a local calendar day.
    pub fn is_date_bound(self) -> bool {
        matches!(self, Self::DailyComprehensive)
    }
}

impl std::fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Every content category the product sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FortuneCategory {
    // Life profile
    Saju,
    Talent,
    TraditionalSaju,
    SajuPsychology,
    NetworkReport,
    Tojeong,
    PastLife,
    Destiny,
    Salpuli,
    FiveBlessings,
    TraditionalCompatibility,
    // Daily comprehensive
    Daily,
    Today,
    Tomorrow,
    Hourly,
    NewYear,
    Timeline,
    // Interactive
    DreamInterpretation,
    Tarot,
    WorryBead,
    Physiognomy,
    // Love package
    Love,
    Marriage,
    Compatibility,
    CoupleMatch,
    Chemistry,
    ExLover,
    BlindDate,
    CelebrityMatch,
    // Career / wealth package
    Career,
    Employment,
    Business,
    Startup,
    Wealth,
    LuckyInvestment,
    LuckyRealestate,
    LuckySidejob,
    // Lucky items package
    LuckyColor,
    LuckyNumber,
    LuckyFood,
    LuckyOutfit,
    LuckyItems,
    Birthstone,
    Talisman,
    // Life / career package
    LuckyHiking,
    LuckyBaseball,
    LuckyTennis,
    LuckyFishing,
    LuckyGolf,
    LuckyCycling,
    LuckySwim,
    LuckyRunning,
    LuckyExam,
    LuckyJob,
    // Client based
    Palmistry,
    Biorhythm,
    Moving,
    MovingDate,
    AvoidPeople,
    Birthdate,
    BirthSeason,
    BloodType,
    Mbti,
    Zodiac,
    ZodiacAnimal,
    Wish,
}

/// One catalog row: category, wire name, group, token cost.
type CatalogEntry = (FortuneCategory, &'static str, CategoryGroup, TokenAmount);

use CategoryGroup as G;
use FortuneCategory as C;

const CATALOG: &[CatalogEntry] = &[
    (C::Saju, "saju", G::LifeProfile, 3),
    (C::Talent, "talent", G::LifeProfile, 1),
    (C::TraditionalSaju, "traditional-saju", G::LifeProfile, 3),
    (C::SajuPsychology, "saju-psychology", G::LifeProfile, 3),
    (C::NetworkReport, "network-report", G::LifeProfile, 5),
    (C::Tojeong, "tojeong", G::LifeProfile, 3),
    (C::PastLife, "past-life", G::LifeProfile, 3),
    (C::Destiny, "destiny", G::LifeProfile, 3),
    (C::Salpuli, "salpuli", G::LifeProfile, 1),
    (C::FiveBlessings, "five-blessings", G::LifeProfile, 5),
    (C::TraditionalCompatibility, "traditional-compatibility", G::LifeProfile, 1),
    (C::Daily, "daily", G::DailyComprehensive, 1),
    (C::Today, "today", G::DailyComprehensive, 1),
    (C::Tomorrow, "tomorrow", G::DailyComprehensive, 1),
    (C::Hourly, "hourly", G::DailyComprehensive, 1),
    (C::NewYear, "new-year", G::DailyComprehensive, 1),
    (C::Timeline, "timeline", G::DailyComprehensive, 1),
    (C::DreamInterpretation, "dream-interpretation", G::Interactive, 2),
    (C::Tarot, "tarot", G::Interactive, 2),
    (C::WorryBead, "worry-bead", G::Interactive, 1),
    (C::Physiognomy, "physiognomy", G::Interactive, 1),
    (C::Love, "love", G::LovePackage, 2),
    (C::Marriage, "marriage", G::LovePackage, 3),
    (C::Compatibility, "compatibility", G::LovePackage, 2),
    (C::CoupleMatch, "couple-match", G::LovePackage, 3),
    (C::Chemistry, "chemistry", G::LovePackage, 3),
    (C::ExLover, "ex-lover", G::LovePackage, 1),
    (C::BlindDate, "blind-date", G::LovePackage, 1),
    (C::CelebrityMatch, "celebrity-match", G::LovePackage, 5),
    (C::Career, "career", G::CareerWealthPackage, 2),
    (C::Employment, "employment", G::CareerWealthPackage, 1),
    (C::Business, "business", G::CareerWealthPackage, 5),
    (C::Startup, "startup", G::CareerWealthPackage, 5),
    (C::Wealth, "wealth", G::CareerWealthPackage, 2),
    (C::LuckyInvestment, "lucky-investment", G::CareerWealthPackage, 5),
    (C::LuckyRealestate, "lucky-realestate", G::CareerWealthPackage, 5),
    (C::LuckySidejob, "lucky-sidejob", G::CareerWealthPackage, 1),
    (C::LuckyColor, "lucky-color", G::LuckyItemsPackage, 1),
    (C::LuckyNumber, "lucky-number", G::LuckyItemsPackage, 1),
    (C::LuckyFood, "lucky-food", G::LuckyItemsPackage, 1),
    (C::LuckyOutfit, "lucky-outfit", G::LuckyItemsPackage, 1),
    (C::LuckyItems, "lucky-items", G::LuckyItemsPackage, 1),
    (C::Birthstone, "birthstone", G::LuckyItemsPackage, 1),
    (C::Talisman, "talisman", G::LuckyItemsPackage, 1),
    (C::LuckyHiking, "lucky-hiking", G::LifeCareerPackage, 1),
    (C::LuckyBaseball, "lucky-baseball", G::LifeCareerPackage, 1),
    (C::LuckyTennis, "lucky-tennis", G::LifeCareerPackage, 1),
    (C::LuckyFishing, "lucky-fishing", G::LifeCareerPackage, 1),
    (C::LuckyGolf, "lucky-golf", G::LifeCareerPackage, 1),
    (C::LuckyCycling, "lucky-cycling", G::LifeCareerPackage, 1),
    (C::LuckySwim, "lucky-swim", G::LifeCareerPackage, 1),
    (C::LuckyRunning, "lucky-running", G::LifeCareerPackage, 1),
    (C::LuckyExam, "lucky-exam", G::LifeCareerPackage, 1),
    (C::LuckyJob, "lucky-job", G::LifeCareerPackage, 1),
    (C::Palmistry, "palmistry", G::ClientBased, 1),
    (C::Biorhythm, "biorhythm", G::ClientBased, 2),
    (C::Moving, "moving", G::ClientBased, 1),
    (C::MovingDate, "moving-date", G::ClientBased, 1),
    (C::AvoidPeople, "avoid-people", G::ClientBased, 1),
    (C::Birthdate, "birthdate", G::ClientBased, 1),
    (C::BirthSeason, "birth-season", G::ClientBased, 1),
    (C::BloodType, "blood-type", G::ClientBased, 1),
    (C::Mbti, "mbti", G::ClientBased, 2),
    (C::Zodiac, "zodiac", G::ClientBased, 1),
    (C::ZodiacAnimal, "zodiac-animal", G::ClientBased, 1),
    (C::Wish, "wish", G::ClientBased, 1),
];

/// Group assigned to names outside the catalog.
pub const DEFAULT_GROUP: CategoryGroup = CategoryGroup::Interactive;

/// Cost charged for categories without an explicit price.
pub const DEFAULT_TOKEN_COST: TokenAmount = 1;

impl FortuneCategory {
    fn entry(self) -> &'static CatalogEntry {
        // Every variant has exactly one catalog row (see tests).
        CATALOG
            .iter()
            .find(|(c, ..)| *c == self)
            .unwrap_or(&CATALOG[0])
    }

    /// Iterate every known category in catalog order.
    pub fn all() -> impl Iterator<Item = FortuneCategory> {
        CATALOG.iter().map(|(c, ..)| *c)
    }

    /// Kebab-case wire name, e.g. `"lucky-color"`.
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        CATALOG
            .iter()
            .find(|(_, n, ..)| *n == name)
            .map(|(c, ..)| *c)
            .ok_or_else(|| CoreError::Validation(format!("Unknown fortune category '{name}'")))
    }

    pub fn group(self) -> CategoryGroup {
        self.entry().2
    }
}

impl std::fmt::Display for FortuneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FortuneCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of classifying a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub group: CategoryGroup,
    pub token_cost: TokenAmount,
    /// Other categories in the same group, usable for batched generation.
    pub related_categories: Vec<FortuneCategory>,
}

/// Token price of a category.
pub fn token_cost_for(category: FortuneCategory) -> TokenAmount {
    category.entry().3
}

/// Classify a known category.
pub fn classify(category: FortuneCategory) -> Classification {
    let group = category.group();
    let related_categories = CATALOG
        .iter()
        .filter(|(c, _, g, _)| *g == group && *c != category)
        .map(|(c, ..)| *c)
        .collect();

    Classification {
        group,
        token_cost: token_cost_for(category),
        related_categories,
    }
}

/// Classify an arbitrary name. Unknown names fall back to
/// [`DEFAULT_GROUP`] and [`DEFAULT_TOKEN_COST`] with no related categories.
pub fn classify_name(name: &str) -> Classification {
    match FortuneCategory::from_name(name) {
        Ok(category) => classify(category),
        Err(_) => Classification {
            group: DEFAULT_GROUP,
            token_cost: DEFAULT_TOKEN_COST,
            related_categories: Vec::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn catalog_covers_every_category_once() {
        let names: HashSet<&str> = CATALOG.iter().map(|(_, n, ..)| *n).collect();
        assert_eq!(names.len(), CATALOG.len(), "duplicate wire name");

        let variants: HashSet<FortuneCategory> = FortuneCategory::all().collect();
        assert_eq!(variants.len(), CATALOG.len(), "duplicate variant");
        assert_eq!(CATALOG.len(), 66);
    }

    #[test]
    fn names_round_trip() {
        for category in FortuneCategory::all() {
            assert_eq!(FortuneCategory::from_name(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn unknown_name_is_validation_error() {
        assert_matches!(
            FortuneCategory::from_name("horoscope-deluxe"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn unknown_name_classifies_to_safe_default() {
        let c = classify_name("not-a-category");
        assert_eq!(c.group, CategoryGroup::Interactive);
        assert_eq!(c.token_cost, 1);
        assert!(c.related_categories.is_empty());
    }

    #[test]
    fn known_groups_and_costs() {
        assert_eq!(classify(FortuneCategory::Daily).group, CategoryGroup::DailyComprehensive);
        assert_eq!(classify(FortuneCategory::Saju).token_cost, 3);
        assert_eq!(classify(FortuneCategory::Tarot).group, CategoryGroup::Interactive);
        assert_eq!(token_cost_for(FortuneCategory::Startup), 5);
        assert_eq!(token_cost_for(FortuneCategory::LuckyGolf), 1);
    }

    #[test]
    fn related_categories_share_group_and_exclude_self() {
        let c = classify(FortuneCategory::Love);
        assert!(!c.related_categories.contains(&FortuneCategory::Love));
        assert_eq!(c.related_categories.len(), 7);
        assert!(c
            .related_categories
            .iter()
            .all(|r| r.group() == CategoryGroup::LovePackage));
    }

    #[test]
    fn group_names_round_trip() {
        for group in CategoryGroup::ALL {
            assert_eq!(CategoryGroup::from_name(group.as_str()).unwrap(), group);
        }
    }

    #[test]
    fn only_daily_group_is_date_bound() {
        let bound: Vec<_> = CategoryGroup::ALL
            .into_iter()
            .filter(|g| g.is_date_bound())
            .collect();
        assert_eq!(bound, vec![CategoryGroup::DailyComprehensive]);
    }
}
