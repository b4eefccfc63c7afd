use std::collections::BTreeMap;

/// Meal-type tag for one row of a menu table.
///
/// Declaration order is the order meals are served in, so a [`DailyMenu`]
/// iterates breakfast → lunch variants → dinner → other.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum MealType {
    Breakfast,
    Lunch,
    LunchKorean,
    LunchSpecial,
    LunchSnack,
    LunchPlus,
    Dinner,
    Other, // rows whose label has no known marker
}

impl MealType {
    pub const ALL: [Self; 8] = [
        Self::Breakfast,
        Self::Lunch,
        Self::LunchKorean,
        Self::LunchSpecial,
        Self::LunchSnack,
        Self::LunchPlus,
        Self::Dinner,
        Self::Other,
    ];

    /// Classifies a row label. Checks run in a fixed order and the first hit
    /// wins, so `"중식(11:30) 한식"` is `LunchKorean` and never plain `Lunch`.
    pub fn from_label(label: &str) -> Self {
        if label.contains("조식") {
            Self::Breakfast
        } else if label.contains("중식") {
            if label.contains("한식") {
                Self::LunchKorean
            } else if label.contains("일품") {
                Self::LunchSpecial
            } else if label.contains("분식") {
                Self::LunchSnack
            } else if label.to_lowercase().contains("plus") {
                Self::LunchPlus
            } else {
                Self::Lunch
            }
        } else if label.contains("석식") {
            Self::Dinner
        } else {
            Self::Other
        }
    }

    /// The tag written to disk and served to clients.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Breakfast => "조식",
            Self::Lunch => "중식",
            Self::LunchKorean => "중식-한식",
            Self::LunchSpecial => "중식-일품",
            Self::LunchSnack => "중식-분식",
            Self::LunchPlus => "중식-plus",
            Self::Dinner => "석식",
            Self::Other => "기타",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|meal_type| meal_type.tag() == tag)
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl serde::Serialize for MealType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tag().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for MealType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::from_tag(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown meal type `{tag}`")))
    }
}

/// The text between the first `(` and the first `)` of a row label, trimmed.
/// Labels without both brackets have no time.
pub fn extract_time(label: &str) -> &str {
    match (label.find('('), label.find(')')) {
        (Some(open), Some(close)) if open < close => label[open + 1..close].trim(),
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MealSlot {
    #[serde(rename = "시간")]
    pub time: String,
    #[serde(rename = "메뉴")]
    pub items: Vec<String>,
}

/// Meals served on one date, keyed by meal type. Meal types with nothing on
/// the menu are absent rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DailyMenu(BTreeMap<MealType, MealSlot>);

impl DailyMenu {
    pub fn insert(&mut self, meal_type: MealType, slot: MealSlot) {
        self.0.insert(meal_type, slot);
    }
}

#[cfg(test)]
impl DailyMenu {
    pub fn get(&self, meal_type: MealType) -> Option<&MealSlot> {
        self.0.get(&meal_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
