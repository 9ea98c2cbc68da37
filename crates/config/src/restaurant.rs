//! Restaurant domain data
//!
//! The menu catalog and seat schedule are loaded once at startup and never
//! mutated; the ledger seeds its inventory from the schedule and owns all
//! mutation from then on.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// One menu category with its dishes, in presentation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuCategory {
    pub name: String,
    pub dishes: Vec<String>,
}

/// Immutable dish catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuCatalog {
    pub categories: Vec<MenuCategory>,
}

impl MenuCatalog {
    /// Iterate all dish names in catalog order
    pub fn dishes(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.dishes.iter().map(|d| d.as_str()))
    }

    /// Look up a category by name
    pub fn category(&self, name: &str) -> Option<&MenuCategory> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// A bookable (date, time) slot with its initial seat count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub date: String,
    pub time: String,
    pub seats: u32,
}

/// Restaurant configuration: menu plus seat schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantConfig {
    pub name: String,
    pub menu: MenuCatalog,
    pub schedule: Vec<ScheduleSlot>,
}

impl RestaurantConfig {
    /// Load from a YAML file, falling back to the built-in defaults when
    /// the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No restaurant file, using built-in defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Default for RestaurantConfig {
    fn default() -> Self {
        let category = |name: &str, dishes: &[&str]| MenuCategory {
            name: name.to_string(),
            dishes: dishes.iter().map(|d| d.to_string()).collect(),
        };
        let slot = |date: &str, time: &str, seats: u32| ScheduleSlot {
            date: date.to_string(),
            time: time.to_string(),
            seats,
        };

        Self {
            name: "Fine Dining Restaurant".to_string(),
            menu: MenuCatalog {
                categories: vec![
                    category(
                        "appetizers",
                        &["Bruschetta", "Caesar Salad", "Mozzarella Sticks"],
                    ),
                    category(
                        "main_courses",
                        &["Grilled Salmon", "Margherita Pizza", "Steak Frites"],
                    ),
                    category("desserts", &["Tiramisu", "Cheesecake", "Chocolate Mousse"]),
                    category("drinks", &["Red Wine", "White Wine", "Sparkling Water"]),
                ],
            },
            schedule: vec![
                slot("2025-02-01", "19:00", 5),
                slot("2025-02-01", "20:00", 4),
                slot("2025-02-02", "19:00", 0),
                slot("2025-02-02", "20:00", 5),
            ],
        }
    }
}
