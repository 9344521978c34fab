use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponCategory {
    AssaultRifles,
    Smgs,
    Shotguns,
    Lmgs,
    Marksman,
    Snipers,
    Pistols,
    Launchers,
    Special,
    Melee,
}

impl WeaponCategory {
    pub const ALL: [WeaponCategory; 10] = [
        WeaponCategory::AssaultRifles,
        WeaponCategory::Smgs,
        WeaponCategory::Shotguns,
        WeaponCategory::Lmgs,
        WeaponCategory::Marksman,
        WeaponCategory::Snipers,
        WeaponCategory::Pistols,
        WeaponCategory::Launchers,
        WeaponCategory::Special,
        WeaponCategory::Melee,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WeaponCategory::AssaultRifles => "assault rifles",
            WeaponCategory::Smgs => "smgs",
            WeaponCategory::Shotguns => "shotguns",
            WeaponCategory::Lmgs => "lmgs",
            WeaponCategory::Marksman => "marksman",
            WeaponCategory::Snipers => "snipers",
            WeaponCategory::Pistols => "pistols",
            WeaponCategory::Launchers => "launchers",
            WeaponCategory::Special => "special",
            WeaponCategory::Melee => "melee",
        }
    }

    /// Numeric code used by the catalog source.
    pub fn code(&self) -> &'static str {
        match self {
            WeaponCategory::AssaultRifles => "1",
            WeaponCategory::Smgs => "2",
            WeaponCategory::Shotguns => "3",
            WeaponCategory::Lmgs => "4",
            WeaponCategory::Marksman => "5",
            WeaponCategory::Snipers => "6",
            WeaponCategory::Pistols => "7",
            WeaponCategory::Launchers => "8",
            WeaponCategory::Special => "9",
            WeaponCategory::Melee => "10",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Accepts either a numeric code or a category name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == raw)
            .or_else(|| Self::from_name(raw))
    }
}

impl fmt::Display for WeaponCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlueprintStatus {
    #[default]
    Released,
    Unreleased,
    Nothing,
    NoTexture,
}

impl BlueprintStatus {
    /// `NOTHING` and `NOTEXTURE` blueprints have no preview art.
    pub fn has_image(&self) -> bool {
        !matches!(self, BlueprintStatus::Nothing | BlueprintStatus::NoTexture)
    }
}

impl fmt::Display for BlueprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlueprintStatus::Released => "RELEASED",
            BlueprintStatus::Unreleased => "UNRELEASED",
            BlueprintStatus::Nothing => "NOTHING",
            BlueprintStatus::NoTexture => "NOTEXTURE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
    pub name: String,
    pub weapon: String,
    pub category: WeaponCategory,
    pub pool: String,
    pub status: BlueprintStatus,
}

impl Blueprint {
    /// Display label, `NAME (WEAPON)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.weapon)
    }

    /// Unique lookup key, `name::weapon::pool`.
    pub fn key(&self) -> String {
        format!("{}::{}::{}", self.name, self.weapon, self.pool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintSummary {
    pub label: String,
    pub key: String,
}

/// Pool/category filter for listings. Unknown category names match nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(WeaponCategory),
    Unknown,
}

impl CategoryFilter {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return CategoryFilter::All;
        }
        WeaponCategory::from_name(raw)
            .map(CategoryFilter::Only)
            .unwrap_or(CategoryFilter::Unknown)
    }

    fn matches(&self, category: WeaponCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
            CategoryFilter::Unknown => false,
        }
    }
}

// Catalog source records
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "Weapons")]
    weapons: Vec<WeaponRecord>,
}

#[derive(Deserialize)]
struct WeaponRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Category")]
    category: TextOrNumber,
    #[serde(rename = "Blueprints", default)]
    blueprints: Vec<BlueprintRecord>,
}

#[derive(Deserialize)]
struct BlueprintRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Pool")]
    pool: TextOrNumber,
    #[serde(default)]
    status: BlueprintStatus,
}

/// Pool ids and category codes appear both as strings and as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(i64),
}

impl TextOrNumber {
    fn into_string(self) -> String {
        match self {
            TextOrNumber::Text(s) => s.trim().to_string(),
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

/// Read-only blueprint index, kept in catalog declaration order.
pub struct Catalog {
    blueprints: Vec<Blueprint>,
    image_dir: Option<PathBuf>,
}

impl Catalog {
    pub fn load(path: &Path, image_dir: Option<PathBuf>) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut catalog = Self::from_json(&content)?;
        catalog.image_dir = image_dir;
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;

        let mut blueprints = Vec::new();
        for weapon in file.weapons {
            let raw_category = weapon.category.into_string();
            let category = WeaponCategory::parse(&raw_category).ok_or_else(|| {
                CatalogError::UnknownCategory {
                    weapon: weapon.name.clone(),
                    category: raw_category.clone(),
                }
            })?;
            for bp in weapon.blueprints {
                blueprints.push(Blueprint {
                    name: bp.name,
                    weapon: weapon.name.clone(),
                    category,
                    pool: bp.pool.into_string(),
                    status: bp.status,
                });
            }
        }

        Ok(Self {
            blueprints,
            image_dir: None,
        })
    }

    #[cfg(test)]
    pub fn with_image_dir(mut self, image_dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(image_dir.into());
        self
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Resolves a query by exact name, then `name (weapon)`, then
    /// `name::weapon::pool`. Each stage scans in declaration order and the
    /// first hit wins, so duplicate names resolve to the earliest entry.
    pub fn find(&self, query: &str) -> Option<&Blueprint> {
        let query = normalize(query);
        if query.is_empty() {
            return None;
        }

        self.blueprints
            .iter()
            .find(|bp| normalize(&bp.name) == query)
            .or_else(|| {
                self.blueprints
                    .iter()
                    .find(|bp| normalize(&bp.label()) == query)
            })
            .or_else(|| {
                self.blueprints
                    .iter()
                    .find(|bp| normalize(&bp.key()) == query)
            })
    }

    /// Resolves a select value the menu had to cut short. Only a prefix
    /// matching exactly one key is accepted.
    pub fn find_by_key_prefix(&self, prefix: &str) -> Option<&Blueprint> {
        let prefix = normalize(prefix);
        if prefix.is_empty() {
            return None;
        }
        let mut hits = self
            .blueprints
            .iter()
            .filter(|bp| normalize(&bp.key()).starts_with(&prefix));
        let first = hits.next()?;
        let ambiguous = hits.any(|bp| bp.key() != first.key());
        (!ambiguous).then_some(first)
    }

    pub fn list_by_pool(&self, pool_id: &str, category_filter: &str) -> Vec<BlueprintSummary> {
        let pool_id = pool_id.trim();
        let filter = CategoryFilter::parse(category_filter);
        let mut seen = HashSet::new();

        self.blueprints
            .iter()
            .filter(|bp| bp.pool == pool_id && filter.matches(bp.category))
            .filter(|bp| seen.insert((bp.name.as_str(), bp.weapon.as_str(), bp.pool.as_str())))
            .map(|bp| BlueprintSummary {
                label: bp.label(),
                key: bp.key(),
            })
            .collect()
    }

    pub fn category_of_weapon(&self, weapon: &str) -> Option<WeaponCategory> {
        self.blueprints
            .iter()
            .find(|bp| bp.weapon == weapon)
            .map(|bp| bp.category)
    }

    /// Best-effort preview lookup under `<image_dir>/<weapon>/<name>.jpg`.
    pub fn resolve_image(&self, bp: &Blueprint) -> Option<PathBuf> {
        let base = self.image_dir.as_ref()?;
        if !bp.status.has_image() {
            return None;
        }

        for (weapon_dir, file_stem) in image_name_variants(&bp.weapon, &bp.name) {
            let candidate = base.join(&weapon_dir).join(format!("{}.jpg", file_stem));
            if candidate.is_file() {
                return Some(candidate);
            }
            debug!("No preview at {}", candidate.display());
        }
        None
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Raw and underscored names, each followed by its lowercase form, with
/// duplicates removed.
fn image_name_variants(weapon: &str, name: &str) -> Vec<(String, String)> {
    let bases = [
        (weapon.to_string(), name.to_string()),
        (weapon.replace(' ', "_"), name.replace(' ', "_")),
    ];

    let mut variants: Vec<(String, String)> = Vec::new();
    for (w, n) in bases {
        let lower = (w.to_lowercase(), n.to_lowercase());
        for pair in [(w, n), lower] {
            if !variants.contains(&pair) {
                variants.push(pair);
            }
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Weapons": [
            {
                "Name": "LADRA",
                "Category": "assault rifles",
                "Blueprints": [
                    {"Name": "STORM RAGE", "Pool": "12", "status": "RELEASED"},
                    {"Name": "GHOST", "Pool": "3"}
                ]
            },
            {
                "Name": "KOMPAKT 92",
                "Category": "2",
                "Blueprints": [
                    {"Name": "GHOST", "Pool": 12, "status": "UNRELEASED"},
                    {"Name": "VOID", "Pool": "12", "status": "NOTEXTURE"},
                    {"Name": "VOID", "Pool": "12", "status": "NOTEXTURE"}
                ]
            }
        ]
    }"#;

    fn sample() -> Catalog {
        Catalog::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn test_find_is_case_and_whitespace_insensitive() {
        let catalog = sample();
        let a = catalog.find("STORM RAGE").unwrap();
        let b = catalog.find("storm rage").unwrap();
        let c = catalog.find(" Storm Rage ").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.weapon, "LADRA");
        assert_eq!(a.pool, "12");
        assert_eq!(a.status, BlueprintStatus::Released);
        assert_eq!(a.category, WeaponCategory::AssaultRifles);
    }

    #[test]
    fn test_key_prefix_must_be_unambiguous() {
        let catalog = sample();
        let void = catalog.find_by_key_prefix("void::kompakt").unwrap();
        assert_eq!(void.name, "VOID");
        // Both GHOST entries share this prefix
        assert!(catalog.find_by_key_prefix("GHOST::").is_none());
        assert!(catalog.find_by_key_prefix("nothing").is_none());
        assert!(catalog.find_by_key_prefix("  ").is_none());
    }

    #[test]
    fn test_duplicate_name_resolves_to_first_declared() {
        let catalog = sample();
        let ghost = catalog.find("ghost").unwrap();
        assert_eq!(ghost.weapon, "LADRA");
        assert_eq!(ghost.status, BlueprintStatus::Released);
    }

    #[test]
    fn test_composite_name_selects_weapon() {
        let catalog = sample();
        let ghost = catalog.find("GHOST (KOMPAKT 92)").unwrap();
        assert_eq!(ghost.weapon, "KOMPAKT 92");
        assert_eq!(ghost.pool, "12");
        assert_eq!(ghost.status, BlueprintStatus::Unreleased);
    }

    #[test]
    fn test_unique_key_lookup() {
        let catalog = sample();
        let ghost = catalog.find("ghost::kompakt 92::12").unwrap();
        assert_eq!(ghost.weapon, "KOMPAKT 92");
        assert_eq!(catalog.find(&ghost.key()).unwrap(), ghost);
    }

    #[test]
    fn test_missing_blueprint() {
        let catalog = sample();
        assert!(catalog.find("NOPE").is_none());
        assert!(catalog.find("   ").is_none());
    }

    #[test]
    fn test_list_by_pool_filters_and_dedups() {
        let catalog = sample();

        let ar = catalog.list_by_pool("12", "assault rifles");
        assert_eq!(ar.len(), 1);
        assert_eq!(ar[0].label, "STORM RAGE (LADRA)");
        assert_eq!(ar[0].key, "STORM RAGE::LADRA::12");

        assert!(catalog.list_by_pool("12", "shotguns").is_empty());
        assert!(catalog.list_by_pool("12", "not-a-category").is_empty());

        let all = catalog.list_by_pool("12", "all");
        let labels: Vec<&str> = all.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["STORM RAGE (LADRA)", "GHOST (KOMPAKT 92)", "VOID (KOMPAKT 92)"]
        );

        assert_eq!(catalog.list_by_pool("12", "SMGS").len(), 2);
        assert!(catalog.list_by_pool("99", "all").is_empty());
    }

    #[test]
    fn test_ladra_scenario() {
        let catalog = Catalog::from_json(
            r#"{"Weapons": [{"Name": "LADRA", "Category": "assault rifles",
                "Blueprints": [{"Name": "STORM RAGE", "Pool": "12", "status": "RELEASED"}]}]}"#,
        )
        .unwrap();

        let bp = catalog.find("storm rage").unwrap();
        assert_eq!((bp.weapon.as_str(), bp.pool.as_str()), ("LADRA", "12"));
        assert_eq!(bp.status.to_string(), "RELEASED");

        let listed = catalog.list_by_pool("12", "assault rifles");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].label.contains("STORM RAGE"));
        assert!(catalog.list_by_pool("12", "smgs").is_empty());
    }

    #[test]
    fn test_category_codes_and_names() {
        assert_eq!(WeaponCategory::parse("1"), Some(WeaponCategory::AssaultRifles));
        assert_eq!(WeaponCategory::parse("10"), Some(WeaponCategory::Melee));
        assert_eq!(WeaponCategory::parse(" Snipers "), Some(WeaponCategory::Snipers));
        assert_eq!(WeaponCategory::parse("11"), None);

        let catalog = sample();
        assert_eq!(catalog.category_of_weapon("KOMPAKT 92"), Some(WeaponCategory::Smgs));
        assert_eq!(catalog.category_of_weapon("UNKNOWN"), None);
    }

    #[test]
    fn test_malformed_catalog_is_rejected() {
        assert!(matches!(
            Catalog::from_json("{\"Weapons\": 3}"),
            Err(CatalogError::Parse(_))
        ));
        assert!(matches!(
            Catalog::from_json(r#"{"Weapons": [{"Name": "X", "Category": "99", "Blueprints": []}]}"#),
            Err(CatalogError::UnknownCategory { .. })
        ));
        assert!(matches!(
            Catalog::load(Path::new("/no/such/blueprints.json"), None),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_image_variants_are_unique_and_ordered() {
        let variants = image_name_variants("KOMPAKT 92", "Storm Rage");
        assert_eq!(
            variants,
            vec![
                ("KOMPAKT 92".to_string(), "Storm Rage".to_string()),
                ("kompakt 92".to_string(), "storm rage".to_string()),
                ("KOMPAKT_92".to_string(), "Storm_Rage".to_string()),
                ("kompakt_92".to_string(), "storm_rage".to_string()),
            ]
        );

        assert_eq!(image_name_variants("ladra", "x").len(), 1);
    }

    #[test]
    fn test_resolve_image_prefers_first_existing_variant() {
        let dir = tempfile::tempdir().unwrap();
        let weapon_dir = dir.path().join("ladra");
        std::fs::create_dir_all(&weapon_dir).unwrap();
        std::fs::write(weapon_dir.join("storm rage.jpg"), b"img").unwrap();

        let catalog = sample().with_image_dir(dir.path());
        let bp = catalog.find("storm rage").unwrap();
        assert_eq!(
            catalog.resolve_image(bp),
            Some(dir.path().join("ladra").join("storm rage.jpg"))
        );

        let ghost = catalog.find("ghost").unwrap();
        assert_eq!(catalog.resolve_image(ghost), None);
    }

    #[test]
    fn test_resolve_image_skips_textureless_blueprints() {
        let dir = tempfile::tempdir().unwrap();
        let weapon_dir = dir.path().join("KOMPAKT 92");
        std::fs::create_dir_all(&weapon_dir).unwrap();
        std::fs::write(weapon_dir.join("VOID.jpg"), b"img").unwrap();

        let catalog = sample().with_image_dir(dir.path());
        let void = catalog.find("void").unwrap();
        assert_eq!(void.status, BlueprintStatus::NoTexture);
        assert_eq!(catalog.resolve_image(void), None);
    }
}
