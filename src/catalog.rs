// Static player catalog: the draftable player list grouped into named sets,
// plus the franchise slate every room starts from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The ten franchise short codes. Every room gets one team per code.
pub const FRANCHISES: [&str; 10] = [
    "CSK", "MI", "RCB", "KKR", "SRH", "DC", "PBKS", "RR", "GT", "LSG",
];

/// Starting purse per franchise: 120 Cr.
pub const STARTING_PURSE: i64 = 1_200_000_000;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read catalog file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One draftable player as loaded from the catalog. Immutable once loaded;
/// a copy picks up sale metadata when a team acquires it (see
/// [`crate::room::state::OwnedPlayer`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub role: String,
    pub base_price: u64,
    #[serde(default)]
    pub is_overseas: bool,
    pub set: String,
    /// Franchise that held this player before the auction. Drives RTM
    /// eligibility; `None` for uncontracted players.
    #[serde(default)]
    pub previous_team: Option<String>,
}

/// A named grouping of sets. Sets are auctioned in catalog order, so the
/// category list defines the overall draft sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub sets: Vec<String>,
}

/// The full static catalog (players.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub players: Vec<Player>,
}

impl Catalog {
    /// Load the catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Catalog, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| CatalogError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| CatalogError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// All set names in auction order (categories flattened).
    pub fn set_order(&self) -> Vec<&str> {
        self.categories
            .iter()
            .flat_map(|c| c.sets.iter().map(String::as_str))
            .collect()
    }

    /// Players belonging to the given set, in catalog order.
    pub fn players_in_set(&self, set: &str) -> Vec<&Player> {
        self.players.iter().filter(|p| p.set == set).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "categories": [
                { "name": "Marquee", "sets": ["M1", "M2"] },
                { "name": "Batters", "sets": ["B1"] }
            ],
            "players": [
                { "id": 1, "name": "A", "role": "Batter", "basePrice": 20000000, "isOverseas": false, "set": "M1", "previousTeam": "CSK" },
                { "id": 2, "name": "B", "role": "Bowler", "basePrice": 20000000, "isOverseas": true, "set": "B1" },
                { "id": 3, "name": "C", "role": "All-Rounder", "basePrice": 15000000, "set": "M2", "previousTeam": null }
            ]
        }"#
    }

    #[test]
    fn parses_camel_case_fields() {
        let catalog: Catalog = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(catalog.players.len(), 3);
        assert_eq!(catalog.players[0].base_price, 20_000_000);
        assert_eq!(catalog.players[0].previous_team.as_deref(), Some("CSK"));
        assert!(catalog.players[1].is_overseas);
        assert!(catalog.players[1].previous_team.is_none());
    }

    #[test]
    fn set_order_flattens_categories() {
        let catalog: Catalog = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(catalog.set_order(), vec!["M1", "M2", "B1"]);
    }

    #[test]
    fn players_in_set_filters() {
        let catalog: Catalog = serde_json::from_str(sample_json()).unwrap();
        let m1 = catalog.players_in_set("M1");
        assert_eq!(m1.len(), 1);
        assert_eq!(m1[0].name, "A");
        assert!(catalog.players_in_set("missing").is_empty());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = Catalog::load(Path::new("/nonexistent/players.json")).unwrap_err();
        assert!(matches!(err, CatalogError::FileNotFound { .. }));
    }
}
