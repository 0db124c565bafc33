//! JSON scenario files that script a headless session.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use garrison_core::{
    CellCoord, CellRectSize, Damage, EntityDescriptor, EntityKind, Health, Speed,
};
use serde::{Deserialize, Serialize};

/// Board dimensions, entity catalog and scripted player actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Number of cell columns on the board.
    pub(crate) columns: u32,
    /// Number of cell rows on the board.
    pub(crate) rows: u32,
    /// Descriptors the actions may refer to by name.
    #[serde(default)]
    pub(crate) catalog: Vec<EntityDescriptor>,
    /// Player actions replayed in order.
    #[serde(default)]
    pub(crate) actions: Vec<Action>,
}

/// Single scripted player action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Action {
    /// Places a catalog entry through placement mode.
    Place { name: String, origin: CellCoord },
    /// Selects the top occupant of the cell.
    Select { cell: CellCoord },
    /// Issues a secondary action to the selected unit.
    Order { cell: CellCoord },
    /// Asks the building covering `cell` to emit a product.
    Produce { cell: CellCoord, product: String },
    /// Advances the simulation by whole ticks.
    Wait { ticks: u32 },
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Parses and validates a scenario from JSON text.
    pub(crate) fn from_json(text: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(text).context("malformed scenario JSON")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Catalog entry with the provided name.
    pub(crate) fn descriptor(&self, name: &str) -> Option<&EntityDescriptor> {
        self.catalog.iter().find(|descriptor| descriptor.name == name)
    }

    /// Built-in skirmish: a barracks trains a soldier that raids a power plant.
    pub(crate) fn skirmish() -> Self {
        let soldier = EntityDescriptor {
            name: "Soldier".to_owned(),
            kind: EntityKind::Soldier,
            size: CellRectSize::single(),
            health: Health::new(10),
            damage: Damage::new(2),
            speed: Speed::new(1),
            products: Vec::new(),
        };
        let barracks = EntityDescriptor {
            name: "Barracks".to_owned(),
            kind: EntityKind::Building,
            size: CellRectSize::new(3, 3),
            health: Health::new(20),
            damage: Damage::new(0),
            speed: Speed::new(1),
            products: vec![soldier.name.clone()],
        };
        let power_plant = EntityDescriptor {
            name: "PowerPlant".to_owned(),
            kind: EntityKind::Building,
            size: CellRectSize::new(2, 3),
            health: Health::new(4),
            damage: Damage::new(0),
            speed: Speed::new(1),
            products: Vec::new(),
        };

        Self {
            columns: 12,
            rows: 8,
            catalog: vec![soldier, barracks, power_plant],
            actions: vec![
                Action::Place {
                    name: "Barracks".to_owned(),
                    origin: CellCoord::new(1, 1),
                },
                Action::Place {
                    name: "PowerPlant".to_owned(),
                    origin: CellCoord::new(8, 2),
                },
                Action::Produce {
                    cell: CellCoord::new(1, 1),
                    product: "Soldier".to_owned(),
                },
                Action::Select {
                    cell: CellCoord::new(1, 1),
                },
                Action::Order {
                    cell: CellCoord::new(9, 3),
                },
                Action::Wait { ticks: 20 },
                Action::Order {
                    cell: CellCoord::new(9, 3),
                },
                Action::Wait { ticks: 1 },
            ],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            bail!("board must have at least one cell, got {}x{}", self.columns, self.rows);
        }
        for action in &self.actions {
            match action {
                Action::Place { name, .. } | Action::Produce { product: name, .. } => {
                    if self.descriptor(name).is_none() {
                        bail!("action refers to unknown catalog entry '{name}'");
                    }
                }
                Action::Select { .. } | Action::Order { .. } | Action::Wait { .. } => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_json() {
        let text = r#"{
            "columns": 6,
            "rows": 4,
            "catalog": [
                {
                    "name": "Hut",
                    "kind": "Building",
                    "size": { "width": 2, "height": 1 },
                    "health": 3
                }
            ],
            "actions": [
                { "action": "place", "name": "Hut", "origin": { "column": 1, "row": 2 } },
                { "action": "wait", "ticks": 3 }
            ]
        }"#;

        let scenario = Scenario::from_json(text).expect("scenario parses");
        let hut = scenario.descriptor("Hut").expect("catalog entry");
        assert_eq!(hut.damage, Damage::new(0));
        assert_eq!(hut.speed, Speed::new(1));
        assert_eq!(
            scenario.actions,
            vec![
                Action::Place {
                    name: "Hut".to_owned(),
                    origin: CellCoord::new(1, 2),
                },
                Action::Wait { ticks: 3 },
            ]
        );
    }

    #[test]
    fn rejects_unknown_catalog_entries() {
        let text = r#"{
            "columns": 4,
            "rows": 4,
            "actions": [
                { "action": "place", "name": "Castle", "origin": { "column": 0, "row": 0 } }
            ]
        }"#;

        let error = Scenario::from_json(text).expect_err("unknown entry");
        assert!(format!("{error:#}").contains("Castle"));
    }

    #[test]
    fn rejects_empty_boards() {
        let error = Scenario::from_json(r#"{ "columns": 0, "rows": 3 }"#).expect_err("empty");
        assert!(format!("{error:#}").contains("0x3"));
    }

    #[test]
    fn skirmish_is_valid() {
        let skirmish = Scenario::skirmish();
        let text = serde_json::to_string(&skirmish).expect("serialise");
        assert_eq!(Scenario::from_json(&text).expect("parse"), skirmish);
    }
}
