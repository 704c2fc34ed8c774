use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Calibration record for one module type. All lengths in millimetres.
///
/// The Micro-ID offset is the footprint's bottom-left corner measured from
/// the module's bottom-left corner with Y pointing up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub width_mm: f64,
    pub height_mm: f64,
    pub microid_x_mm: f64,
    pub microid_y_mm: f64,
    pub microid_size_mm: f64,
    #[serde(default)]
    pub padding_mm: f64,
}

impl ModuleSpec {
    /// Micro-ID centre relative to the module origin.
    pub fn microid_center_mm(&self) -> (f64, f64) {
        let half = self.microid_size_mm / 2.0;
        (self.microid_x_mm + half, self.microid_y_mm + half)
    }

    pub fn longest_side_mm(&self) -> f64 {
        self.width_mm.max(self.height_mm)
    }

    /// Side of the 5×5 cell area inside the footprint.
    pub fn grid_size_mm(&self) -> f64 {
        self.microid_size_mm - 2.0 * self.padding_mm
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("width_mm", self.width_mm),
            ("height_mm", self.height_mm),
            ("microid_size_mm", self.microid_size_mm),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidDimension {
                    name: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        if !(self.padding_mm.is_finite() && self.padding_mm >= 0.0 && self.grid_size_mm() > 0.0) {
            return Err(ConfigError::InvalidDimension {
                name: self.name.clone(),
                field: "padding_mm",
                value: self.padding_mm,
            });
        }
        let inside = self.microid_x_mm >= 0.0
            && self.microid_y_mm >= 0.0
            && self.microid_x_mm + self.microid_size_mm <= self.width_mm
            && self.microid_y_mm + self.microid_size_mm <= self.height_mm;
        if !inside {
            return Err(ConfigError::FootprintOutside(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TableConfig {
    #[serde(default)]
    module: Vec<ModuleSpec>,
}

/// Immutable name → calibration map, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct ModuleTable {
    modules: BTreeMap<String, ModuleSpec>,
}

impl ModuleTable {
    /// Build a table from already-parsed records.
    pub fn from_specs(specs: Vec<ModuleSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut modules = BTreeMap::new();
        for spec in specs {
            spec.validate()?;
            if modules.contains_key(&spec.name) {
                return Err(ConfigError::Duplicate(spec.name));
            }
            modules.insert(spec.name.clone(), spec);
        }
        Ok(ModuleTable { modules })
    }

    /// Parse a TOML document made of `[[module]]` entries.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: TableConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        ModuleTable::from_specs(config.module)
    }

    /// The calibration table shipped with the crate.
    pub fn builtin() -> Self {
        ModuleTable::from_toml(include_str!("../modules/builtin.toml"))
            .expect("built-in module table should be valid")
    }

    pub fn get(&self, name: &str) -> Result<&ModuleSpec, ConfigError> {
        self.modules
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModuleType(name.to_string()))
    }

    /// Add every module of `other`; a name already present is an error and
    /// leaves `self` untouched.
    pub fn extend(&mut self, other: ModuleTable) -> Result<(), ConfigError> {
        if let Some(name) = other.names().find(|n| self.modules.contains_key(*n)) {
            return Err(ConfigError::Duplicate(name.to_string()));
        }
        self.modules.extend(other.modules);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
