//! Rated equipment catalogs and nearest-larger selection.
//!
//! A [`Catalog`] keeps its entries in ascending rating order. Selection returns
//! the smallest entry whose rating is at least the requirement; when nothing in
//! scope is large enough the result is [`FeederError::CapacityExceedsCatalog`],
//! never the largest entry.
//!
//! ```
//! use feedgen_algo::catalog::Catalog;
//!
//! let ratings = Catalog::new(vec![75.0, 25.0, 50.0]).unwrap();
//! assert_eq!(*ratings.select(37.0, None).unwrap(), 50.0);
//! assert!(ratings.select(80.0, None).is_err());
//! ```

use feedgen_core::{FeederError, FeederResult};
use serde::{Deserialize, Serialize};

/// An entry with a single scalar rating and an optional scope tag.
pub trait Rated {
    fn rating(&self) -> f64;

    fn scope(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> String {
        format!("{}", self.rating())
    }

    /// Entry-specific sanity checks beyond the rating itself.
    fn validate(&self) -> FeederResult<()> {
        Ok(())
    }
}

impl Rated for f64 {
    fn rating(&self) -> f64 {
        *self
    }
}

/// Distribution or substation transformer nameplate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerEntry {
    pub name: String,
    pub kva: f64,
    pub ht_kv: f64,
    pub lt_kv: f64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub pct_resistance: f64,
    #[serde(default)]
    pub pct_reactance: f64,
    #[serde(default)]
    pub pct_no_load_loss: f64,
}

impl Rated for TransformerEntry {
    fn rating(&self) -> f64 {
        self.kva
    }

    fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> FeederResult<()> {
        if !(self.ht_kv > 0.0) || !(self.lt_kv > 0.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "transformer '{}' has non-positive voltage",
                self.name
            )));
        }
        Ok(())
    }
}

/// Overhead conductor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorEntry {
    pub name: String,
    pub ampacity_a: f64,
    pub resistance_ohm_per_km: f64,
    /// Geometric mean radius
    pub gmr_m: f64,
    pub diameter_m: f64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Rated for ConductorEntry {
    fn rating(&self) -> f64 {
        self.ampacity_a
    }

    fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> FeederResult<()> {
        if !self.resistance_ohm_per_km.is_finite() || self.resistance_ohm_per_km < 0.0 {
            return Err(FeederError::InvalidConfiguration(format!(
                "conductor '{}' has invalid resistance {}",
                self.name, self.resistance_ohm_per_km
            )));
        }
        if !(self.gmr_m > 0.0) || !self.gmr_m.is_finite() {
            return Err(FeederError::InvalidConfiguration(format!(
                "conductor '{}' has invalid GMR {}",
                self.name, self.gmr_m
            )));
        }
        Ok(())
    }
}

/// Ascending sequence of rated entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog<T> {
    entries: Vec<T>,
}

impl<T: Rated> Catalog<T> {
    /// Build a catalog, sorting entries by rating (stable for equal ratings).
    pub fn new(mut entries: Vec<T>) -> FeederResult<Self> {
        for entry in &entries {
            let rating = entry.rating();
            if !rating.is_finite() || rating < 0.0 {
                return Err(FeederError::InvalidConfiguration(format!(
                    "catalog entry '{}' has invalid rating {rating}",
                    entry.name()
                )));
            }
            if matches!(entry.scope(), Some(s) if s.trim().is_empty()) {
                return Err(FeederError::InvalidConfiguration(format!(
                    "catalog entry '{}' has an empty scope",
                    entry.name()
                )));
            }
            entry.validate()?;
        }
        entries.sort_by(|a, b| a.rating().total_cmp(&b.rating()));
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries within `scope`, ascending. `None` means every entry.
    pub fn in_scope<'a>(&'a self, scope: Option<&'a str>) -> impl Iterator<Item = &'a T> + 'a {
        self.entries
            .iter()
            .filter(move |e| matches_scope(*e, scope))
    }

    pub fn largest(&self, scope: Option<&str>) -> Option<&T> {
        self.entries.iter().rev().find(|e| matches_scope(*e, scope))
    }

    /// Smallest entry in scope with rating ≥ `required`.
    pub fn select(&self, required: f64, scope: Option<&str>) -> FeederResult<&T> {
        self.select_where(required, scope, |_| true)
    }

    /// Like [`Catalog::select`] with an additional entry predicate.
    pub fn select_where<P>(&self, required: f64, scope: Option<&str>, predicate: P) -> FeederResult<&T>
    where
        P: Fn(&T) -> bool,
    {
        if required.is_nan() {
            return Err(FeederError::InvalidConfiguration(
                "required rating is NaN".to_string(),
            ));
        }
        let mut largest = None;
        for entry in self
            .entries
            .iter()
            .filter(|e| matches_scope(*e, scope) && predicate(e))
        {
            if entry.rating() >= required {
                return Ok(entry);
            }
            largest = Some(entry.rating());
        }
        Err(FeederError::CapacityExceedsCatalog {
            required,
            largest,
            scope: scope.map(str::to_string),
        })
    }

    /// The entry following `current` in scope, for escalation.
    pub fn next_after(&self, current: &T, scope: Option<&str>) -> Option<&T> {
        let position = self
            .entries
            .iter()
            .position(|e| std::ptr::eq(e, current))?;
        self.entries[position + 1..]
            .iter()
            .find(|e| matches_scope(*e, scope))
    }
}

/// Untagged entries only match when no scope is requested.
fn matches_scope<T: Rated>(entry: &T, scope: Option<&str>) -> bool {
    scope.map_or(true, |s| entry.scope() == Some(s))
}
