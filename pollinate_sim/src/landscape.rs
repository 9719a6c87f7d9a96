//! Deterministic synthetic baseline landscapes.
//!
//! Generates a square grid of unit-cell polygons with seeded service levels,
//! pesticide rates and crop indicators, laid out as the three faceted
//! baseline layers. The same seed always yields the same landscape.

use crate::error::SimError;
use geo::{Coord, Rect};
use pollinate_core::{BaselineLayout, CropCatalog};
use pollinate_env::{BaselineLayer, LayerFeature, MemorySource};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape of a generated landscape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of features
    pub features: usize,
    /// Fraction of features whose pesticide rate is null
    pub null_fraction: f64,
    /// Probability that a feature grows any given crop
    pub crop_probability: f64,
    /// Emit `ssp1`/`ssp5` impact columns (scenario-column variant)
    pub scenario_columns: bool,
    /// Grid cell edge length
    pub cell_size: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            features: 400,
            null_fraction: 0.0,
            crop_probability: 0.3,
            scenario_columns: false,
            cell_size: 1_000.0,
        }
    }
}

impl SyntheticConfig {
    /// Rejects shapes the generator cannot honour.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.features == 0 {
            return Err(SimError::invalid_argument("synthetic landscape needs at least 1 feature"));
        }
        for (name, p) in [
            ("null fraction", self.null_fraction),
            ("crop probability", self.crop_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SimError::invalid_argument(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(SimError::invalid_argument(format!(
                "cell size must be positive, got {}",
                self.cell_size
            )));
        }
        Ok(())
    }
}

/// Bernoulli probability the rng accepts; NaN counts as never.
fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Seeded landscape generator.
pub struct SyntheticLandscape {
    seed: u64,
    rng: ChaCha8Rng,
    config: SyntheticConfig,
}

impl SyntheticLandscape {
    pub fn new(seed: u64, config: SyntheticConfig) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generates the faceted layers named by `layout`.
    ///
    /// Facet layers the layout leaves out are merged into the service layer.
    pub fn generate(&mut self, layout: &BaselineLayout, crops: &CropCatalog) -> MemorySource {
        let n = self.config.features;
        let side = (n as f64).sqrt().ceil().max(1.0) as usize;
        let null_fraction = probability(self.config.null_fraction);
        let crop_probability = probability(self.config.crop_probability);

        let mut services = Vec::with_capacity(n);
        let mut pesticides = Vec::with_capacity(n);
        let mut locations = Vec::with_capacity(n);

        for i in 0..n {
            let id = format!("cell-{:05}", i);
            let (col, row) = (i % side, i / side);

            let mut service = LayerFeature::new(&id)
                .with_geometry(self.cell(col, row))
                .with_property(&layout.service_column, self.rng.gen_range(0.05..1.0f64));
            if self.config.scenario_columns {
                let ssp1: f64 = self.rng.gen_range(0.0..0.4);
                let ssp5: f64 = (ssp1 + self.rng.gen_range(0.0..0.6)).min(1.0);
                service = service
                    .with_property(&layout.ssp1_column, ssp1)
                    .with_property(&layout.ssp5_column, ssp5);
            }

            let rate = if self.rng.gen_bool(null_fraction) {
                Value::Null
            } else {
                Value::from(self.rng.gen_range(0.0..0.8f64))
            };
            let pesticide = LayerFeature::new(&id).with_property(&layout.pesticide_column, rate);

            let location = crops.profiles().iter().fold(LayerFeature::new(&id), |f, profile| {
                let grows = self.rng.gen_bool(crop_probability);
                f.with_property(&profile.indicator_column, grows)
            });

            services.push(service);
            pesticides.push(pesticide);
            locations.push(location);
        }

        let mut source = MemorySource::new();
        match &layout.pesticide_layer {
            Some(name) => source.insert(BaselineLayer::new(name, pesticides)),
            None => merge_into(&mut services, pesticides),
        }
        match &layout.crop_layer {
            Some(name) => source.insert(BaselineLayer::new(name, locations)),
            None => merge_into(&mut services, locations),
        }
        source.insert(BaselineLayer::new(&layout.service_layer, services));

        tracing::info!(
            "Generated synthetic landscape: {} cells ({}x{} grid, seed {})",
            n,
            side,
            side,
            self.seed
        );
        source
    }

    fn cell(&self, col: usize, row: usize) -> geo::Polygon<f64> {
        let size = self.config.cell_size;
        let min = Coord {
            x: col as f64 * size,
            y: row as f64 * size,
        };
        let max = Coord {
            x: min.x + size,
            y: min.y + size,
        };
        Rect::new(min, max).to_polygon()
    }
}

fn merge_into(targets: &mut [LayerFeature], facets: Vec<LayerFeature>) {
    for (target, facet) in targets.iter_mut().zip(facets) {
        target.properties.extend(facet.properties);
    }
}
