use demand_client::domain::StationDayAggregate;

/// Min-max scale of one feature. `max >= min` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScale {
    pub min: f64,
    pub max: f64,
}

impl FeatureScale {
    pub fn fit(values: impl IntoIterator<Item = f64>) -> Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Self { min: 0.0, max: 0.0 };
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self { min, max }
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// `(x - min) / (max - min)`, or 0 for a degenerate scale. Values outside
    /// the fitted range are passed through unclamped.
    pub fn normalize(&self, x: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (x - self.min) / (self.max - self.min)
        }
    }

    pub fn denormalize(&self, x: f64) -> f64 {
        x * (self.max - self.min) + self.min
    }
}

/// Scales fitted from a single upload. Never reused across requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationParams {
    pub duration: FeatureScale,
    pub energy: FeatureScale,
}

impl NormalizationParams {
    pub fn fit(aggregates: &[StationDayAggregate]) -> Self {
        Self {
            duration: FeatureScale::fit(aggregates.iter().map(|a| a.duration_sum)),
            energy: FeatureScale::fit(aggregates.iter().map(|a| a.energy_sum)),
        }
    }

    /// Returns copies of `aggregates` with energy and duration rescaled.
    pub fn normalize_all(&self, aggregates: &[StationDayAggregate]) -> Vec<StationDayAggregate> {
        aggregates
            .iter()
            .map(|a| StationDayAggregate {
                energy_sum: self.energy.normalize(a.energy_sum),
                duration_sum: self.duration.normalize(a.duration_sum),
                ..a.clone()
            })
            .collect()
    }
}
