//! Polynomial calibration of raw samples into physical values.
//!
use ndarray::{ArrayBase, DataMut, Dimension};

/// A polynomial expansion around an origin.
///
/// A raw sample `x` calibrates to `Σ coefficients[i] · (x - origin)^i`. Coefficients are stored
/// lowest degree first. No coefficients means no calibration.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Calibration {
    pub coefficients: Vec<f64>,
    pub origin: Option<f64>,
}

impl Calibration {
    pub fn new(coefficients: Vec<f64>, origin: Option<f64>) -> Self {
        Self {
            coefficients,
            origin,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// The expansion origin, 0.0 if it isn't set
    pub fn origin(&self) -> f64 {
        self.origin.unwrap_or(0.0)
    }

    /// Calibrate a single raw sample.
    ///
    /// Evaluated with Horner's scheme starting from the highest degree coefficient, so that
    /// results match reference outputs bit for bit.
    ///
    pub fn apply(&self, x: f64) -> f64 {
        if self.is_identity() {
            return x;
        }

        let x = x - self.origin();
        let mut coefficients = self.coefficients.iter().rev();
        let mut value = *coefficients.next().unwrap_or(&0.0);
        for coefficient in coefficients {
            value = coefficient + value * x;
        }

        value
    }

    /// Calibrate every sample of `data` in place.
    ///
    pub fn apply_in_place<S, D>(&self, data: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f64>,
        D: Dimension,
    {
        if self.is_identity() {
            return;
        }

        data.mapv_inplace(|x| self.apply(x));
    }
}
