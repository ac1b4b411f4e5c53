//! Parametric semivariance models.
//!
//! A variogram relates expected squared difference between two observations
//! to their separation distance. All models share three parameters: the
//! nugget (measurement-noise variance at zero separation), the sill
//! (asymptotic variance) and the range (distance at which the sill is
//! effectively reached).

use serde::{Deserialize, Serialize};

use crate::error::{KrigingError, Result};

/// A fitted or supplied semivariance model.
///
/// `gamma(0)` is exactly 0; the nugget is the limit from above. Covariance
/// follows `Cov(d) = sill - gamma(d)`, with the target self-covariance
/// `Cov(0) = sill` and the node self-covariance `sill - nugget` (the nugget
/// stands in for node-level measurement variance).
pub trait Variogram: Send + Sync {
    fn nugget(&self) -> f64;
    fn sill(&self) -> f64;
    fn range(&self) -> f64;
    fn gamma(&self, distance: f64) -> f64;

    fn covariance(&self, distance: f64) -> f64 {
        if distance == 0.0 {
            self.sill()
        } else {
            self.sill() - self.gamma(distance)
        }
    }

    fn node_covariance(&self, distance: f64) -> f64 {
        if distance == 0.0 {
            self.sill() - self.nugget()
        } else {
            self.sill() - self.gamma(distance)
        }
    }
}

fn validate(nugget: f64, sill: f64, range: f64) -> Result<()> {
    if !(nugget.is_finite() && sill.is_finite() && range.is_finite()) {
        return Err(KrigingError::invalid_variogram("non-finite parameter"));
    }
    if nugget < 0.0 || sill < nugget {
        return Err(KrigingError::invalid_variogram(format!(
            "need 0 <= nugget <= sill, got nugget={nugget}, sill={sill}"
        )));
    }
    if range <= 0.0 {
        return Err(KrigingError::invalid_variogram(format!(
            "range must be positive, got {range}"
        )));
    }
    Ok(())
}

/// Spherical model: cubic rise to the sill, exactly flat beyond the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphericalVariogram {
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl SphericalVariogram {
    pub fn new(nugget: f64, sill: f64, range: f64) -> Result<Self> {
        validate(nugget, sill, range)?;
        Ok(Self {
            nugget,
            sill,
            range,
        })
    }
}

impl Variogram for SphericalVariogram {
    fn nugget(&self) -> f64 {
        self.nugget
    }

    fn sill(&self) -> f64 {
        self.sill
    }

    fn range(&self) -> f64 {
        self.range
    }

    fn gamma(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        if distance >= self.range {
            return self.sill;
        }
        let h = distance / self.range;
        self.nugget + (self.sill - self.nugget) * (1.5 * h - 0.5 * h * h * h)
    }
}

/// Exponential model: asymptotic rise, 95 % of the sill at the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialVariogram {
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl ExponentialVariogram {
    pub fn new(nugget: f64, sill: f64, range: f64) -> Result<Self> {
        validate(nugget, sill, range)?;
        Ok(Self {
            nugget,
            sill,
            range,
        })
    }
}

impl Variogram for ExponentialVariogram {
    fn nugget(&self) -> f64 {
        self.nugget
    }

    fn sill(&self) -> f64 {
        self.sill
    }

    fn range(&self) -> f64 {
        self.range
    }

    fn gamma(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        self.nugget + (self.sill - self.nugget) * (1.0 - (-3.0 * distance / self.range).exp())
    }
}

/// Gaussian model: parabolic near the origin, smooth fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianVariogram {
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl GaussianVariogram {
    pub fn new(nugget: f64, sill: f64, range: f64) -> Result<Self> {
        validate(nugget, sill, range)?;
        Ok(Self {
            nugget,
            sill,
            range,
        })
    }
}

impl Variogram for GaussianVariogram {
    fn nugget(&self) -> f64 {
        self.nugget
    }

    fn sill(&self) -> f64 {
        self.sill
    }

    fn range(&self) -> f64 {
        self.range
    }

    fn gamma(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        let h = distance / self.range;
        self.nugget + (self.sill - self.nugget) * (1.0 - (-3.0 * h * h).exp())
    }
}
