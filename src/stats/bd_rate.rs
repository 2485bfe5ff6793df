//! Bjontegaard-Delta rate between two sets of encoder runs.
//!
//! For each frame, the runs at every swept QP form a rate-distortion curve.
//! Log-rate is fitted as a function of distortion for the comparison and the
//! reference curve, both fits are integrated over the distortion range they
//! share, and the mean log-rate gap is turned into a percentage:
//!
//! ```text
//! avg     = (∫ cmp − ∫ ref) / (upper − lower)
//! BD-rate = (e^avg − 1) × 100
//! ```
//!
//! Negative values mean the comparison run needs fewer bits for the same
//! quality.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::{RunRecord, RunTable};

/// Default number of QP points per frame.
pub const DEFAULT_GROUP_SIZE: usize = 4;

const SIMPSON_TOLERANCE: f64 = 1e-10;
const SIMPSON_MAX_DEPTH: u32 = 50;

/// Interpolant used for the log-rate curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveFit {
    /// Monotone piecewise cubic Hermite (Fritsch-Carlson).
    #[default]
    Pchip,
    /// Piecewise linear.
    Linear,
}

/// What to do with rows left over when the table length is not a multiple
/// of the group size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingGroup {
    /// Fail with [`Error::PartialGroup`].
    #[default]
    Reject,
    /// Discard the leftover rows with a warning.
    Drop,
}

/// Settings for [`bd_rate_groups`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Rows per frame group (number of swept QPs).
    pub group_size: usize,
    /// Curve interpolant.
    pub fit: CurveFit,
    /// Handling of a trailing partial group.
    pub trailing: TrailingGroup,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            fit: CurveFit::default(),
            trailing: TrailingGroup::default(),
        }
    }
}

impl ComparatorConfig {
    /// Sets the group size.
    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Sets the curve interpolant.
    #[must_use]
    pub fn with_fit(mut self, fit: CurveFit) -> Self {
        self.fit = fit;
        self
    }

    /// Sets the trailing-group policy.
    #[must_use]
    pub fn with_trailing(mut self, trailing: TrailingGroup) -> Self {
        self.trailing = trailing;
        self
    }
}

/// BD-rate of one frame group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupBdRate {
    /// Frame of the group's first comparison row.
    pub frame: u32,
    /// BD-rate in percent.
    pub bd_rate: f64,
}

/// Compute one BD-rate per frame group.
///
/// Both tables are sorted by (frame, qp) before grouping, so the input order
/// does not matter. Groups come back in ascending frame order.
pub fn bd_rate_groups(
    cmp: &RunTable,
    reference: &RunTable,
    config: &ComparatorConfig,
) -> Result<Vec<GroupBdRate>> {
    let group_size = config.group_size;
    if group_size < 2 {
        return Err(Error::InvalidGroupSize(group_size));
    }
    if cmp.len() != reference.len() {
        return Err(Error::LengthMismatch {
            cmp: cmp.len(),
            reference: reference.len(),
        });
    }

    let remainder = cmp.len() % group_size;
    if remainder != 0 {
        match config.trailing {
            TrailingGroup::Reject => {
                return Err(Error::PartialGroup {
                    len: cmp.len(),
                    group_size,
                    remainder,
                });
            }
            TrailingGroup::Drop => log::warn!(
                "dropping {} trailing rows ({} rows, groups of {})",
                remainder,
                cmp.len(),
                group_size
            ),
        }
    }

    let cmp = cmp.sorted();
    let reference = reference.sorted();

    cmp.records()
        .chunks_exact(group_size)
        .zip(reference.records().chunks_exact(group_size))
        .enumerate()
        .map(|(group, (c, r))| {
            if c[0].frame != r[0].frame {
                return Err(Error::GroupMismatch {
                    group,
                    cmp_frame: c[0].frame,
                    ref_frame: r[0].frame,
                });
            }
            if let Some(row) = c.iter().chain(r).find(|row| row.frame != c[0].frame) {
                return Err(Error::MixedGroup {
                    group,
                    frame: c[0].frame,
                    other_frame: row.frame,
                });
            }
            Ok(GroupBdRate {
                frame: c[0].frame,
                bd_rate: curve_bd_rate(c, r, config.fit)?,
            })
        })
        .collect()
}

/// BD-rate between a single comparison curve and a single reference curve.
///
/// # Example
///
/// ```
/// use vvc_eval::stats::bd_rate::{curve_bd_rate, CurveFit};
/// use vvc_eval::RunRecord;
///
/// let reference: Vec<_> = [(1000.0, 30.0), (800.0, 31.0), (600.0, 32.0), (400.0, 33.0)]
///     .iter()
///     .zip([22, 27, 32, 37])
///     .map(|(&(rate, psnr), qp)| RunRecord::new(0, qp, rate, psnr))
///     .collect();
/// let cheaper: Vec<_> = reference
///     .iter()
///     .map(|r| RunRecord { rate: r.rate * 0.9, ..*r })
///     .collect();
///
/// let bd = curve_bd_rate(&cheaper, &reference, CurveFit::Pchip).unwrap();
/// assert!((bd - -10.0).abs() < 1e-9);
/// ```
pub fn curve_bd_rate(cmp: &[RunRecord], reference: &[RunRecord], fit: CurveFit) -> Result<f64> {
    let frame = cmp.first().or(reference.first()).map_or(0, |r| r.frame);
    let cmp_curve = Curve::fit(cmp, fit)?;
    let ref_curve = Curve::fit(reference, fit)?;

    let lower = cmp_curve.min_x().max(ref_curve.min_x());
    let upper = cmp_curve.max_x().min(ref_curve.max_x());
    if lower >= upper {
        return Err(Error::NoOverlap {
            frame,
            lower,
            upper,
        });
    }

    let cmp_area = cmp_curve.integrate(lower, upper);
    let ref_area = ref_curve.integrate(lower, upper);
    let avg_diff = (cmp_area - ref_area) / (upper - lower);

    Ok((avg_diff.exp() - 1.0) * 100.0)
}

/// Log-rate as a function of distortion.
#[derive(Debug, Clone)]
struct Curve {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Knot derivatives; empty for linear fits.
    slopes: Vec<f64>,
}

impl Curve {
    fn fit(records: &[RunRecord], fit: CurveFit) -> Result<Self> {
        if records.len() < 2 {
            return Err(Error::InvalidGroupSize(records.len()));
        }

        let mut points = Vec::with_capacity(records.len());
        for r in records {
            if !(r.rate > 0.0 && r.rate.is_finite()) {
                return Err(Error::NonPositiveRate {
                    frame: r.frame,
                    qp: r.qp,
                    rate: r.rate,
                });
            }
            if !r.distortion.is_finite() {
                return Err(Error::DegenerateCurve(format!(
                    "non-finite distortion at frame {}, QP {}",
                    r.frame, r.qp
                )));
            }
            points.push((r.distortion, r.rate.ln()));
        }

        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(Error::DegenerateCurve(format!(
                "repeated distortion {} at frame {}",
                w[0].0, records[0].frame
            )));
        }

        let (x, y): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        let slopes = match fit {
            CurveFit::Pchip => pchip_slopes(&x, &y),
            CurveFit::Linear => Vec::new(),
        };
        Ok(Self { x, y, slopes })
    }

    fn min_x(&self) -> f64 {
        self.x[0]
    }

    fn max_x(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    fn eval(&self, v: f64) -> f64 {
        let v = v.clamp(self.min_x(), self.max_x());
        // Segment k such that x[k] <= v <= x[k + 1]
        let k = self
            .x
            .partition_point(|&xi| xi <= v)
            .saturating_sub(1)
            .min(self.x.len() - 2);

        let h = self.x[k + 1] - self.x[k];
        let t = (v - self.x[k]) / h;
        let (y0, y1) = (self.y[k], self.y[k + 1]);

        if self.slopes.is_empty() {
            return y0 + t * (y1 - y0);
        }

        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * y0 + h10 * h * self.slopes[k] + h01 * y1 + h11 * h * self.slopes[k + 1]
    }

    /// Integral over `[lower, upper]`, split at the knots so every Simpson
    /// call sees a single polynomial piece.
    fn integrate(&self, lower: f64, upper: f64) -> f64 {
        let mut bounds = vec![lower];
        bounds.extend(self.x.iter().copied().filter(|&k| k > lower && k < upper));
        bounds.push(upper);

        let f = |v: f64| self.eval(v);
        bounds
            .windows(2)
            .map(|w| adaptive_simpson(&f, w[0], w[1], SIMPSON_TOLERANCE, SIMPSON_MAX_DEPTH))
            .sum()
    }
}

/// Fritsch-Carlson derivatives for a monotone cubic Hermite interpolant.
fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();

    if n == 2 {
        return vec![delta[0], delta[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }

    d[0] = edge_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = edge_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point endpoint derivative, limited to keep monotonicity.
fn edge_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if d.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

fn adaptive_simpson<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, eps: f64, depth: u32) -> f64 {
    let c = (a + b) / 2.0;
    let (fa, fb, fc) = (f(a), f(b), f(c));
    let whole = (b - a) / 6.0 * (fa + 4.0 * fc + fb);
    simpson_step(f, a, b, eps, whole, fa, fb, fc, depth)
}

#[allow(clippy::too_many_arguments)]
fn simpson_step<F: Fn(f64) -> f64>(
    f: &F,
    a: f64,
    b: f64,
    eps: f64,
    whole: f64,
    fa: f64,
    fb: f64,
    fc: f64,
    depth: u32,
) -> f64 {
    let c = (a + b) / 2.0;
    let d = (a + c) / 2.0;
    let e = (c + b) / 2.0;
    let (fd, fe) = (f(d), f(e));
    let left = (c - a) / 6.0 * (fa + 4.0 * fd + fc);
    let right = (b - c) / 6.0 * (fc + 4.0 * fe + fb);
    let delta = left + right - whole;

    if depth == 0 || delta.abs() <= 15.0 * eps {
        return left + right + delta / 15.0;
    }
    simpson_step(f, a, c, eps / 2.0, left, fa, fc, fd, depth - 1)
        + simpson_step(f, c, b, eps / 2.0, right, fc, fb, fe, depth - 1)
}
