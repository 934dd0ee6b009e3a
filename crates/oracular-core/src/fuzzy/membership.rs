//! Membership function shapes for fuzzy variables.

use serde::{Deserialize, Serialize};

/// Supported membership function shapes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Membership {
    /// Rises from `a` to a peak at `b`, falls to `c`.
    Triangle { a: f32, b: f32, c: f32 },
    /// Rises from `a` to `b`, plateaus to `c`, falls to `d`.
    Trapezoid { a: f32, b: f32, c: f32, d: f32 },
    Gaussian { mean: f32, sigma: f32 },
}

impl Membership {
    /// Degree of membership of `x`, in [0, 1].
    pub fn degree(&self, x: f32) -> f32 {
        match *self {
            Membership::Triangle { a, b, c } => {
                if x <= a || x >= c {
                    // Peak coinciding with an endpoint still scores 1 there.
                    if x == b {
                        1.0
                    } else {
                        0.0
                    }
                } else if x < b {
                    (x - a) / (b - a)
                } else if x > b {
                    (c - x) / (c - b)
                } else {
                    1.0
                }
            }
            Membership::Trapezoid { a, b, c, d } => {
                if x < a || x > d {
                    0.0
                } else if x < b {
                    if b > a {
                        (x - a) / (b - a)
                    } else {
                        1.0
                    }
                } else if x <= c {
                    1.0
                } else if d > c {
                    (d - x) / (d - c)
                } else {
                    1.0
                }
            }
            Membership::Gaussian { mean, sigma } => {
                let d = x - mean;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_peak_and_feet() {
        let mf = Membership::Triangle {
            a: 0.0,
            b: 1.0,
            c: 2.0,
        };
        assert_eq!(mf.degree(0.0), 0.0);
        assert_eq!(mf.degree(1.0), 1.0);
        assert_eq!(mf.degree(2.0), 0.0);
        assert!((mf.degree(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn trapezoid_plateau() {
        let mf = Membership::Trapezoid {
            a: 5.8,
            b: 6.4,
            c: 8.0,
            d: 8.0,
        };
        assert_eq!(mf.degree(5.0), 0.0);
        assert_eq!(mf.degree(7.0), 1.0);
        assert_eq!(mf.degree(8.0), 1.0);
        assert!(mf.degree(6.0) > 0.0 && mf.degree(6.0) < 1.0);
    }

    #[test]
    fn gaussian_is_one_at_mean() {
        let mf = Membership::Gaussian {
            mean: 5.0,
            sigma: 0.7,
        };
        assert!((mf.degree(5.0) - 1.0).abs() < 1e-6);
        assert!(mf.degree(8.0) < 0.01);
    }

    #[test]
    fn degrees_stay_in_unit_interval() {
        let shapes = [
            Membership::Triangle {
                a: -1.0,
                b: 0.0,
                c: 1.0,
            },
            Membership::Trapezoid {
                a: 0.0,
                b: 0.2,
                c: 0.8,
                d: 1.0,
            },
            Membership::Gaussian {
                mean: 0.5,
                sigma: 0.1,
            },
        ];
        for shape in &shapes {
            let mut x = -2.0f32;
            while x <= 2.0 {
                let d = shape.degree(x);
                assert!((0.0..=1.0).contains(&d), "{:?} at {} gave {}", shape, x, d);
                x += 0.05;
            }
        }
    }
}
