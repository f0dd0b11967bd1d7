use super::config::Normalization;
use super::features::FeatureVector;

/// Per-dimension statistics over a whole set of vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub mean: Vec<f64>,
    /// Population standard deviation.
    pub std_dev: Vec<f64>,
}

impl ColumnStats {
    /// Statistics of `rows`; all rows must have the same length.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let rows: Vec<&[f64]> = rows.into_iter().collect();
        let dim = rows.first().map_or(0, |r| r.len());
        let n = rows.len() as f64;

        let mut min = vec![f64::INFINITY; dim];
        let mut max = vec![f64::NEG_INFINITY; dim];
        let mut mean = vec![0.0; dim];
        for row in &rows {
            for (j, &v) in row.iter().enumerate() {
                min[j] = min[j].min(v);
                max[j] = max[j].max(v);
                mean[j] += v;
            }
        }
        if !rows.is_empty() {
            for m in mean.iter_mut() {
                *m /= n;
            }
        }

        let mut std_dev = vec![0.0; dim];
        for row in &rows {
            for (j, &v) in row.iter().enumerate() {
                std_dev[j] += (v - mean[j]).powi(2);
            }
        }
        if !rows.is_empty() {
            for s in std_dev.iter_mut() {
                *s = (*s / n).sqrt();
            }
        }

        Self {
            min,
            max,
            mean,
            std_dev,
        }
    }
}

/// Rescales every dimension using statistics taken over all vectors.
///
/// `MinMax` maps each dimension onto `[0, 1]`; `ZScore` centers it on zero
/// with unit standard deviation. A constant dimension becomes all zeros under
/// either method. `None` returns the values unchanged.
pub fn normalize(vectors: &[FeatureVector], method: Normalization) -> Vec<Vec<f64>> {
    let rows = vectors.iter().map(|v| v.values.clone());
    if method == Normalization::None {
        return rows.collect();
    }

    let stats = ColumnStats::from_rows(vectors.iter().map(|v| v.values.as_slice()));
    rows.map(|mut row| {
        for (j, v) in row.iter_mut().enumerate() {
            *v = match method {
                Normalization::MinMax => {
                    let range = stats.max[j] - stats.min[j];
                    if range > 0.0 {
                        (*v - stats.min[j]) / range
                    } else {
                        0.0
                    }
                }
                Normalization::ZScore => {
                    if stats.std_dev[j] > 0.0 {
                        (*v - stats.mean[j]) / stats.std_dev[j]
                    } else {
                        0.0
                    }
                }
                Normalization::None => *v,
            };
        }
        row
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vectors() -> Vec<FeatureVector> {
        [[10.0, 5.0], [20.0, 5.0], [30.0, 5.0]]
            .iter()
            .enumerate()
            .map(|(i, v)| FeatureVector {
                student_id: format!("s{}", i),
                values: v.to_vec(),
            })
            .collect()
    }

    #[test]
    fn test_none_is_identity() {
        let out = normalize(&vectors(), Normalization::None);
        assert_eq!(out, vec![vec![10.0, 5.0], vec![20.0, 5.0], vec![30.0, 5.0]]);
    }

    #[test]
    fn test_min_max() {
        let out = normalize(&vectors(), Normalization::MinMax);
        assert_relative_eq!(out[0][0], 0.0);
        assert_relative_eq!(out[1][0], 0.5);
        assert_relative_eq!(out[2][0], 1.0);
        // constant column
        assert!(out.iter().all(|r| r[1] == 0.0));
    }

    #[test]
    fn test_z_score() {
        let out = normalize(&vectors(), Normalization::ZScore);
        let sd = (200.0_f64 / 3.0).sqrt();
        assert_relative_eq!(out[0][0], -10.0 / sd, epsilon = 1e-12);
        assert_relative_eq!(out[1][0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[2][0], 10.0 / sd, epsilon = 1e-12);
        assert!(out.iter().all(|r| r[1] == 0.0));
    }

    #[test]
    fn test_column_stats() {
        let rows = [vec![1.0, 4.0], vec![3.0, 8.0]];
        let stats = ColumnStats::from_rows(rows.iter().map(|r| r.as_slice()));
        assert_eq!(stats.min, vec![1.0, 4.0]);
        assert_eq!(stats.max, vec![3.0, 8.0]);
        assert_eq!(stats.mean, vec![2.0, 6.0]);
        assert_eq!(stats.std_dev, vec![1.0, 2.0]);
    }
}
