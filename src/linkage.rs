//! Agglomerative hierarchical clustering
//!
//! The metric matrix is an opaque numeric input here: rows are entities,
//! columns are metrics scaled to [0, 1]. Clustering is Ward linkage over
//! Euclidean distances, emitting scipy-shaped merge steps: originals carry
//! cluster ids `0..n-1` and step `i` creates id `n+i`. The tree builder
//! consumes only this output shape.

/// One agglomerative merge: the two cluster ids joined, the Ward distance at
/// which they joined, and the size of the resulting cluster
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// Scale each column of the matrix to [0, 1].
///
/// A constant column maps to all zeros, matching min-max scaling with a unit
/// denominator for a degenerate range.
pub fn min_max_scale(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if matrix.is_empty() {
        return Vec::new();
    }

    let cols = matrix[0].len();
    let mut scaled = matrix.to_vec();

    for col in 0..cols {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for row in matrix {
            min = min.min(row[col]);
            max = max.max(row[col]);
        }

        let range = max - min;
        for row in scaled.iter_mut() {
            row[col] = if range == 0.0 {
                0.0
            } else {
                (row[col] - min) / range
            };
        }
    }

    scaled
}

/// Euclidean (L2) distance between two rows
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "rows must have the same width");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Ward-linkage agglomerative clustering over the rows of `matrix`.
///
/// Returns `n - 1` merge steps for `n` rows (none for fewer than two rows).
/// Ties on merge distance break toward the lexicographically smallest id
/// pair, so the merge sequence is reproducible for identical input.
pub fn ward_linkage(matrix: &[Vec<f64>]) -> Vec<MergeStep> {
    let n = matrix.len();
    if n < 2 {
        return Vec::new();
    }

    // Active clusters: (id, size), with a parallel symmetric distance matrix.
    let mut ids: Vec<usize> = (0..n).collect();
    let mut sizes: Vec<usize> = vec![1; n];
    let mut dist: Vec<Vec<f64>> = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean_distance(&matrix[i], &matrix[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        let active = ids.len();

        // Closest active pair by slot; strict < keeps the first slot pair
        // scanned on ties, so the merge sequence is deterministic.
        let (mut best_i, mut best_j) = (0, 1);
        let mut best = f64::INFINITY;
        for i in 0..active {
            for j in (i + 1)..active {
                if dist[i][j] < best {
                    best = dist[i][j];
                    best_i = i;
                    best_j = j;
                }
            }
        }

        let (left_id, right_id) = (ids[best_i], ids[best_j]);
        let (left_size, right_size) = (sizes[best_i], sizes[best_j]);
        let merged_size = left_size + right_size;

        merges.push(MergeStep {
            left: left_id.min(right_id),
            right: left_id.max(right_id),
            distance: best,
            size: merged_size,
        });

        // Lance-Williams update for Ward linkage: overwrite slot best_i with
        // the merged cluster, then drop slot best_j.
        for k in 0..active {
            if k == best_i || k == best_j {
                continue;
            }
            let nk = sizes[k] as f64;
            let ni = left_size as f64;
            let nj = right_size as f64;
            let d = (((ni + nk) * dist[best_i][k].powi(2)
                + (nj + nk) * dist[best_j][k].powi(2)
                - nk * best.powi(2))
                / (ni + nj + nk))
                .max(0.0)
                .sqrt();
            dist[best_i][k] = d;
            dist[k][best_i] = d;
        }

        ids[best_i] = n + step;
        sizes[best_i] = merged_size;

        ids.remove(best_j);
        sizes.remove(best_j);
        dist.remove(best_j);
        for row in dist.iter_mut() {
            row.remove(best_j);
        }
    }

    merges
}

/// Cophenetic correlation coefficient: Pearson correlation between the
/// original pairwise distances and the merge distances at which each pair
/// first joined. Closer to 1 means the hierarchy preserves the original
/// distances better. `None` when fewer than two pairs exist or a side is
/// constant.
pub fn cophenetic_correlation(matrix: &[Vec<f64>], merges: &[MergeStep]) -> Option<f64> {
    let n = matrix.len();
    if n < 3 {
        return None;
    }

    // Leaf membership per cluster id; merged clusters live at n + step.
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut coph = vec![vec![0.0f64; n]; n];

    for merge in merges {
        let left = &members[merge.left];
        let right = &members[merge.right];
        for &a in left {
            for &b in right {
                coph[a][b] = merge.distance;
                coph[b][a] = merge.distance;
            }
        }
        let mut combined = members[merge.left].clone();
        combined.extend_from_slice(&members[merge.right]);
        members.push(combined);
    }

    let mut original = Vec::with_capacity(n * (n - 1) / 2);
    let mut cophenetic = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            original.push(euclidean_distance(&matrix[i], &matrix[j]));
            cophenetic.push(coph[i][j]);
        }
    }

    pearson(&original, &cophenetic)
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let len = xs.len() as f64;
    if xs.len() < 2 {
        return None;
    }

    let mean_x = xs.iter().sum::<f64>() / len;
    let mean_y = ys.iter().sum::<f64>() / len;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_euclidean_distance_known_value() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_scale_maps_to_unit_interval() {
        let matrix = vec![vec![0.0, 10.0], vec![5.0, 20.0], vec![10.0, 15.0]];
        let scaled = min_max_scale(&matrix);
        assert_eq!(scaled[0], vec![0.0, 0.0]);
        assert_eq!(scaled[1], vec![0.5, 1.0]);
        assert_eq!(scaled[2], vec![1.0, 0.5]);
    }

    #[test]
    fn test_min_max_scale_constant_column_is_zero() {
        let matrix = vec![vec![7.0], vec![7.0]];
        assert_eq!(min_max_scale(&matrix), vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn test_ward_linkage_two_points() {
        let matrix = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
        let merges = ward_linkage(&matrix);

        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].left, 0);
        assert_eq!(merges[0].right, 1);
        assert_eq!(merges[0].size, 2);
        assert!((merges[0].distance - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ward_linkage_merges_nearest_pair_first() {
        // Two tight points and one far outlier: 0 and 1 must merge first,
        // then the pair joins 2.
        let matrix = vec![vec![0.0], vec![0.1], vec![10.0]];
        let merges = ward_linkage(&matrix);

        assert_eq!(merges.len(), 2);
        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert_eq!(merges[0].size, 2);
        // Second step joins the new cluster (id 3) with the outlier
        assert_eq!((merges[1].left, merges[1].right), (2, 3));
        assert_eq!(merges[1].size, 3);
        assert!(merges[1].distance > merges[0].distance);
    }

    #[test]
    fn test_ward_linkage_trivial_inputs() {
        assert!(ward_linkage(&[]).is_empty());
        assert!(ward_linkage(&[vec![1.0]]).is_empty());
    }

    #[test]
    fn test_ward_linkage_deterministic_on_ties() {
        // Four corners of a square: all nearest-neighbor distances tie, so
        // two runs must produce identical merge sequences.
        let matrix = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
        ];
        assert_eq!(ward_linkage(&matrix), ward_linkage(&matrix));
    }

    #[test]
    fn test_cophenetic_correlation_strong_for_clean_clusters() {
        let matrix = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![5.0, 5.0],
            vec![5.1, 5.0],
        ];
        let merges = ward_linkage(&matrix);
        let c = cophenetic_correlation(&matrix, &merges).unwrap();
        assert!(c > 0.9, "expected high cophenetic correlation, got {c}");
    }

    #[test]
    fn test_cophenetic_correlation_undefined_for_tiny_input() {
        let matrix = vec![vec![0.0], vec![1.0]];
        let merges = ward_linkage(&matrix);
        assert_eq!(cophenetic_correlation(&matrix, &merges), None);
    }
}
