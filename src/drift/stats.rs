/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Largest absolute gap between the two empirical CDFs.
    pub statistic: f64,
    /// Two-sided p-value.
    pub pvalue: f64,
}

fn sorted(v: &[f64]) -> Vec<f64> {
    let mut s = v.to_vec();
    s.sort_unstable_by(f64::total_cmp);
    s
}

/// Two-sample KS statistic over two sorted slices.
///
/// Ties are handled by stepping both ECDFs past a shared value before measuring the gap.
pub fn ks_statistic_sorted(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d = 0.0f64;
    while i < a.len() && j < b.len() {
        let x = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    d
}

/// Exact two-sided p-value `P(D >= d)` for sample sizes `n1` and `n2`.
///
/// Counts monotone lattice paths that stay strictly inside the band `|i/m - j/n| < d`,
/// normalised on the fly so the result is a probability rather than a path count.
/// Cost is `O(n1 * n2)`.
pub fn ks_exact_pvalue(d: f64, n1: usize, n2: usize) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    let (m, n) = if n1 > n2 { (n2, n1) } else { (n1, n2) };
    let (md, nd) = (m as f64, n as f64);
    // Half a lattice step below d, so paths touching d count as outside.
    let q = (0.5 + (d * md * nd - 1e-7).floor()) / (md * nd);

    let mut u: Vec<f64> = (0..=n).map(|j| if j as f64 / nd > q { 0.0 } else { 1.0 }).collect();
    for i in 1..=m {
        let w = i as f64 / (i + n) as f64;
        let fi = i as f64 / md;
        u[0] = if fi > q { 0.0 } else { w * u[0] };
        for j in 1..=n {
            u[j] = if (fi - j as f64 / nd).abs() > q {
                0.0
            } else {
                w * u[j] + u[j - 1]
            };
        }
    }
    (1.0 - u[n]).clamp(0.0, 1.0)
}

/// Survival function of the Kolmogorov distribution, `P(K > lambda)`.
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = sign * (-2.0 * kf * kf * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Asymptotic two-sided p-value, with the Stephens correction for moderate sample sizes.
pub fn ks_asymptotic_pvalue(d: f64, n1: usize, n2: usize) -> f64 {
    if d <= 0.0 {
        return 1.0;
    }
    let (a, b) = (n1 as f64, n2 as f64);
    let en = (a * b / (a + b)).sqrt();
    kolmogorov_sf((en + 0.12 + 0.11 / en) * d)
}

/// Smaller samples always get the exact p-value, the limit distribution is far off there.
const EXACT_SMALL_SIDE: usize = 100;

/// Two-sample Kolmogorov-Smirnov test.
///
/// Uses the exact distribution while the larger sample has at most `exact_limit` values, or the
/// smaller one at most 100, and the asymptotic one otherwise. Both samples must be free of
/// missing values.
///
/// * `reference` - Reference sample.
/// * `current` - Current sample.
/// * `exact_limit` - Largest sample size, inclusive, for the exact p-value.
pub fn ks_2samp(reference: &[f64], current: &[f64], exact_limit: usize) -> KsResult {
    let (a, b) = (sorted(reference), sorted(current));
    let statistic = ks_statistic_sorted(&a, &b);
    let (n1, n2) = (a.len(), b.len());
    let pvalue = if n1 == 0 || n2 == 0 {
        1.0
    } else if n1.max(n2) <= exact_limit || n1.min(n2) <= EXACT_SMALL_SIDE {
        ks_exact_pvalue(statistic, n1, n2)
    } else {
        ks_asymptotic_pvalue(statistic, n1, n2)
    };
    KsResult { statistic, pvalue }
}

/// Result of a Population Stability Index computation.
#[derive(Debug, Clone, PartialEq)]
pub struct PsiResult {
    pub psi: f64,
    /// Bucket edges, `buckets + 1` values taken from the reference range.
    pub edges: Vec<f64>,
    /// The reference range was a single value and had to be widened.
    pub degenerate: bool,
}

/// Equal-width bucket edges over the range of `reference`.
///
/// A constant reference is widened to `[v - 0.5, v + 0.5]`. Returns the edges and whether
/// that widening happened. `reference` must not be empty.
pub fn bucket_edges(reference: &[f64], buckets: usize) -> (Vec<f64>, bool) {
    let lo = reference.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = reference.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi, degenerate) = if lo == hi { (lo - 0.5, hi + 0.5, true) } else { (lo, hi, false) };
    // Interpolate rather than step by width, so ranges near f64::MAX cannot overflow.
    let mut edges: Vec<f64> = (0..buckets)
        .map(|k| {
            let t = k as f64 / buckets as f64;
            lo * (1.0 - t) + hi * t
        })
        .collect();
    edges.push(hi);
    (edges, degenerate)
}

/// Count values per bucket. Buckets are half open except the last, which includes its upper
/// edge. Values outside the edges are not counted.
pub fn bucket_counts(values: &[f64], edges: &[f64]) -> Vec<usize> {
    let buckets = edges.len().saturating_sub(1);
    let mut counts = vec![0usize; buckets];
    if buckets == 0 {
        return counts;
    }
    let (lo, hi) = (edges[0], edges[buckets]);
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = edges.partition_point(|e| *e <= v).saturating_sub(1).min(buckets - 1);
        counts[idx] += 1;
    }
    counts
}

/// Population Stability Index between a reference and a current sample.
///
/// Buckets come from the reference range only, so `psi(a, b)` and `psi(b, a)` generally differ.
/// Proportions are smoothed as `(count + eps) / (n + eps)`, and the same `eps` is added inside
/// the log. Values of `current` outside the reference range fall into no bucket but still count
/// towards its total.
///
/// * `reference` - Reference sample, non-empty and free of missing values.
/// * `current` - Current sample, non-empty and free of missing values.
/// * `buckets` - Number of equal-width buckets.
/// * `eps` - Smoothing constant.
pub fn psi(reference: &[f64], current: &[f64], buckets: usize, eps: f64) -> PsiResult {
    let (edges, degenerate) = bucket_edges(reference, buckets);
    let ref_counts = bucket_counts(reference, &edges);
    let cur_counts = bucket_counts(current, &edges);
    let (n_ref, n_cur) = (reference.len() as f64, current.len() as f64);

    let psi = ref_counts
        .iter()
        .zip(cur_counts.iter())
        .map(|(&r, &c)| {
            let r_p = (r as f64 + eps) / (n_ref + eps);
            let c_p = (c as f64 + eps) / (n_cur + eps);
            (r_p - c_p) * (r_p / c_p + eps).ln()
        })
        .sum();
    PsiResult { psi, edges, degenerate }
}
