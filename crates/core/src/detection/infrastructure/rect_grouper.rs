use crate::detection::infrastructure::math::partition;
use crate::shared::bounding_box::BoundingBox;

/// Clusters raw sliding-window hits into final detections.
///
/// Hits are linked when all four edges lie within
/// `eps * (min width + min height) / 2` of each other. Each cluster is
/// averaged; clusters of `min_neighbors` hits or fewer are dropped, as are
/// weaker clusters lying inside a stronger one. `min_neighbors <= 0`
/// returns the raw hits untouched.
pub fn group_rectangles(raw: &[BoundingBox], min_neighbors: i32, eps: f64) -> Vec<BoundingBox> {
    if min_neighbors <= 0 || raw.is_empty() {
        return raw.to_vec();
    }
    let threshold = min_neighbors as usize;

    let (labels, classes) = partition(raw, |a, b| similar(a, b, eps));

    let mut sums = vec![[0u64; 4]; classes];
    let mut counts = vec![0usize; classes];
    for (r, &label) in raw.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += r.x as u64;
        s[1] += r.y as u64;
        s[2] += r.width as u64;
        s[3] += r.height as u64;
        counts[label] += 1;
    }

    let averaged: Vec<BoundingBox> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: u64| (v as f64 / n as f64).round() as u32;
            BoundingBox::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= threshold {
            continue;
        }
        let enclosed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            j != i && n2 > threshold && encloses(r2, r1, eps) && (n2 > n1.max(3) || n1 < 3)
        });
        if !enclosed {
            grouped.push(*r1);
        }
    }
    grouped
}

fn similar(a: &BoundingBox, b: &BoundingBox, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64) * 0.5;
    let near = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    near(a.x, b.x) && near(a.y, b.y) && near(a.right(), b.right()) && near(a.bottom(), b.bottom())
}

/// Whether `inner` fits inside `outer` grown by `eps` of its size.
fn encloses(outer: &BoundingBox, inner: &BoundingBox, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i64;
    let dy = (outer.height as f64 * eps).round() as i64;
    inner.x as i64 >= outer.x as i64 - dx
        && inner.y as i64 >= outer.y as i64 - dy
        && inner.right() as i64 <= outer.right() as i64 + dx
        && inner.bottom() as i64 <= outer.bottom() as i64 + dy
}
