use std::collections::HashSet;
use crate::config::{AmrConfig, DomainBoundary};
use crate::index_space::{range2d, IndexSpace};
use crate::mesh::{split_boxes, BoxLayout};
use crate::state::LevelData;

/// Fraction of a cluster box that must be tagged before recursive bisection
/// stops subdividing it.
const GRID_EFFICIENCY: f64 = 0.7;




/**
 * Per-level refinement thresholds, read from the configuration once at
 * first use and pinned for the rest of the run.
 */
pub struct TagThresholds {
    values: Option<Vec<f64>>,
}




// ============================================================================
impl TagThresholds {

    pub fn new() -> Self {
        Self { values: None }
    }

    /**
     * Threshold for tagging cells of the given level, or `None` if the
     * level has no entry and must stay untagged.
     */
    pub fn threshold(&mut self, config: &AmrConfig, lev: usize) -> Option<f64> {
        let values = self
            .values
            .get_or_insert_with(|| config.tag_thresholds.clone());
        values.get(lev).copied()
    }
}




/**
 * Return the valid cells whose field value exceeds the threshold.
 */
pub fn tag_cells(data: &LevelData, field: usize, threshold: f64) -> Vec<(i64, i64)> {
    let num_ghost = data.num_ghost();
    let mut tags = Vec::new();

    for p in data.patches() {
        for index in p.index_space().trim_all(num_ghost).iter() {
            if p.get(index, field) > threshold {
                tags.push(index);
            }
        }
    }
    tags
}




/**
 * Dilate a tag set by `buffer` cells on each axis, so the refined region
 * extends beyond the feature that triggered it and the feature cannot
 * outrun the fine grids between regrids.
 */
pub fn buffer_tags(tags: &[(i64, i64)], buffer: i64) -> Vec<(i64, i64)> {
    let mut set = HashSet::new();

    for &(i, j) in tags {
        for di in -buffer..=buffer {
            for dj in -buffer..=buffer {
                set.insert((i + di, j + dj));
            }
        }
    }
    let mut result: Vec<_> = set.into_iter().collect();
    result.sort();
    result
}




/**
 * True if the parent layout covers every cell within `nest_buffer` of the
 * given cell, after periodic wrapping. Cells beyond a non-periodic domain
 * face do not count against nesting; ghost data there comes from the
 * physical boundary condition, not from parent data.
 */
fn cell_is_nested(
    cell: (i64, i64),
    parent: &BoxLayout,
    domain: &IndexSpace,
    boundary: &DomainBoundary,
    nest_buffer: i64) -> bool
{
    let (i0, j0) = domain.start();
    let (i1, j1) = domain.end();

    let wrap = |raw: (i64, i64)| -> Option<(i64, i64)> {
        let mut c = raw;
        if c.0 < i0 || c.0 >= i1 {
            if !boundary.is_periodic(0) {
                return None;
            }
            c.0 = (c.0 - i0).rem_euclid(i1 - i0) + i0;
        }
        if c.1 < j0 || c.1 >= j1 {
            if !boundary.is_periodic(1) {
                return None;
            }
            c.1 = (c.1 - j0).rem_euclid(j1 - j0) + j0;
        }
        Some(c)
    };

    // the cell itself must land inside the domain and under the parent
    match wrap(cell) {
        Some(c) if parent.contains_cell(c) => (),
        _ => return false,
    }

    for di in -nest_buffer..=nest_buffer {
        for dj in -nest_buffer..=nest_buffer {
            if let Some(c) = wrap((cell.0 + di, cell.1 + dj)) {
                if !parent.contains_cell(c) {
                    return false;
                }
            }
        }
    }
    true
}




/**
 * Keep the tags whose neighborhoods the parent layout covers, wrapped onto
 * the domain. Tags that cannot be nested are discarded; the feature there
 * stays at the parent's resolution.
 */
pub fn nested_tags(
    tags: &[(i64, i64)],
    parent: &BoxLayout,
    domain: &IndexSpace,
    boundary: &DomainBoundary,
    nest_buffer: i64) -> Vec<(i64, i64)>
{
    let (i0, j0) = domain.start();
    let (i1, j1) = domain.end();

    let mut set = HashSet::new();

    for &tag in tags {
        if cell_is_nested(tag, parent, domain, boundary, nest_buffer) {
            let mut c = tag;
            c.0 = (c.0 - i0).rem_euclid(i1 - i0) + i0;
            c.1 = (c.1 - j0).rem_euclid(j1 - j0) + j0;
            set.insert(c);
        }
    }
    let mut result: Vec<_> = set.into_iter().collect();
    result.sort();
    result
}




fn bounding_box(tags: &[(i64, i64)]) -> IndexSpace {
    let i0 = tags.iter().map(|t| t.0).min().unwrap_or(0);
    let i1 = tags.iter().map(|t| t.0).max().unwrap_or(-1) + 1;
    let j0 = tags.iter().map(|t| t.1).min().unwrap_or(0);
    let j1 = tags.iter().map(|t| t.1).max().unwrap_or(-1) + 1;
    range2d(i0..i1, j0..j1)
}




/**
 * Cluster tags into disjoint boxes by recursive bisection: a cluster's
 * bounding box is emitted once the tagged fraction meets the efficiency
 * target, otherwise it splits at the midpoint of its longer axis. Tight
 * bounding boxes put a tag in both halves of every split, so the recursion
 * always makes progress.
 */
pub fn cluster_tags(tags: Vec<(i64, i64)>) -> Vec<IndexSpace> {
    let mut out = Vec::new();
    bisect(tags, &mut out);
    out
}


fn bisect(tags: Vec<(i64, i64)>, out: &mut Vec<IndexSpace>) {
    if tags.is_empty() {
        return;
    }
    let bb = bounding_box(&tags);

    if tags.len() as f64 >= GRID_EFFICIENCY * bb.len() as f64 {
        out.push(bb);
        return;
    }
    let (ni, nj) = bb.dim();
    let (i0, j0) = bb.start();

    let (lo, hi) = if ni >= nj {
        let mid = i0 + ni as i64 / 2;
        tags.into_iter().partition(|t| t.0 < mid)
    } else {
        let mid = j0 + nj as i64 / 2;
        tags.into_iter().partition(|t| t.1 < mid)
    };
    bisect(lo, out);
    bisect(hi, out);
}




/**
 * Subdivide a cluster box until every kept piece is fully nested; pieces
 * holding no tag are dropped. Terminates because a tagged cell is itself
 * nested.
 */
fn trim_to_nested<F>(
    space: IndexSpace,
    tags: &HashSet<(i64, i64)>,
    nested: &F,
    out: &mut Vec<IndexSpace>)
where
    F: Fn((i64, i64)) -> bool
{
    if space.iter().all(nested) {
        out.push(space);
        return;
    }
    if !space.iter().any(|c| tags.contains(&c)) {
        return;
    }
    let (ni, nj) = space.dim();
    let (i0, j0) = space.start();
    let (i1, j1) = space.end();

    let (lo, hi) = if ni >= nj {
        let mid = i0 + ni as i64 / 2;
        (range2d(i0..mid, j0..j1), range2d(mid..i1, j0..j1))
    } else {
        let mid = j0 + nj as i64 / 2;
        (range2d(i0..i1, j0..mid), range2d(i0..i1, mid..j1))
    };
    trim_to_nested(lo, tags, nested, out);
    trim_to_nested(hi, tags, nested, out);
}




/**
 * The full pipeline from a tag list at the parent's resolution to the next
 * finer level's layout: buffer, enforce nesting, cluster, subdivide pieces
 * that escaped the nested region, chop to the box size limit, and refine.
 * Boxes are chopped at the parent resolution so their edges stay aligned to
 * the refinement ratio. Returns `None` when nothing survives, meaning the
 * finer level should not exist.
 */
pub fn make_fine_layout(
    tags: &[(i64, i64)],
    parent: &BoxLayout,
    domain: &IndexSpace,
    boundary: &DomainBoundary,
    tag_buffer: i64,
    nest_buffer: i64,
    ratio: i64,
    max_box_size: i64,
    num_workers: usize) -> Option<BoxLayout>
{
    let buffered = buffer_tags(tags, tag_buffer);
    let nested = nested_tags(&buffered, parent, domain, boundary, nest_buffer);

    if nested.is_empty() {
        return None;
    }
    let tag_set: HashSet<_> = nested.iter().copied().collect();
    let is_nested = |c| cell_is_nested(c, parent, domain, boundary, nest_buffer);

    let mut kept = Vec::new();
    for cluster in cluster_tags(nested) {
        trim_to_nested(cluster, &tag_set, &is_nested, &mut kept);
    }

    let crse_max = (max_box_size / ratio).max(1);
    let boxes: Vec<_> = kept
        .iter()
        .flat_map(|b| split_boxes(b, crse_max))
        .map(|b| b.refine_by(ratio))
        .collect();

    if boxes.is_empty() {
        None
    } else {
        Some(BoxLayout::new(boxes, num_workers))
    }
}
