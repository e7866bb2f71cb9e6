use std::collections::VecDeque;

use super::MarkerConfig;

/// A dark blob that might be a marker, with its outer quad ordered
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub corners: [(f64, f64); 4],
    pub pixel_count: usize,
    pub area: f64,
}

/// Extreme pixels of a component along the two diagonals and the two axes.
struct Extremes {
    min_sum: (i64, (usize, usize)),
    max_sum: (i64, (usize, usize)),
    min_diff: (i64, (usize, usize)),
    max_diff: (i64, (usize, usize)),
    min_x: (usize, (usize, usize)),
    max_x: (usize, (usize, usize)),
    min_y: (usize, (usize, usize)),
    max_y: (usize, (usize, usize)),
}

impl Extremes {
    fn new(x: usize, y: usize) -> Self {
        let s = (x + y) as i64;
        let d = x as i64 - y as i64;
        Self {
            min_sum: (s, (x, y)),
            max_sum: (s, (x, y)),
            min_diff: (d, (x, y)),
            max_diff: (d, (x, y)),
            min_x: (x, (x, y)),
            max_x: (x, (x, y)),
            min_y: (y, (x, y)),
            max_y: (y, (x, y)),
        }
    }

    fn update(&mut self, x: usize, y: usize) {
        let s = (x + y) as i64;
        let d = x as i64 - y as i64;
        if s < self.min_sum.0 {
            self.min_sum = (s, (x, y));
        }
        if s > self.max_sum.0 {
            self.max_sum = (s, (x, y));
        }
        if d < self.min_diff.0 {
            self.min_diff = (d, (x, y));
        }
        if d > self.max_diff.0 {
            self.max_diff = (d, (x, y));
        }
        if x < self.min_x.0 {
            self.min_x = (x, (x, y));
        }
        if x > self.max_x.0 {
            self.max_x = (x, (x, y));
        }
        if y < self.min_y.0 {
            self.min_y = (y, (x, y));
        }
        if y > self.max_y.0 {
            self.max_y = (y, (x, y));
        }
    }

    fn width(&self) -> usize {
        self.max_x.0 - self.min_x.0 + 1
    }

    fn height(&self) -> usize {
        self.max_y.0 - self.min_y.0 + 1
    }

    /// Upright squares are best described by the diagonal extremes, squares
    /// turned near 45 degrees by the axis extremes; keep whichever quad is larger.
    fn quad(&self) -> [(f64, f64); 4] {
        let p = |(x, y): (usize, usize)| (x as f64, y as f64);
        let diagonal = [
            p(self.min_sum.1),
            p(self.max_diff.1),
            p(self.max_sum.1),
            p(self.min_diff.1),
        ];
        let axis = [
            p(self.min_y.1),
            p(self.max_x.1),
            p(self.max_y.1),
            p(self.min_x.1),
        ];
        if quad_area(&axis) > quad_area(&diagonal) {
            axis
        } else {
            diagonal
        }
    }
}

pub(crate) fn quad_area(q: &[(f64, f64); 4]) -> f64 {
    let mut twice = 0.0;
    for i in 0..4 {
        let (x0, y0) = q[i];
        let (x1, y1) = q[(i + 1) % 4];
        twice += x0 * y1 - x1 * y0;
    }
    twice.abs() * 0.5
}

/// Collects 4-connected ink components (`mask != 0`) that pass the size,
/// aspect and fill filters.
pub(crate) fn find_candidates(
    mask: &[u8],
    width: usize,
    height: usize,
    config: &MarkerConfig,
) -> Vec<Candidate> {
    let mut visited = vec![false; mask.len()];
    let mut out = Vec::new();

    let min_side = config.min_side_px.max(1) as usize;
    let max_side = ((width.min(height) as f32) * config.max_side_fraction).max(1.0) as usize;

    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }

        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited[start] = true;

        let mut extremes = Extremes::new(start % width, start / width);
        let mut count = 0usize;

        while let Some(idx) = queue.pop_front() {
            let y = idx / width;
            let x = idx % width;
            extremes.update(x, y);
            count += 1;

            for (dx, dy) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let nxu = nx as usize;
                let nyu = ny as usize;
                if nxu >= width || nyu >= height {
                    continue;
                }
                let next_idx = nyu * width + nxu;
                if mask[next_idx] == 0 || visited[next_idx] {
                    continue;
                }
                visited[next_idx] = true;
                queue.push_back(next_idx);
            }
        }

        let (w, h) = (extremes.width(), extremes.height());
        if w < min_side || h < min_side || w > max_side || h > max_side {
            continue;
        }
        let aspect = w as f32 / h as f32;
        if aspect > config.max_aspect || aspect * config.max_aspect < 1.0 {
            continue;
        }

        let corners = extremes.quad();
        let area = quad_area(&corners);
        if area < (min_side * min_side) as f64 * 0.5 {
            continue;
        }
        let fill = count as f64 / area;
        if fill < config.min_fill_ratio as f64 || fill > config.max_fill_ratio as f64 {
            continue;
        }

        out.push(Candidate {
            corners,
            pixel_count: count,
            area,
        });
    }

    out
}
