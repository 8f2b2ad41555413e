//! # image
//!
//! Pure, deterministic grayscale image primitives used by the cut sensor.
//!
//! None of these functions hold state and none depend on a particular vision
//! backend — the capability set (`absdiff`, `threshold`, `dilate`,
//! `find_contours`, `contour_area`, `moments`, `accumulate_weighted`) is the
//! seam a real OpenCV-backed implementation could be swapped in behind without
//! touching `sensor.rs`. Every function here is the deterministic fallback.

/// A two-dimensional grid of 8-bit grayscale intensity values, row-major.
pub type Frame = Vec<Vec<u8>>;

/// A connected component: an unordered collection of `(x, y)` pixel coordinates.
pub type Contour = Vec<(usize, usize)>;

/// Zeroth and first image moments of a contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Pixel count.
    pub m00: f64,
    /// Σx over the contour.
    pub m10: f64,
    /// Σy over the contour.
    pub m01: f64,
}

fn dims(frame: &Frame) -> (usize, usize) {
    let height = frame.len();
    let width = frame.first().map(|row| row.len()).unwrap_or(0);
    (width, height)
}

/// Elementwise `|a[i][j] - b[i][j]|`, saturating to 8-bit unsigned.
pub fn absdiff(a: &Frame, b: &Frame) -> Frame {
    a.iter()
        .zip(b.iter())
        .map(|(ra, rb)| {
            ra.iter()
                .zip(rb.iter())
                .map(|(&av, &bv)| av.abs_diff(bv))
                .collect()
        })
        .collect()
}

/// Coerces a float grid into 8-bit unsigned by rounding and clamping.
pub fn convert_scale_abs(grid: &[Vec<f64>]) -> Frame {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(|&v| v.abs().round().clamp(0.0, 255.0) as u8)
                .collect()
        })
        .collect()
}

/// Binary threshold: `maxval` where `src > thresh`, else `0`.
///
/// Returns the threshold used alongside the resulting grid, matching the
/// two-value shape of the underlying vision call this replaces.
pub fn threshold(src: &Frame, thresh: u8, maxval: u8) -> (u8, Frame) {
    let out = src
        .iter()
        .map(|row| row.iter().map(|&v| if v > thresh { maxval } else { 0 }).collect())
        .collect();
    (thresh, out)
}

/// `iterations` applications of a 3×3 max filter with edge-clamped padding.
pub fn dilate(src: &Frame, iterations: u32) -> Frame {
    let mut data = src.clone();
    let (width, height) = dims(&data);
    if width == 0 || height == 0 {
        return data;
    }
    for _ in 0..iterations {
        let mut next = data.clone();
        for y in 0..height {
            for x in 0..width {
                let mut max_val = 0u8;
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
                        let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
                        max_val = max_val.max(data[sy][sx]);
                    }
                }
                next[y][x] = max_val;
            }
        }
        data = next;
    }
    data
}

/// Connected components of non-zero pixels under 8-connectivity.
///
/// Scan order is row-major, top-to-bottom then left-to-right, so the
/// returned component order is stable for a given input.
pub fn find_contours(binary: &Frame) -> Vec<Contour> {
    let (width, height) = dims(binary);
    let mut visited = vec![vec![false; width]; height];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if binary[y][x] == 0 || visited[y][x] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![(x, y)];
            visited[y][x] = true;
            while let Some((cx, cy)) = stack.pop() {
                component.push((cx, cy));
                for dy in -1i32..=1 {
                    for dx in -1i32..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx as i32 + dx;
                        let ny = cy as i32 + dy;
                        if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if !visited[ny][nx] && binary[ny][nx] != 0 {
                            visited[ny][nx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
            contours.push(component);
        }
    }
    contours
}

/// Pixel count of the contour, as a real number.
pub fn contour_area(contour: &Contour) -> f64 {
    contour.len() as f64
}

/// Zeroth and first moments. All zero for an empty contour.
pub fn moments(contour: &Contour) -> Moments {
    if contour.is_empty() {
        return Moments { m00: 0.0, m10: 0.0, m01: 0.0 };
    }
    let m00 = contour.len() as f64;
    let m10: f64 = contour.iter().map(|&(x, _)| x as f64).sum();
    let m01: f64 = contour.iter().map(|&(_, y)| y as f64).sum();
    Moments { m00, m10, m01 }
}

/// `dst <- (1-alpha)*dst + alpha*src`, elementwise, in place.
pub fn accumulate_weighted(src: &Frame, dst: &mut [Vec<f64>], alpha: f64) {
    for (dst_row, src_row) in dst.iter_mut().zip(src.iter()) {
        for (dv, &sv) in dst_row.iter_mut().zip(src_row.iter()) {
            *dv = *dv * (1.0 - alpha) + sv as f64 * alpha;
        }
    }
}
