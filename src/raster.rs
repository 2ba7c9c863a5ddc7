//! Analytical anti-aliased scanline converter.
//!
//! Outlines come in as 26.6 fixed point and are up-scaled to 8 fractional
//! bits internally. Every edge is decomposed into per-scanline cell
//! contributions: a cell records, for one pixel on one scanline, the signed
//! vertical distance an edge spends in the pixel (`cover`) and the
//! area-weighted horizontal position of the crossing (`area`). The sweep
//! pass then walks each scanline's sorted cell list, turning running cover
//! into constant-coverage spans written straight into the target bitmap.
//!
//! The converter never allocates while rendering. All working memory is a
//! pool fixed at construction: per band it is carved into one list head per
//! scanline plus a dense cell arena (cells link by arena index, not
//! pointer). When a band's cells overflow the arena the band is halved and
//! retried; a band that cannot shrink below one scanline fails the render.

use arrayvec::ArrayVec;

use crate::error::{bail_if, GryphErr};
use crate::types::{curve_tag, Bitmap, Outline, Point, TAG_CONIC, TAG_CUBIC, TAG_ON};

const PIXEL_BITS: i32 = 8;
const ONE_PIXEL: i32 = 1 << PIXEL_BITS;

/// Default pool size in bytes when the caller passes 0.
pub const DEFAULT_POOL_SIZE: usize = 16384;

const MAX_SPANS: usize = 32;
const MAX_BANDS: usize = 40;
const CELL_NONE: u32 = u32::MAX;
const CELL_SIZE: usize = core::mem::size_of::<Cell>();

#[inline]
fn trunc(x: i32) -> i32 {
    x >> PIXEL_BITS
}

#[inline]
fn subpixels(x: i32) -> i32 {
    x << PIXEL_BITS
}

/// 26.6 to the internal 24.8 scale.
#[inline]
fn upscale(x: i32) -> i32 {
    x << (PIXEL_BITS - 6)
}

#[inline]
fn downscale(x: i32) -> i32 {
    x >> (PIXEL_BITS - 6)
}

/// Floor division with a non-negative remainder (`q > 0`).
#[inline]
fn div_mod(p: i32, q: i32) -> (i32, i32) {
    let mut d = p / q;
    let mut m = p % q;
    if m < 0 {
        d -= 1;
        m += q;
    }
    (d, m)
}

#[inline]
fn midpoint(a: Point, b: Point) -> Point {
    Point {
        x: (a.x + b.x) / 2,
        y: (a.y + b.y) / 2,
    }
}

#[derive(Clone, Copy)]
struct Cell {
    x: i32,
    cover: i32,
    area: i32,
    next: u32,
}

#[derive(Clone, Copy)]
struct Span {
    x: i32,
    len: i32,
    coverage: u8,
}

#[derive(Clone, Copy)]
struct Band {
    min: i32,
    max: i32,
}

/// Reusable converter. One instance serves any number of renders; the pool
/// budget and band size persist across calls (a frame that had to split
/// bands shrinks the band size for the following frames).
pub struct Raster {
    budget: usize,
    band_size: i32,
    cells: Vec<Cell>,
    ycells: Vec<u32>,
}

impl Raster {
    /// `pool_size` is the working-memory budget in bytes; 0 selects
    /// [`DEFAULT_POOL_SIZE`].
    pub fn new(pool_size: usize) -> Self {
        let budget = if pool_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            pool_size
        } & !15;
        Raster {
            budget,
            band_size: ((budget >> 7) as i32).max(1),
            cells: Vec::with_capacity(budget / CELL_SIZE),
            ycells: Vec::with_capacity(budget / 4),
        }
    }

    /// Render `outline` (26.6, already scaled to the target size) into the
    /// 8-bpp `target`. Coverage is written over whatever the buffer holds;
    /// callers zero it first.
    pub fn render(&mut self, target: &mut Bitmap, outline: &Outline) -> Result<(), GryphErr> {
        bail_if!(outline.n_points() == 0 || outline.n_contours() == 0, InvalidOutline);
        bail_if!(
            outline.tags.len() != outline.n_points()
                || *outline.contours.last().unwrap() + 1 != outline.n_points() as i16,
            InvalidOutline
        );
        bail_if!(
            target.width <= 0 || target.height <= 0 || target.bitcount != 8,
            InvalidArgument
        );
        bail_if!(target.buffer.len() < target.data_len(), InvalidArgument);

        let mut worker = Worker {
            outline,
            clip_x_max: target.width as i32,
            clip_y_max: target.height as i32,
            target,
            cells: &mut self.cells,
            ycells: &mut self.ycells,
            budget: self.budget,
            max_cells: 0,
            band_size: self.band_size,
            band_shoot: 0,
            min_ex: 0,
            max_ex: 0,
            min_ey: 0,
            max_ey: 0,
            count_ex: 0,
            count_ey: 0,
            ex: 0,
            ey: 0,
            area: 0,
            cover: 0,
            invalid: true,
            x: 0,
            y: 0,
            last_ey: 0,
            conic_level: 32,
            cubic_level: 16,
            bez_stack: [Point::default(); 32 * 3 + 1],
            lev_stack: [0; 32],
            spans: ArrayVec::new(),
            span_y: i32::MIN,
        };
        let result = worker.convert_glyph();
        let band_shoot = worker.band_shoot;

        // A frame that kept splitting was over-ambitious; halve the band
        // size for subsequent frames, floored at 16 scanlines.
        if band_shoot > 8 && self.band_size > 16 {
            self.band_size = (self.band_size / 2).max(16);
        }
        result
    }
}

struct Worker<'a> {
    outline: &'a Outline,
    target: &'a mut Bitmap,
    cells: &'a mut Vec<Cell>,
    ycells: &'a mut Vec<u32>,
    budget: usize,
    max_cells: usize,
    band_size: i32,
    band_shoot: i32,
    clip_x_max: i32,
    clip_y_max: i32,
    /// Effective raster box after clipping; `min_ey..max_ey` narrows to the
    /// current band while rendering.
    min_ex: i32,
    max_ex: i32,
    min_ey: i32,
    max_ey: i32,
    count_ex: i32,
    count_ey: i32,
    /// Current cell position, relative to `(min_ex, min_ey)`.
    ex: i32,
    ey: i32,
    area: i32,
    cover: i32,
    invalid: bool,
    /// Current pen position, 24.8.
    x: i32,
    y: i32,
    last_ey: i32,
    conic_level: i32,
    cubic_level: i32,
    bez_stack: [Point; 32 * 3 + 1],
    lev_stack: [i32; 32],
    spans: ArrayVec<Span, MAX_SPANS>,
    span_y: i32,
}

impl Worker<'_> {
    fn compute_cbox(&mut self) {
        let mut points = self.outline.points.iter();
        let Some(first) = points.next() else {
            self.min_ex = 0;
            self.max_ex = 0;
            self.min_ey = 0;
            self.max_ey = 0;
            return;
        };
        let (mut min_x, mut max_x) = (first.x, first.x);
        let (mut min_y, mut max_y) = (first.y, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        // 26.6 to whole pixels, outward.
        self.min_ex = min_x >> 6;
        self.min_ey = min_y >> 6;
        self.max_ex = (max_x + 63) >> 6;
        self.max_ey = (max_y + 63) >> 6;
    }

    fn convert_glyph(&mut self) -> Result<(), GryphErr> {
        self.compute_cbox();

        if self.max_ex <= 0
            || self.min_ex >= self.clip_x_max
            || self.max_ey <= 0
            || self.min_ey >= self.clip_y_max
        {
            return Ok(());
        }
        self.min_ex = self.min_ex.max(0);
        self.min_ey = self.min_ey.max(0);
        self.max_ex = self.max_ex.min(self.clip_x_max);
        self.max_ey = self.max_ey.min(self.clip_y_max);
        self.count_ex = self.max_ex - self.min_ex;
        self.count_ey = self.max_ey - self.min_ey;

        // Coarser flattening for larger glyphs.
        let mut boost = 0;
        if self.count_ex > 24 || self.count_ey > 24 {
            boost += 1;
        }
        if self.count_ex > 120 || self.count_ey > 120 {
            boost += 1;
        }
        self.conic_level = 32 << boost;
        self.cubic_level = 16 << boost;

        let full_min = self.min_ey;
        let full_max = self.max_ey;
        let num_bands = ((full_max - full_min) / self.band_size).clamp(1, 39);

        let mut band_min = full_min;
        for n in 0..num_bands {
            let mut band_max = band_min + self.band_size;
            if n == num_bands - 1 || band_max > full_max {
                band_max = full_max;
            }

            let mut stack: ArrayVec<Band, MAX_BANDS> = ArrayVec::new();
            stack.push(Band {
                min: band_min,
                max: band_max,
            });
            while let Some(band) = stack.pop() {
                match self.render_band(band) {
                    Ok(()) => continue,
                    Err(GryphErr::PoolOverflow) => {
                        let middle = band.min + ((band.max - band.min) >> 1);
                        // Already down to one scanline: the pool is simply
                        // too small for this outline.
                        bail_if!(middle == band.min, PoolOverflow);
                        if band.max - band.min >= self.band_size {
                            self.band_shoot += 1;
                        }
                        bail_if!(stack.remaining_capacity() < 2, PoolOverflow);
                        stack.push(Band {
                            min: middle,
                            max: band.max,
                        });
                        stack.push(Band {
                            min: band.min,
                            max: middle,
                        });
                    }
                    Err(other) => return Err(other),
                }
            }
            band_min = band_max;
        }
        Ok(())
    }

    fn render_band(&mut self, band: Band) -> Result<(), GryphErr> {
        let ycount = (band.max - band.min) as usize;

        // Carve the pool: one list head per scanline, cells in the rest.
        let mut head_bytes = ycount * 4;
        let misalign = head_bytes % CELL_SIZE;
        if misalign > 0 {
            head_bytes += CELL_SIZE - misalign;
        }
        bail_if!(head_bytes >= self.budget, PoolOverflow);
        self.max_cells = (self.budget - head_bytes) / CELL_SIZE;
        bail_if!(self.max_cells < 2, PoolOverflow);

        self.ycells.clear();
        self.ycells.resize(ycount, CELL_NONE);
        self.cells.clear();

        self.min_ey = band.min;
        self.max_ey = band.max;
        self.count_ey = band.max - band.min;
        self.area = 0;
        self.cover = 0;
        self.invalid = true;

        self.decompose()?;
        self.record_cell()?;
        self.sweep();
        Ok(())
    }

    // ----- cell bookkeeping -------------------------------------------

    fn find_cell(&mut self) -> Result<usize, GryphErr> {
        let x = self.ex.min(self.count_ex);
        let row = self.ey as usize;

        let mut prev: Option<usize> = None;
        let mut cur = self.ycells[row];
        while cur != CELL_NONE {
            let cell = &self.cells[cur as usize];
            if cell.x == x {
                return Ok(cur as usize);
            }
            if cell.x > x {
                break;
            }
            prev = Some(cur as usize);
            cur = cell.next;
        }

        bail_if!(self.cells.len() >= self.max_cells, PoolOverflow);
        let idx = self.cells.len();
        self.cells.push(Cell {
            x,
            cover: 0,
            area: 0,
            next: cur,
        });
        match prev {
            Some(p) => self.cells[p].next = idx as u32,
            None => self.ycells[row] = idx as u32,
        }
        Ok(idx)
    }

    fn record_cell(&mut self) -> Result<(), GryphErr> {
        if !self.invalid && (self.area | self.cover) != 0 {
            let idx = self.find_cell()?;
            self.cells[idx].area += self.area;
            self.cells[idx].cover += self.cover;
        }
        Ok(())
    }

    fn set_cell(&mut self, mut ex: i32, mut ey: i32) -> Result<(), GryphErr> {
        // Cells to the left of the clip region collapse onto min_ex - 1,
        // cells to the right onto max_ex; the invalid flag keeps rows
        // outside the band from being recorded at all.
        ey -= self.min_ey;
        if ex > self.max_ex {
            ex = self.max_ex;
        }
        ex -= self.min_ex;
        if ex < 0 {
            ex = -1;
        }

        if ex != self.ex || ey != self.ey {
            if !self.invalid {
                self.record_cell()?;
            }
            self.area = 0;
            self.cover = 0;
        }

        self.ex = ex;
        self.ey = ey;
        self.invalid = (ey as u32) >= (self.count_ey as u32) || ex >= self.count_ex;
        Ok(())
    }

    fn start_cell(&mut self, mut ex: i32, ey: i32) -> Result<(), GryphErr> {
        if ex > self.max_ex {
            ex = self.max_ex;
        }
        if ex < self.min_ex {
            ex = self.min_ex - 1;
        }
        self.area = 0;
        self.cover = 0;
        self.ex = ex - self.min_ex;
        self.ey = ey - self.min_ey;
        self.last_ey = subpixels(ey);
        self.invalid = false;
        self.set_cell(ex, ey)
    }

    // ----- edge rendering ---------------------------------------------

    /// Distribute one edge's coverage across the cells of scanline `ey`,
    /// between subpixel positions `(x1, y1)` and `(x2, y2)` (`y` values are
    /// fractions within the scanline).
    fn render_scanline(
        &mut self,
        ey: i32,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<(), GryphErr> {
        let mut dx = x2 - x1;
        let ex1 = trunc(x1);
        let ex2 = trunc(x2);
        let fx1 = x1 - subpixels(ex1);
        let fx2 = x2 - subpixels(ex2);

        // Horizontal move within the scanline: just track the cell.
        if y1 == y2 {
            return self.set_cell(ex2, ey);
        }

        // Single cell.
        if ex1 == ex2 {
            let delta = y2 - y1;
            self.area += (fx1 + fx2) * delta;
            self.cover += delta;
            return Ok(());
        }

        // A run of adjacent cells.
        let mut p = (ONE_PIXEL - fx1) * (y2 - y1);
        let mut first = ONE_PIXEL;
        let mut incr = 1;
        if dx < 0 {
            p = fx1 * (y2 - y1);
            first = 0;
            incr = -1;
            dx = -dx;
        }

        let (mut delta, mut rem) = div_mod(p, dx);
        self.area += (fx1 + first) * delta;
        self.cover += delta;

        let mut ex1 = ex1 + incr;
        self.set_cell(ex1, ey)?;
        let mut y1 = y1 + delta;

        if ex1 != ex2 {
            let p = ONE_PIXEL * (y2 - y1 + delta);
            let (lift, lift_rem) = div_mod(p, dx);
            rem -= dx;

            while ex1 != ex2 {
                delta = lift;
                rem += lift_rem;
                if rem >= 0 {
                    rem -= dx;
                    delta += 1;
                }
                self.area += ONE_PIXEL * delta;
                self.cover += delta;
                y1 += delta;
                ex1 += incr;
                self.set_cell(ex1, ey)?;
            }
        }

        let delta = y2 - y1;
        self.area += (fx2 + ONE_PIXEL - first) * delta;
        self.cover += delta;
        Ok(())
    }

    /// Render the edge from the current position to `(to_x, to_y)` (24.8).
    fn render_line(&mut self, to_x: i32, to_y: i32) -> Result<(), GryphErr> {
        let ey1 = trunc(self.last_ey);
        let ey2 = trunc(to_y);
        let fy1 = self.y - self.last_ey;
        let fy2 = to_y - subpixels(ey2);

        let dx = to_x - self.x;
        let mut dy = to_y - self.y;

        // Vertical clipping against the band.
        let (min, max) = if ey1 < ey2 { (ey1, ey2) } else { (ey2, ey1) };
        if min >= self.max_ey || max < self.min_ey {
            self.x = to_x;
            self.y = to_y;
            self.last_ey = subpixels(ey2);
            return Ok(());
        }

        if ey1 == ey2 {
            // Single scanline.
            self.render_scanline(ey1, self.x, fy1, to_x, fy2)?;
        } else if dx == 0 {
            // Vertical edge: one cell column, no scanline arithmetic.
            let ex = trunc(self.x);
            let two_fx = (self.x - subpixels(ex)) << 1;

            let (first, incr) = if dy < 0 { (0, -1) } else { (ONE_PIXEL, 1) };
            let mut delta = first - fy1;
            self.area += two_fx * delta;
            self.cover += delta;
            let mut ey1 = ey1 + incr;
            self.set_cell(ex, ey1)?;

            delta = first + first - ONE_PIXEL;
            let area = two_fx * delta;
            while ey1 != ey2 {
                self.area += area;
                self.cover += delta;
                ey1 += incr;
                self.set_cell(ex, ey1)?;
            }

            delta = fy2 - ONE_PIXEL + first;
            self.area += two_fx * delta;
            self.cover += delta;
        } else {
            // General case: split the edge per scanline with an integer
            // division carried Bresenham-style.
            let mut p = (ONE_PIXEL - fy1) * dx;
            let mut first = ONE_PIXEL;
            let mut incr = 1;
            if dy < 0 {
                p = fy1 * dx;
                first = 0;
                incr = -1;
                dy = -dy;
            }

            let (delta, mut rem) = div_mod(p, dy);
            let mut x = self.x + delta;
            self.render_scanline(ey1, self.x, fy1, x, first)?;

            let mut ey1 = ey1 + incr;
            self.set_cell(trunc(x), ey1)?;

            if ey1 != ey2 {
                let p = ONE_PIXEL * dx;
                let (lift, lift_rem) = div_mod(p, dy);
                rem -= dy;

                while ey1 != ey2 {
                    let mut delta = lift;
                    rem += lift_rem;
                    if rem >= 0 {
                        rem -= dy;
                        delta += 1;
                    }
                    let x2 = x + delta;
                    self.render_scanline(ey1, x, ONE_PIXEL - first, x2, first)?;
                    x = x2;
                    ey1 += incr;
                    self.set_cell(trunc(x), ey1)?;
                }
            }

            self.render_scanline(ey1, x, ONE_PIXEL - first, to_x, fy2)?;
        }

        self.x = to_x;
        self.y = to_y;
        self.last_ey = subpixels(ey2);
        Ok(())
    }

    // ----- curve flattening -------------------------------------------

    fn split_conic(&mut self, base: usize) {
        let arc = &mut self.bez_stack;
        arc[base + 4].x = arc[base + 2].x;
        let b = arc[base + 1].x;
        let a = (arc[base + 2].x + b) / 2;
        arc[base + 3].x = a;
        let b = (arc[base].x + b) / 2;
        arc[base + 1].x = b;
        arc[base + 2].x = (a + b) / 2;

        arc[base + 4].y = arc[base + 2].y;
        let b = arc[base + 1].y;
        let a = (arc[base + 2].y + b) / 2;
        arc[base + 3].y = a;
        let b = (arc[base].y + b) / 2;
        arc[base + 1].y = b;
        arc[base + 2].y = (a + b) / 2;
    }

    fn split_cubic(&mut self, base: usize) {
        let arc = &mut self.bez_stack;
        arc[base + 6].x = arc[base + 3].x;
        let c = arc[base + 1].x;
        let d = arc[base + 2].x;
        let a = (arc[base].x + c) / 2;
        let b = (arc[base + 3].x + d) / 2;
        arc[base + 1].x = a;
        arc[base + 5].x = b;
        let c = (c + d) / 2;
        let a = (a + c) / 2;
        let b = (b + c) / 2;
        arc[base + 2].x = a;
        arc[base + 4].x = b;
        arc[base + 3].x = (a + b) / 2;

        arc[base + 6].y = arc[base + 3].y;
        let c = arc[base + 1].y;
        let d = arc[base + 2].y;
        let a = (arc[base].y + c) / 2;
        let b = (arc[base + 3].y + d) / 2;
        arc[base + 1].y = a;
        arc[base + 5].y = b;
        let c = (c + d) / 2;
        let a = (a + c) / 2;
        let b = (b + c) / 2;
        arc[base + 2].y = a;
        arc[base + 4].y = b;
        arc[base + 3].y = (a + b) / 2;
    }

    fn conic_to(&mut self, control: Point, to: Point) -> Result<(), GryphErr> {
        // Flatness estimate in 26.6 units.
        let dx = (downscale(self.x) + to.x - (control.x << 1)).abs();
        let dy = (downscale(self.y) + to.y - (control.y << 1)).abs();
        let mut d = dx.max(dy);

        let mut level = 1;
        d /= self.conic_level;
        while d > 0 {
            d >>= 2;
            level += 1;
        }

        if level <= 1 {
            let to_x = upscale(to.x);
            let to_y = upscale(to.y);
            let mid_x = (self.x + to_x + 2 * upscale(control.x)) / 4;
            let mid_y = (self.y + to_y + 2 * upscale(control.y)) / 4;
            self.render_line(mid_x, mid_y)?;
            return self.render_line(to_x, to_y);
        }

        self.bez_stack[0] = Point {
            x: upscale(to.x),
            y: upscale(to.y),
        };
        self.bez_stack[1] = Point {
            x: upscale(control.x),
            y: upscale(control.y),
        };
        self.bez_stack[2] = Point {
            x: self.x,
            y: self.y,
        };
        self.lev_stack[0] = level;
        let mut top: i32 = 0;
        let mut base: i32 = 0;

        loop {
            let level = self.lev_stack[top as usize];
            if level > 1 {
                let b = base as usize;
                // Skip subdivision when the arc misses the band entirely.
                let ys = [
                    self.bez_stack[b].y,
                    self.bez_stack[b + 1].y,
                    self.bez_stack[b + 2].y,
                ];
                let min = ys.iter().copied().min().unwrap();
                let max = ys.iter().copied().max().unwrap();
                if !(trunc(min) >= self.max_ey || trunc(max) < self.min_ey) {
                    self.split_conic(b);
                    base += 2;
                    top += 1;
                    self.lev_stack[top as usize] = level - 1;
                    self.lev_stack[top as usize - 1] = level - 1;
                    continue;
                }
            }

            let b = base as usize;
            let to_x = self.bez_stack[b].x;
            let to_y = self.bez_stack[b].y;
            let mid_x = (self.x + to_x + 2 * self.bez_stack[b + 1].x) / 4;
            let mid_y = (self.y + to_y + 2 * self.bez_stack[b + 1].y) / 4;
            self.render_line(mid_x, mid_y)?;
            self.render_line(to_x, to_y)?;
            top -= 1;
            base -= 2;
            if top < 0 {
                return Ok(());
            }
        }
    }

    fn cubic_to(&mut self, control1: Point, control2: Point, to: Point) -> Result<(), GryphErr> {
        let dx1 = (downscale(self.x) + to.x - (control1.x << 1)).abs();
        let dy1 = (downscale(self.y) + to.y - (control1.y << 1)).abs();
        let mut da = dx1.max(dy1);

        let dx2 = (downscale(self.x) + to.x - 3 * (control1.x + control2.x)).abs();
        let dy2 = (downscale(self.y) + to.y - 3 * (control1.y + control2.y)).abs();
        let mut db = dx2.max(dy2);

        let mut level = 1;
        da /= self.cubic_level;
        db /= self.conic_level;
        while da > 0 || db > 0 {
            da >>= 2;
            db >>= 3;
            level += 1;
        }

        if level <= 1 {
            let to_x = upscale(to.x);
            let to_y = upscale(to.y);
            let mid_x = (self.x + to_x + 3 * upscale(control1.x + control2.x)) / 8;
            let mid_y = (self.y + to_y + 3 * upscale(control1.y + control2.y)) / 8;
            self.render_line(mid_x, mid_y)?;
            return self.render_line(to_x, to_y);
        }

        self.bez_stack[0] = Point {
            x: upscale(to.x),
            y: upscale(to.y),
        };
        self.bez_stack[1] = Point {
            x: upscale(control2.x),
            y: upscale(control2.y),
        };
        self.bez_stack[2] = Point {
            x: upscale(control1.x),
            y: upscale(control1.y),
        };
        self.bez_stack[3] = Point {
            x: self.x,
            y: self.y,
        };
        self.lev_stack[0] = level;
        let mut top: i32 = 0;
        let mut base: i32 = 0;

        loop {
            let level = self.lev_stack[top as usize];
            if level > 1 {
                let b = base as usize;
                let ys = [
                    self.bez_stack[b].y,
                    self.bez_stack[b + 1].y,
                    self.bez_stack[b + 2].y,
                    self.bez_stack[b + 3].y,
                ];
                let min = ys.iter().copied().min().unwrap();
                let max = ys.iter().copied().max().unwrap();
                if !(trunc(min) >= self.max_ey || trunc(max) < self.min_ey) {
                    self.split_cubic(b);
                    base += 3;
                    top += 1;
                    self.lev_stack[top as usize] = level - 1;
                    self.lev_stack[top as usize - 1] = level - 1;
                    continue;
                }
            }

            let b = base as usize;
            let to_x = self.bez_stack[b].x;
            let to_y = self.bez_stack[b].y;
            let mid_x = (self.x + to_x + 3 * (self.bez_stack[b + 1].x + self.bez_stack[b + 2].x)) / 8;
            let mid_y = (self.y + to_y + 3 * (self.bez_stack[b + 1].y + self.bez_stack[b + 2].y)) / 8;
            self.render_line(mid_x, mid_y)?;
            self.render_line(to_x, to_y)?;
            top -= 1;
            base -= 3;
            if top < 0 {
                return Ok(());
            }
        }
    }

    // ----- decomposition ----------------------------------------------

    fn move_to(&mut self, to: Point) -> Result<(), GryphErr> {
        self.record_cell()?;
        let x = upscale(to.x);
        let y = upscale(to.y);
        self.start_cell(trunc(x), trunc(y))?;
        self.x = x;
        self.y = y;
        Ok(())
    }

    fn line_to(&mut self, to: Point) -> Result<(), GryphErr> {
        self.render_line(upscale(to.x), upscale(to.y))
    }

    /// Walk the outline contour by contour, emitting lines and flattened
    /// arcs. Control-point rules follow the usual TrueType conventions:
    /// a contour may open on a conic control point (the start is then
    /// borrowed from the last point or synthesized at their midpoint), two
    /// consecutive conic controls imply an on-point at their midpoint, and
    /// cubic controls must come in pairs.
    fn decompose(&mut self) -> Result<(), GryphErr> {
        let outline = self.outline;
        let mut first = 0usize;

        for n in 0..outline.n_contours() {
            let last_i16 = outline.contours[n];
            bail_if!(last_i16 < 0, InvalidOutline);
            let last = last_i16 as usize;
            bail_if!(last < first || last >= outline.n_points(), InvalidOutline);

            let mut limit = last;
            let mut v_start = outline.points[first];
            let v_last = outline.points[last];

            let mut i = first as isize;
            let tag = curve_tag(outline.tags[first]);
            bail_if!(tag == TAG_CUBIC, InvalidOutline);
            if tag == TAG_CONIC {
                if curve_tag(outline.tags[last]) == TAG_ON {
                    // Start from the on-curve end point instead.
                    v_start = v_last;
                    limit -= 1;
                } else {
                    // Both ends are conic controls: open at their midpoint.
                    v_start = midpoint(v_start, v_last);
                }
                i -= 1;
            }

            self.move_to(v_start)?;
            let mut closed = false;

            while i < limit as isize {
                i += 1;
                let idx = i as usize;
                match curve_tag(outline.tags[idx]) {
                    TAG_ON => {
                        self.line_to(outline.points[idx])?;
                    }
                    TAG_CONIC => {
                        let mut control = outline.points[idx];
                        loop {
                            if i >= limit as isize {
                                self.conic_to(control, v_start)?;
                                closed = true;
                                break;
                            }
                            i += 1;
                            let idx = i as usize;
                            let point = outline.points[idx];
                            let tag = curve_tag(outline.tags[idx]);
                            if tag == TAG_ON {
                                self.conic_to(control, point)?;
                                break;
                            }
                            bail_if!(tag != TAG_CONIC, InvalidOutline);
                            let implied = midpoint(control, point);
                            self.conic_to(control, implied)?;
                            control = point;
                        }
                        if closed {
                            break;
                        }
                    }
                    _ => {
                        // Cubic controls come in pairs.
                        bail_if!(
                            idx + 1 > limit || curve_tag(outline.tags[idx + 1]) != TAG_CUBIC,
                            InvalidOutline
                        );
                        let c1 = outline.points[idx];
                        let c2 = outline.points[idx + 1];
                        i += 2;
                        if i as usize <= limit {
                            self.cubic_to(c1, c2, outline.points[i as usize])?;
                        } else {
                            self.cubic_to(c1, c2, v_start)?;
                            closed = true;
                            break;
                        }
                    }
                }
            }

            if !closed {
                self.line_to(v_start)?;
            }
            first = last + 1;
        }
        Ok(())
    }

    // ----- sweep -------------------------------------------------------

    fn flush_spans(&mut self) {
        let pitch = self.target.pitch as usize;
        let row = self.span_y as usize * pitch;
        for span in self.spans.iter() {
            if span.len <= 0 {
                continue;
            }
            let start = row + span.x as usize;
            let end = start + span.len as usize;
            if let Some(slice) = self.target.buffer.get_mut(start..end) {
                slice.fill(span.coverage);
            }
        }
        self.spans.clear();
    }

    fn hline(&mut self, x: i32, y: i32, area: i32, count: i32) {
        // Coverage in 0..=256, folded to 8 bits.
        let mut coverage = area >> (PIXEL_BITS * 2 + 1 - 8);
        if coverage < 0 {
            coverage = -coverage;
        }
        if coverage >= 256 {
            coverage = 255;
        }
        if coverage == 0 {
            return;
        }

        let x = x + self.min_ex;
        let y = y + self.min_ey;

        if let Some(last) = self.spans.last_mut() {
            if self.span_y == y && last.x + last.len == x && last.coverage == coverage as u8 {
                last.len += count;
                return;
            }
        }
        if self.span_y != y || self.spans.is_full() {
            if self.span_y != i32::MIN && !self.spans.is_empty() {
                self.flush_spans();
            }
            self.spans.clear();
            self.span_y = y;
        }
        self.spans.push(Span {
            x,
            len: count,
            coverage: coverage as u8,
        });
    }

    fn sweep(&mut self) {
        if self.cells.is_empty() {
            return;
        }
        self.spans.clear();
        self.span_y = i32::MIN;

        for row in 0..self.count_ey {
            let mut cover = 0i32;
            let mut x = 0i32;
            let mut cur = self.ycells[row as usize];
            while cur != CELL_NONE {
                let cell = self.cells[cur as usize];
                if cell.x > x && cover != 0 {
                    self.hline(x, row, cover * (ONE_PIXEL * 2), cell.x - x);
                }
                cover += cell.cover;
                let area = cover * (ONE_PIXEL * 2) - cell.area;
                if area != 0 && cell.x >= 0 {
                    self.hline(cell.x, row, area, 1);
                }
                x = cell.x + 1;
                cur = cell.next;
            }
            if cover != 0 {
                self.hline(x, row, cover * (ONE_PIXEL * 2), self.count_ex - x);
            }
        }

        if self.span_y != i32::MIN && !self.spans.is_empty() {
            self.flush_spans();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i32, y0: i32, side: i32) -> Outline {
        // 26.6 coordinates, axis-aligned, wound one way.
        Outline {
            contours: vec![3],
            points: vec![
                Point { x: x0, y: y0 },
                Point { x: x0 + side, y: y0 },
                Point {
                    x: x0 + side,
                    y: y0 + side,
                },
                Point { x: x0, y: y0 + side },
            ],
            tags: vec![TAG_ON; 4],
        }
    }

    fn render_into(width: i16, height: i16, outline: &Outline) -> Vec<u8> {
        let mut raster = Raster::new(0);
        let mut bitmap = Bitmap::new(width, height, 8);
        raster.render(&mut bitmap, outline).unwrap();
        bitmap.buffer
    }

    #[test]
    fn unit_square_fills_one_pixel() {
        let pixels = render_into(1, 1, &square(0, 0, 64));
        assert_eq!(pixels, vec![255]);
    }

    #[test]
    fn half_shifted_square_splits_coverage() {
        // Square moved half a pixel right into a 2x1 target.
        let pixels = render_into(2, 1, &square(32, 0, 64));
        let total = pixels[0] as i32 + pixels[1] as i32;
        assert!((pixels[0] as i32 - 128).abs() <= 2, "left {}", pixels[0]);
        assert!((pixels[1] as i32 - 128).abs() <= 2, "right {}", pixels[1]);
        assert!((total - 256).abs() <= 4);
    }

    #[test]
    fn rendering_is_idempotent() {
        let outline = Outline {
            contours: vec![3],
            points: vec![
                Point { x: 10, y: 5 },
                Point { x: 500, y: 40 },
                Point { x: 420, y: 480 },
                Point { x: 30, y: 380 },
            ],
            tags: vec![TAG_ON; 4],
        };
        let a = render_into(8, 8, &outline);
        let b = render_into(8, 8, &outline);
        assert_eq!(a, b);
        assert!(a.iter().any(|&p| p > 0));
    }

    #[test]
    fn coverage_stays_in_range_for_conics() {
        let outline = Outline {
            contours: vec![3],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 8 << 6, y: 0 },
                Point { x: 8 << 6, y: 8 << 6 },
                Point { x: 0, y: 8 << 6 },
            ],
            tags: vec![TAG_ON, TAG_CONIC, TAG_ON, TAG_CONIC],
        };
        let pixels = render_into(8, 8, &outline);
        assert!(pixels.iter().any(|&p| p == 255));
    }

    #[test]
    fn tiny_pool_still_renders() {
        // A 256-byte pool leaves room for a couple of scanlines at a time.
        let mut raster = Raster::new(256);
        let mut bitmap = Bitmap::new(8, 8, 8);
        raster.render(&mut bitmap, &square(0, 0, 8 << 6)).unwrap();
        assert!(bitmap.buffer.iter().filter(|&&p| p == 255).count() >= 36);
    }

    #[test]
    fn degenerate_outlines_are_rejected() {
        let mut raster = Raster::new(0);
        let mut bitmap = Bitmap::new(4, 4, 8);

        let empty = Outline::default();
        assert!(matches!(
            raster.render(&mut bitmap, &empty),
            Err(GryphErr::InvalidOutline)
        ));

        let mut mismatched = square(0, 0, 64);
        mismatched.contours[0] = 2;
        assert!(matches!(
            raster.render(&mut bitmap, &mismatched),
            Err(GryphErr::InvalidOutline)
        ));

        let mut cubic_start = square(0, 0, 64);
        cubic_start.tags[0] = TAG_CUBIC;
        assert!(matches!(
            raster.render(&mut bitmap, &cubic_start),
            Err(GryphErr::InvalidOutline)
        ));
    }

    #[test]
    fn opposite_winding_cuts_a_hole() {
        // 8x8 outer square, 4x4 inner square wound the other way.
        let outline = Outline {
            contours: vec![3, 7],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 8 << 6, y: 0 },
                Point { x: 8 << 6, y: 8 << 6 },
                Point { x: 0, y: 8 << 6 },
                Point { x: 2 << 6, y: 2 << 6 },
                Point { x: 2 << 6, y: 6 << 6 },
                Point { x: 6 << 6, y: 6 << 6 },
                Point { x: 6 << 6, y: 2 << 6 },
            ],
            tags: vec![TAG_ON; 8],
        };
        let pixels = render_into(8, 8, &outline);
        // Rim stays solid, interior of the inner contour empties out.
        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[7], 255);
        assert_eq!(pixels[4 * 8 + 4], 0);
        assert_eq!(pixels[3 * 8 + 3], 0);
        assert_eq!(pixels[4 * 8 + 1], 255);
    }

    #[test]
    fn diagonal_edge_splits_pixels_evenly() {
        // Right triangle covering the lower-left half of a 4x4 box.
        let outline = Outline {
            contours: vec![2],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 4 << 6, y: 4 << 6 },
                Point { x: 0, y: 4 << 6 },
            ],
            tags: vec![TAG_ON; 3],
        };
        let pixels = render_into(4, 4, &outline);
        // Pixels crossed by the diagonal sit near half coverage.
        for i in 0..4 {
            let p = pixels[i * 4 + i] as i32;
            assert!((p - 128).abs() <= 2, "diagonal pixel {i} = {p}");
        }
        // One side of the diagonal is full, the other empty.
        assert_eq!(pixels[3 * 4], 255);
        assert_eq!(pixels[3], 0);
        // Total coverage equals half the box, within rounding.
        let total: i32 = pixels.iter().map(|&p| p as i32).sum();
        assert!((total - 8 * 255).abs() <= 16, "total {total}");
    }

    #[test]
    fn cubic_arcs_render_within_their_box() {
        // A lobe built from one cubic pair and a closing line.
        let outline = Outline {
            contours: vec![3],
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 8 << 6, y: 0 },
                Point { x: 8 << 6, y: 8 << 6 },
                Point { x: 0, y: 8 << 6 },
            ],
            tags: vec![TAG_ON, TAG_CUBIC, TAG_CUBIC, TAG_ON],
        };
        let pixels = render_into(8, 8, &outline);
        // The lobe spans the left edge out to the curve's bulge at x = 6,
        // so the left column is solid and the rightmost columns stay dark.
        assert!(pixels.iter().any(|&p| p == 255));
        let left: i32 = (0..8).map(|y| pixels[y * 8] as i32).sum();
        let right: i32 = (0..8).map(|y| pixels[y * 8 + 7] as i32).sum();
        assert!(left > right, "left {left} right {right}");
        assert!(pixels[7] == 0 && pixels[7 * 8 + 7] == 0);
    }

    #[test]
    fn dense_outlines_degrade_gracefully() {
        // A zig-zag with more edge crossings per scanline than the pool
        // can hold: the converter must either finish or report overflow,
        // never scribble out of bounds.
        let mut points = Vec::new();
        let mut x = 0;
        for i in 0..120 {
            points.push(Point {
                x,
                y: if i % 2 == 0 { 0 } else { 120 << 6 },
            });
            x += 1 << 6;
        }
        let n = points.len();
        let outline = Outline {
            contours: vec![n as i16 - 1],
            points,
            tags: vec![TAG_ON; n],
        };
        let mut raster = Raster::new(2048);
        let mut bitmap = Bitmap::new(120, 120, 8);
        // Success or pool overflow are both acceptable; what matters is
        // that the converter stays in bounds and adapts.
        let _ = raster.render(&mut bitmap, &outline);
        assert!(raster.band_size >= 1);
    }

    #[test]
    fn outline_outside_the_clip_box_is_a_no_op() {
        let mut raster = Raster::new(0);
        let mut bitmap = Bitmap::new(4, 4, 8);
        raster
            .render(&mut bitmap, &square(16 << 6, 16 << 6, 64))
            .unwrap();
        assert!(bitmap.buffer.iter().all(|&p| p == 0));
    }
}
