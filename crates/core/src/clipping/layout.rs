//! Packing of clipping contexts into mask-buffer channels.
//!
//! Each mask buffer has four color channels. In-use contexts are spread
//! over `buffers x 4` channels as evenly as possible, and the contexts that
//! share a channel split it into a square grid of cells (1, 4, 9, 16, ...).

use serde::Serialize;

use crate::rect::Rect;

/// Channels per RGBA mask buffer.
pub const CHANNELS_PER_BUFFER: usize = 4;

/// Contexts a single buffer holds at nominal resolution.
pub const SINGLE_BUFFER_CAPACITY: usize = 36;

/// Contexts each buffer holds at nominal resolution when several are pooled.
pub const PER_BUFFER_CAPACITY: usize = 32;

/// Where one context's mask lives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutSlot {
    pub buffer: usize,
    /// 0 = R, 1 = G, 2 = B, 3 = A.
    pub channel: usize,
    /// Cell inside the buffer, in `[0, 1]²`.
    pub bounds: Rect,
}

/// Nominal number of contexts `buffer_count` buffers hold.
pub fn nominal_capacity(buffer_count: usize) -> usize {
    if buffer_count <= 1 {
        SINGLE_BUFFER_CAPACITY
    } else {
        PER_BUFFER_CAPACITY * buffer_count
    }
}

/// Assigns a slot to each of `count` contexts, in context order.
///
/// The result always has exactly `count` entries. Past the nominal capacity
/// the grids keep growing, so cells get smaller but never overlap.
pub fn layout_contexts(count: usize, buffer_count: usize) -> Vec<LayoutSlot> {
    let buffer_count = buffer_count.max(1);
    if count > nominal_capacity(buffer_count) {
        tracing::warn!(
            contexts = count,
            buffers = buffer_count,
            capacity = nominal_capacity(buffer_count),
            "too many clipping contexts for the mask buffers, masks will lose resolution"
        );
    }

    let per_buffer = count.div_ceil(buffer_count);
    let reduce = count % buffer_count;
    let div = per_buffer / CHANNELS_PER_BUFFER;
    let rem = per_buffer % CHANNELS_PER_BUFFER;
    // The channel that gives up one cell in the buffers past `reduce`.
    let shrink_channel = if div == 0 { rem.checked_sub(1) } else { Some(rem) };

    let mut slots = Vec::with_capacity(count);
    for buffer in 0..buffer_count {
        for channel in 0..CHANNELS_PER_BUFFER {
            let mut cells = div + usize::from(channel < rem);
            if reduce > 0 && buffer >= reduce && shrink_channel == Some(channel) {
                cells = cells.saturating_sub(1);
            }
            let cells = cells.min(count - slots.len());
            push_grid(&mut slots, buffer, channel, cells);
        }
    }
    slots
}

fn push_grid(slots: &mut Vec<LayoutSlot>, buffer: usize, channel: usize, cells: usize) {
    let side = grid_side(cells);
    for i in 0..cells {
        let col = i % side;
        let row = i / side;
        let side_f = side as f32;
        let bounds = Rect::from_min_max(
            col as f32 / side_f,
            row as f32 / side_f,
            (col + 1) as f32 / side_f,
            (row + 1) as f32 / side_f,
        );
        slots.push(LayoutSlot {
            buffer,
            channel,
            bounds,
        });
    }
}

/// Smallest `s` with `s * s >= cells`.
fn grid_side(cells: usize) -> usize {
    let mut side = 1;
    while side * side < cells {
        side += 1;
    }
    side
}
