//! Block size heuristic: the largest line-aligned square tile that fits half
//! the L1 and doesn't hog more than half of each set's ways.
use crate::cache::CacheGeometry;

/// Block side length (in elements) for a transpose over elements of
/// `element_size_bytes`. Pure; the matrix dimension does not enter into it.
///
/// The result is always a multiple of, and at least, the number of elements
/// per cache line (itself floored at 1 element).
pub fn compute_block_size(geometry: CacheGeometry, element_size_bytes: usize) -> usize {
    let elem = element_size_bytes.max(1);
    let l1 = geometry.l1_size_bytes();
    let line = geometry.line_size_bytes();
    let ways = geometry.associativity();

    // Source and destination tiles are live at once, each gets half
    let max_block_bytes = l1 / 2;
    let max_elements_per_block = max_block_bytes / elem;
    let max_block_side = max_elements_per_block.isqrt();

    let elements_per_line = (line / elem).max(1);
    let mut side = max_block_side - max_block_side % elements_per_line;

    let num_sets = (l1 / line) / ways;
    let line_budget = num_sets * (ways / 2);
    let lines_per_block = |side: usize| side * side * elem / line;

    while side > elements_per_line && lines_per_block(side) > line_budget {
        side -= elements_per_line;
    }

    side.max(elements_per_line)
}

/// [`compute_block_size`] for element type `T`
pub fn block_size_for<T>(geometry: CacheGeometry) -> usize {
    compute_block_size(geometry, std::mem::size_of::<T>())
}
