//! Envelope chains for the forward pass of the solver.
//!
//! A chain is a stack of segments covering `[head start, current index]`.
//! Segments below the head have already been written to the output and are
//! dead; the head segment's level is tracked separately from its stored mean
//! because the opposite chain may reset it to a value offset by `2λ`.
//!
//! A chain is `growing` while samples are folded into its tail, `merging`
//! while [EnvelopeChain::pool_violators] pops tail segments, and is finalised
//! when the last sample is resolved and its segments are committed.
use crate::Real;

/// Which side of the admissible band a chain tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Lower,
    Upper,
}

impl Bound {
    /// Whether `value` has reached `level` from the side this bound may not cross.
    /// For the lower chain running means must stay strictly below preceding
    /// segment levels, for the upper chain strictly above.
    pub(crate) fn crosses(self, value: Real, level: Real) -> bool {
        match self {
            Bound::Lower => value >= level,
            Bound::Upper => value <= level,
        }
    }

    /// Signed half-width of the band seen from this bound.
    pub(crate) fn offset(self, lambda: Real) -> Real {
        match self {
            Bound::Lower => -lambda,
            Bound::Upper => lambda,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Segment {
    pub(crate) start: usize,
    pub(crate) mean: Real,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvelopeChain {
    bound: Bound,
    segments: Vec<Segment>,
    head: usize,
    first: Real,
    current: Real,
}

impl EnvelopeChain {
    pub(crate) fn with_capacity(bound: Bound, capacity: usize) -> Self {
        Self {
            bound,
            segments: Vec::with_capacity(capacity),
            head: 0,
            first: Real::default(),
            current: Real::default(),
        }
    }

    /// Level of the head segment.
    pub(crate) fn first(&self) -> Real {
        self.first
    }

    /// Running mean of the tail segment.
    pub(crate) fn current(&self) -> Real {
        self.current
    }

    pub(crate) fn set_first(&mut self, level: Real) {
        self.first = level;
    }

    pub(crate) fn reserve(&mut self, capacity: usize) {
        self.segments
            .reserve(capacity.saturating_sub(self.segments.len()));
    }

    /// Discards every segment and opens a single one at `start`.
    pub(crate) fn reset(&mut self, start: usize, level: Real) {
        self.segments.clear();
        self.segments.push(Segment { start, mean: level });
        self.head = 0;
        self.first = level;
        self.current = level;
    }

    /// Collapses the chain to one segment starting at `start`, keeping the
    /// running mean. The head level is left for the caller to decide.
    pub(crate) fn restart(&mut self, start: usize) {
        let mean = self.current;
        self.segments.clear();
        self.segments.push(Segment { start, mean });
        self.head = 0;
    }

    pub(crate) fn is_single(&self) -> bool {
        self.head + 1 == self.segments.len()
    }

    fn tail(&self) -> usize {
        self.segments.len() - 1
    }

    pub(crate) fn tail_start(&self) -> usize {
        self.segments[self.tail()].start
    }

    fn level(&self, index: usize) -> Real {
        if index == self.head {
            self.first
        } else {
            self.segments[index].mean
        }
    }

    /// Online mean update of the tail with `value` observed at `position`.
    pub(crate) fn absorb(&mut self, position: usize, value: Real) {
        let count = (position - self.tail_start() + 1) as Real;
        self.current += (value - self.current) / count;
    }

    /// Takes `paid` leading samples at `level` out of the tail's running mean,
    /// leaving `remaining` samples in it.
    pub(crate) fn release_prefix(&mut self, level: Real, paid: usize, remaining: usize) {
        self.current += (self.current - level) * paid as Real / remaining as Real;
    }

    /// Pushes a new tail segment holding only `value`.
    pub(crate) fn open(&mut self, position: usize, value: Real) {
        self.segments.push(Segment {
            start: position,
            mean: value,
        });
        self.current = value;
    }

    /// Merges the tail into its predecessor for as long as the tail's running
    /// mean crosses the predecessor's level. `position` is the last index
    /// covered by the tail.
    pub(crate) fn pool_violators(&mut self, position: usize) {
        while !self.is_single() {
            let tail = self.tail();
            let previous = self.segments[tail - 1];
            let level = self.level(tail - 1);
            if !self.bound.crosses(self.current, level) {
                break;
            }
            let span = (self.segments[tail].start - previous.start) as Real;
            let count = (position - previous.start + 1) as Real;
            self.current += (level - self.current) * span / count;
            self.segments.pop();
        }
    }

    /// Records the running mean as the tail's level.
    pub(crate) fn store_current(&mut self) {
        let tail = self.tail();
        self.segments[tail].mean = self.current;
    }

    /// Start of the segment following the head. The chain must not be single.
    pub(crate) fn next_start(&self) -> usize {
        self.segments[self.head + 1].start
    }

    /// Drops the head segment, returning its level.
    pub(crate) fn retire_head(&mut self) -> Real {
        let level = self.first;
        self.head += 1;
        self.first = self.segments[self.head].mean;
        level
    }

    /// Writes every open segment's level into `output`, the tail ending at `end`.
    pub(crate) fn commit(&self, output: &mut [Real], end: usize) {
        for index in self.head..self.segments.len() {
            let from = self.segments[index].start;
            let to = self
                .segments
                .get(index + 1)
                .map_or(end, |segment| segment.start);
            output[from..to].fill(self.level(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn bounds_cross_in_opposite_directions() {
        assert!(Bound::Lower.crosses(1.0, 1.0));
        assert!(Bound::Lower.crosses(2.0, 1.0));
        assert!(!Bound::Lower.crosses(0.5, 1.0));
        assert!(Bound::Upper.crosses(1.0, 1.0));
        assert!(Bound::Upper.crosses(0.5, 1.0));
        assert!(!Bound::Upper.crosses(2.0, 1.0));
        assert_eq!(Bound::Lower.offset(3.0), -3.0);
        assert_eq!(Bound::Upper.offset(3.0), 3.0);
    }

    #[test]
    fn absorb_keeps_running_mean() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Lower, 4);
        chain.reset(0, 1.0);
        chain.absorb(1, 2.0);
        chain.absorb(2, 6.0);
        assert_approx_eq!(chain.current(), 3.0);
        assert!(chain.is_single());
    }

    #[test]
    fn lower_chain_pools_rising_tail() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Lower, 4);
        chain.reset(0, 10.0);
        chain.open(1, 4.0);
        chain.store_current();
        chain.open(2, 2.0);
        chain.store_current();
        assert!(!chain.is_single());

        // Tail [2..=3] rises to 5.0 which crosses the 4.0 level before it.
        chain.absorb(3, 8.0);
        assert_approx_eq!(chain.current(), 5.0);
        chain.pool_violators(3);
        assert_eq!(chain.tail_start(), 1);
        assert_approx_eq!(chain.current(), (4.0 + 5.0 * 2.0) / 3.0);
        assert!(!chain.is_single());
    }

    #[test]
    fn upper_chain_pools_into_head_level() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Upper, 4);
        chain.reset(0, 3.0);
        chain.open(1, 5.0);
        chain.absorb(2, 1.0);
        assert_approx_eq!(chain.current(), 3.0);
        chain.pool_violators(2);
        assert!(chain.is_single());
        assert_approx_eq!(chain.current(), 3.0);
    }

    #[test]
    fn pooling_stops_when_monotone() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Upper, 4);
        chain.reset(0, 1.0);
        chain.open(1, 2.0);
        chain.store_current();
        chain.open(2, 3.0);
        chain.pool_violators(2);
        assert_eq!(chain.tail_start(), 2);
        assert_approx_eq!(chain.current(), 3.0);
    }

    #[test]
    fn retire_and_commit() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Lower, 4);
        chain.reset(0, 7.0);
        chain.open(2, 1.0);
        chain.store_current();
        chain.open(4, 0.5);
        chain.store_current();

        let mut output = [0.0; 6];
        assert_eq!(chain.next_start(), 2);
        assert_eq!(chain.retire_head(), 7.0);
        assert_eq!(chain.first(), 1.0);
        chain.commit(&mut output, 5);
        assert_eq!(output, [0.0, 0.0, 1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn release_prefix_recovers_suffix_mean() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Upper, 2);
        chain.reset(0, 2.0);
        chain.absorb(1, 2.0);
        chain.absorb(2, 8.0);
        chain.absorb(3, 8.0);
        chain.release_prefix(2.0, 2, 2);
        assert_approx_eq!(chain.current(), 8.0);
    }

    #[test]
    fn restart_collapses_to_single_segment() {
        let mut chain = EnvelopeChain::with_capacity(Bound::Upper, 4);
        chain.reset(0, 1.0);
        chain.open(3, 4.0);
        chain.restart(2);
        assert!(chain.is_single());
        assert_eq!(chain.tail_start(), 2);
        assert_eq!(chain.current(), 4.0);
    }
}
