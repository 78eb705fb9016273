//! Exact linear-time solver for one-dimensional total variation denoising.
//!
//! The forward pass keeps a lower and an upper envelope chain. Each sample is
//! folded into whichever chain it is consistent with, violators are pooled,
//! and when a chain collapses onto its head it pays off the other chain's
//! leading segments, which fixes output values and produces breakpoints.
//! The last sample has no right neighbour and is resolved separately.
use crate::{
    Real,
    envelope::{Bound, EnvelopeChain},
};

pub(crate) struct Pass<'a> {
    input: &'a [Real],
    output: &'a mut [Real],
    lambda: Real,
    lower: &'a mut EnvelopeChain,
    upper: &'a mut EnvelopeChain,
    /// Every output index below this one holds its final value.
    committed: usize,
}

impl<'a> Pass<'a> {
    /// `input` must hold at least two samples, `output` the same number and
    /// `lambda` must be positive.
    pub(crate) fn new(
        input: &'a [Real],
        output: &'a mut [Real],
        lambda: Real,
        lower: &'a mut EnvelopeChain,
        upper: &'a mut EnvelopeChain,
    ) -> Self {
        lower.reset(0, input[0] + Bound::Lower.offset(lambda));
        upper.reset(0, input[0] + Bound::Upper.offset(lambda));
        Self {
            input,
            output,
            lambda,
            lower,
            upper,
            committed: 0,
        }
    }

    pub(crate) fn run(mut self) {
        let last = self.input.len() - 1;
        for position in 1..last {
            self.step(position);
        }
        self.resolve_last(last);
    }

    fn step(&mut self, position: usize) {
        let value = self.input[position];
        if value >= self.lower.current() {
            if value <= self.upper.current() {
                self.upper.absorb(position, value);
                self.settle(Bound::Upper, position);
            } else {
                self.upper.open(position, value);
            }
            self.lower.absorb(position, value);
            self.settle(Bound::Lower, position);
        } else {
            self.lower.open(position, value);
            self.upper.absorb(position, value);
            self.settle(Bound::Upper, position);
        }
    }

    /// Restores the isotonic invariant of the chain on `bound` after its tail
    /// changed. If the chain collapses onto its head, the opposite chain's
    /// leading segments are committed while the running mean still crosses
    /// their level.
    fn settle(&mut self, bound: Bound, position: usize) {
        let (active, other) = match bound {
            Bound::Lower => (&mut *self.lower, &mut *self.upper),
            Bound::Upper => (&mut *self.upper, &mut *self.lower),
        };
        active.pool_violators(position);
        if !active.is_single() {
            active.store_current();
            return;
        }

        while bound.crosses(active.current(), other.first()) && !other.is_single() {
            let next = other.next_start();
            active.release_prefix(other.first(), next - self.committed, position - next + 1);
            let level = other.retire_head();
            self.output[self.committed..next].fill(level);
            self.committed = next;
        }

        active.restart(self.committed);
        if self.committed == position {
            active.set_first(other.first() + 2.0 * bound.offset(self.lambda));
        } else {
            active.set_first(active.current());
        }
    }

    fn resolve_last(mut self, last: usize) {
        let value = self.input[last];
        let lambda = self.lambda;

        if value + lambda <= self.lower.current() {
            self.lower.commit(self.output, last);
            self.output[last] = value + lambda;
        } else if value - lambda >= self.upper.current() {
            self.upper.commit(self.output, last);
            self.output[last] = value - lambda;
        } else {
            self.lower.absorb(last, value + lambda);
            self.lower.pool_violators(last);
            let closing = if !self.lower.is_single() {
                &*self.lower
            } else if self.upper.first() >= self.lower.current() {
                self.output[self.committed..].fill(self.lower.current());
                return;
            } else {
                self.upper.absorb(last, value - lambda);
                self.upper.pool_violators(last);
                &*self.upper
            };
            let tail_start = closing.tail_start();
            closing.commit(self.output, tail_start);
            self.output[tail_start..].fill(closing.current());
        }
    }
}
