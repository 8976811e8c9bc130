//! PPM context-tree model with Krichevsky-Trofimov style escape
//! blending.
//!
//! Contexts live in an arena (`Vec<Node>`); a node's vine link is the
//! index of the node for the same context with one fewer symbol of
//! history, so every vine chain bottoms out at the root. Counts follow
//! the update-exclusion rule, and a symbol unseen under the current
//! context escapes down the vine chain until the base distribution
//! takes over with the already-tried symbols excluded.

use log::trace;
use rand::Rng;

use super::{ByteSet, Codable, ExclusionCodable};
use crate::coder::{Decoder, Encoder};
use crate::error::Result;

const ROOT: usize = 0;

/// One context: the statistics of symbols seen after a particular
/// suffix of the input.
#[derive(Clone, Debug)]
struct Node {
    /// Symbol this node is reached by; meaningless for the root.
    sym: u8,
    /// Same context shortened by its oldest symbol; `None` on the root.
    vine: Option<usize>,
    /// Child node indices, in insertion order.
    children: Vec<usize>,
    /// Update-exclusion count of `sym` under the parent context.
    count: u64,
    /// Context length; the root sits at depth 0.
    depth: u32,
}

/// Exact rational smoothing: `alpha = a1/a2` concentration for the
/// escape, `beta = b1/b2` per-symbol discount, with an optional
/// discount override for an exception symbol set.
#[derive(Clone, Copy, Debug)]
struct Smoothing {
    a1: u64,
    a2: u64,
    b1: u64,
    b2: u64,
    xb1: u64,
    xb2: u64,
    exceptions: ByteSet,
}

/// Region layout of one context node under an exclusion set: the
/// enumerated symbols with their widths, the spent width sum, and the
/// grand total. The escape region is the remainder `[spent, total)`.
#[derive(Clone, Debug)]
struct Layout {
    syms: Vec<u8>,
    widths: Vec<u64>,
    spent: u64,
    total: u64,
}

impl Layout {
    fn region_of(&self, sym: u8) -> Option<(u64, u64)> {
        let mut lo = 0;
        for (i, &s) in self.syms.iter().enumerate() {
            if s == sym {
                return Some((lo, lo + self.widths[i]));
            }
            lo += self.widths[i];
        }
        None
    }

    fn bucket_of(&self, t: u64) -> Option<(u8, u64, u64)> {
        let mut lo = 0;
        for (i, &w) in self.widths.iter().enumerate() {
            if t < lo + w {
                return Some((self.syms[i], lo, lo + w));
            }
            lo += w;
        }
        None
    }
}

/// Bounded-order PPM predictor over byte symbols.
///
/// `learn` grows the tree and advances the current context; `encode`,
/// `decode` and `sample` read it. The base distribution `B` catches
/// whatever escapes past the root. Cloning yields an independent model
/// with identical statistics (arena indices keep the vine topology
/// intact for free).
#[derive(Clone)]
pub struct Ppm<B> {
    nodes: Vec<Node>,
    ctx: usize,
    max_depth: u32,
    smoothing: Smoothing,
    base: B,
    /// Memoized empty-exclusion layout of the current context,
    /// invalidated by every `learn`/`reset`.
    cache: Option<(usize, Layout)>,
}

impl<B> Ppm<B> {
    /// Creates a model of order `max_depth` with smoothing given as
    /// doubles; `alpha = 0.0, beta = 0.5` is the PPMD estimator.
    pub fn new(max_depth: u32, alpha: f64, beta: f64, base: B) -> Self {
        Self::with_rationals(max_depth, rational_from(alpha), rational_from(beta), base)
    }

    /// Creates a model with exact rational smoothing `alpha = a1/a2`,
    /// `beta = b1/b2`.
    ///
    /// # Panics
    ///
    /// On a zero denominator, a discount of one or more, or parameters
    /// that would leave unseen symbols with no escape mass at all.
    pub fn with_rationals(max_depth: u32, alpha: (u64, u64), beta: (u64, u64), base: B) -> Self {
        let (a1, a2) = alpha;
        let (b1, b2) = beta;
        assert!(a2 > 0 && b2 > 0, "smoothing denominators must be positive");
        assert!(b1 < b2, "discount must stay below one");
        assert!(a1 > 0 || b1 > 0, "escape would have zero mass");

        let root = Node { sym: 0, vine: None, children: Vec::new(), count: 0, depth: 0 };
        Self {
            nodes: vec![root],
            ctx: ROOT,
            max_depth,
            smoothing: Smoothing { a1, a2, b1, b2, xb1: 0, xb2: 1, exceptions: ByteSet::new() },
            base,
            cache: None,
        }
    }

    /// Gives the symbols in `exceptions` their own discount
    /// `xb1 / xb2`. Fixed for the life of the tree; configure before
    /// the first `learn`.
    pub fn with_exceptions(mut self, exceptions: ByteSet, discount: (u64, u64)) -> Self {
        let (xb1, xb2) = discount;
        assert!(xb2 > 0, "smoothing denominators must be positive");
        assert!(xb1 < xb2, "discount must stay below one");
        self.smoothing.xb1 = xb1;
        self.smoothing.xb2 = xb2;
        self.smoothing.exceptions = exceptions;
        self
    }

    /// Forgets everything: prunes the tree back to a bare root.
    pub fn reset(&mut self) {
        self.nodes.truncate(1);
        self.nodes[ROOT].children.clear();
        self.ctx = ROOT;
        self.cache = None;
    }

    /// Records `sym` under the current context and advances it.
    pub fn learn(&mut self, sym: u8) {
        let target = self.find_or_add(self.ctx, sym);

        // Update exclusion: the observing context always counts the
        // symbol; shorter contexts count it only while it was unseen.
        let mut idx = target;
        let mut fresh = self.nodes[idx].count == 0;
        self.nodes[idx].count += 1;
        while fresh {
            match self.nodes[idx].vine {
                Some(v) if v != ROOT => {
                    idx = v;
                    fresh = self.nodes[idx].count == 0;
                    if fresh {
                        self.nodes[idx].count += 1;
                    }
                }
                _ => break,
            }
        }

        // Grow the context while it stays under the order bound, else
        // retract one level through the vine.
        self.ctx = if self.nodes[target].depth < self.max_depth {
            target
        } else {
            self.nodes[target].vine.unwrap_or(ROOT)
        };
        self.cache = None;
    }

    fn find(&self, node: usize, sym: u8) -> Option<usize> {
        self.nodes[node]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].sym == sym)
    }

    /// Child lookup with lazy creation down the vine chain, so a new
    /// node's vine always lands on the next-shorter context's node for
    /// the same symbol.
    fn find_or_add(&mut self, node: usize, sym: u8) -> usize {
        let mut missing = Vec::new();
        let mut cur = node;
        let mut created = loop {
            if let Some(c) = self.find(cur, sym) {
                break c;
            }
            match self.nodes[cur].vine {
                Some(v) => {
                    missing.push(cur);
                    cur = v;
                }
                // cur is the root; its new child's vine is the root
                None => break self.add_child(cur, sym, ROOT),
            }
        };
        while let Some(parent) = missing.pop() {
            created = self.add_child(parent, sym, created);
        }
        created
    }

    fn add_child(&mut self, parent: usize, sym: u8, vine: usize) -> usize {
        let idx = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(Node { sym, vine: Some(vine), children: Vec::new(), count: 0, depth });
        self.nodes[parent].children.push(idx);
        idx
    }

    /// Builds the region layout of `node` with `excl` masked out.
    ///
    /// With `n` the enumerated count sum and `DEN = b2 * xb2`, a symbol
    /// of count `c` and discount `d1/d2` gets width
    /// `a2 * (c * DEN - d1 * (DEN / d2))` out of
    /// `total = DEN * (a2 * n + a1)`; the escape keeps the remainder,
    /// which is positive whenever anything was enumerated. The regions
    /// tile `[0, total)` with no gaps or overlaps.
    fn layout(&self, node: usize, excl: &ByteSet) -> Layout {
        let s = &self.smoothing;
        let den = s.b2 * s.xb2;
        let disc_plain = s.b1 * s.xb2;
        let disc_exc = s.xb1 * s.b2;

        let mut syms = Vec::new();
        let mut widths = Vec::new();
        let (mut n, mut spent) = (0u64, 0u64);
        for &c in &self.nodes[node].children {
            let child = &self.nodes[c];
            if excl.contains(child.sym) {
                continue;
            }
            let disc = if s.exceptions.contains(child.sym) { disc_exc } else { disc_plain };
            let width = s.a2 * (child.count * den - disc);
            syms.push(child.sym);
            widths.push(width);
            n += child.count;
            spent += width;
        }

        let total = den * (s.a2 * n + s.a1);
        debug_assert!(spent <= total);
        Layout { syms, widths, spent, total }
    }

    fn layout_cached(&mut self, node: usize, excl: &ByteSet) -> Layout {
        if !excl.is_empty() {
            return self.layout(node, excl);
        }
        if let Some((cached, lay)) = &self.cache {
            if *cached == node {
                return lay.clone();
            }
        }
        let lay = self.layout(node, excl);
        self.cache = Some((node, lay.clone()));
        lay
    }
}

impl<B: ExclusionCodable> Ppm<B> {
    /// Draws a symbol from the current context's distribution without
    /// touching any state; agrees with what `decode` would produce for
    /// the same targets.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u8 {
        let mut draw = |t: u64| rng.gen_range(0..t);
        self.sample_excluding(&ByteSet::new(), &mut draw)
    }
}

impl<B: ExclusionCodable> Codable for Ppm<B> {
    type Symbol = u8;

    fn encode(&mut self, sym: u8, enc: &mut impl Encoder) -> Result<()> {
        self.encode_excluding(sym, &ByteSet::new(), enc)
    }

    fn decode(&mut self, dec: &mut impl Decoder) -> Result<u8> {
        self.decode_excluding(&ByteSet::new(), dec)
    }
}

impl<B: ExclusionCodable> ExclusionCodable for Ppm<B> {
    fn encode_excluding(
        &mut self,
        sym: u8,
        omitted: &ByteSet,
        enc: &mut impl Encoder,
    ) -> Result<()> {
        let mut excl = *omitted;
        let mut cur = Some(self.ctx);
        while let Some(node) = cur {
            let lay = self.layout_cached(node, &excl);
            // a context with nothing to enumerate is a pure escape and
            // codes no bits at all
            if !lay.syms.is_empty() {
                if let Some((lo, hi)) = lay.region_of(sym) {
                    return enc.store_region(lo, hi, lay.total);
                }
                trace!("escape below depth {}", self.nodes[node].depth);
                enc.store_region(lay.spent, lay.total, lay.total)?;
                for &s in &lay.syms {
                    excl.insert(s);
                }
            }
            cur = self.nodes[node].vine;
        }
        self.base.encode_excluding(sym, &excl, enc)
    }

    fn decode_excluding(&mut self, omitted: &ByteSet, dec: &mut impl Decoder) -> Result<u8> {
        let mut excl = *omitted;
        let mut cur = Some(self.ctx);
        while let Some(node) = cur {
            let lay = self.layout_cached(node, &excl);
            if !lay.syms.is_empty() {
                let t = dec.target(lay.total);
                if let Some((sym, lo, hi)) = lay.bucket_of(t) {
                    dec.load_region(lo, hi, lay.total)?;
                    return Ok(sym);
                }
                dec.load_region(lay.spent, lay.total, lay.total)?;
                for &s in &lay.syms {
                    excl.insert(s);
                }
            }
            cur = self.nodes[node].vine;
        }
        self.base.decode_excluding(&excl, dec)
    }

    fn sample_excluding(&self, omitted: &ByteSet, draw: &mut impl FnMut(u64) -> u64) -> u8 {
        let mut excl = *omitted;
        let mut cur = Some(self.ctx);
        while let Some(node) = cur {
            let lay = self.layout(node, &excl);
            if !lay.syms.is_empty() {
                let t = draw(lay.total);
                if let Some((sym, _, _)) = lay.bucket_of(t) {
                    return sym;
                }
                for &s in &lay.syms {
                    excl.insert(s);
                }
            }
            cur = self.nodes[node].vine;
        }
        self.base.sample_excluding(&excl, draw)
    }
}

fn rational_from(x: f64) -> (u64, u64) {
    const DEN: u64 = 1 << 12;
    assert!(x.is_finite() && x >= 0.0, "smoothing parameters must be nonnegative");
    let num = (x * DEN as f64).round() as u64;
    let g = gcd(num, DEN);
    (num / g, DEN / g)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UniformBytes;

    fn ppmd(max_depth: u32) -> Ppm<UniformBytes> {
        Ppm::with_rationals(max_depth, (0, 1), (1, 2), UniformBytes::new())
    }

    fn learn_all(model: &mut Ppm<UniformBytes>, text: &[u8]) {
        for &b in text {
            model.learn(b);
        }
    }

    #[test]
    fn doubles_reduce_to_exact_rationals() {
        assert_eq!(rational_from(0.0), (0, 1));
        assert_eq!(rational_from(0.5), (1, 2));
        assert_eq!(rational_from(0.25), (1, 4));
        assert_eq!(rational_from(1.0), (1, 1));
    }

    #[test]
    fn vine_chains_reach_root() {
        let mut model = ppmd(3);
        learn_all(&mut model, b"abracadabra");

        for idx in 1..model.nodes.len() {
            let node = &model.nodes[idx];
            let vine = node.vine.expect("only the root lacks a vine");
            assert_eq!(model.nodes[vine].depth + 1, node.depth);
            if vine != ROOT {
                // the vine target is the same symbol one context shorter
                assert_eq!(model.nodes[vine].sym, node.sym);
            }

            // and every chain bottoms out at the root
            let mut steps = 0;
            let mut cur = idx;
            while let Some(v) = model.nodes[cur].vine {
                cur = v;
                steps += 1;
                assert!(steps <= model.nodes[idx].depth);
            }
            assert_eq!(cur, ROOT);
        }
    }

    #[test]
    fn counts_follow_update_exclusion() {
        let mut model = ppmd(2);
        learn_all(&mut model, b"abab");

        // arena order: root, "a", "b", "ab", "ba"
        assert_eq!(model.nodes.len(), 5);
        let a0 = model.find(ROOT, b'a').unwrap();
        let b0 = model.find(ROOT, b'b').unwrap();
        let b1 = model.find(a0, b'b').unwrap();
        let a1 = model.find(b0, b'a').unwrap();

        // the second 'a' and 'b' were observed under the depth-1
        // contexts, so the order-0 counts never grow past first sight
        assert_eq!(model.nodes[a0].count, 1);
        assert_eq!(model.nodes[b0].count, 1);
        assert_eq!(model.nodes[b1].count, 2);
        assert_eq!(model.nodes[a1].count, 1);

        // steady state sits one short of the order bound
        assert_eq!(model.ctx, b0);
        assert_eq!(model.nodes[model.ctx].depth, 1);
    }

    #[test]
    fn repeated_symbol_concentrates_in_deep_context() {
        let mut model = ppmd(2);
        learn_all(&mut model, b"aaaa");

        let a0 = model.find(ROOT, b'a').unwrap();
        let aa = model.find(a0, b'a').unwrap();
        assert_eq!(model.nodes[a0].count, 1);
        assert_eq!(model.nodes[aa].count, 3);
        assert_eq!(model.ctx, a0);
    }

    #[test]
    fn layouts_tile_exactly() {
        let mut model = ppmd(3);
        learn_all(&mut model, b"abracadabra");

        let mut with_r = ByteSet::new();
        with_r.insert(b'r');
        let mut with_arc = ByteSet::new();
        for s in [b'a', b'r', b'c'] {
            with_arc.insert(s);
        }

        for excl in [ByteSet::new(), with_r, with_arc] {
            for idx in 0..model.nodes.len() {
                let lay = model.layout(idx, &excl);
                // PPMD: width 2c - 1 per symbol, total 2n, escape k
                let mut n = 0;
                for (i, &sym) in lay.syms.iter().enumerate() {
                    assert!(!excl.contains(sym));
                    let child = model.find(idx, sym).unwrap();
                    let count = model.nodes[child].count;
                    assert_eq!(lay.widths[i], 2 * count - 1);
                    n += count;
                }
                assert_eq!(lay.total, 2 * n);
                assert_eq!(lay.spent, lay.widths.iter().sum::<u64>());
                let escape = lay.total - lay.spent;
                assert_eq!(escape, lay.syms.len() as u64);

                // the per-symbol regions and the escape cover [0, total)
                for t in 0..lay.total {
                    let in_bucket = lay.bucket_of(t).is_some();
                    assert_eq!(in_bucket, t < lay.spent);
                }
            }
        }
    }

    #[test]
    fn exception_discounts_reshape_widths() {
        let mut exceptions = ByteSet::new();
        exceptions.insert(b'a');
        let mut model = Ppm::with_rationals(2, (1, 2), (1, 2), UniformBytes::new())
            .with_exceptions(exceptions, (1, 4));
        learn_all(&mut model, b"ab");

        // DEN = b2 * xb2 = 8; 'a' discount 1/4 -> 2, 'b' discount 1/2 -> 4
        let lay = model.layout(ROOT, &ByteSet::new());
        assert_eq!(lay.syms, vec![b'a', b'b']);
        // widths a2 * (c * DEN - disc) with a2 = 2, c = 1
        assert_eq!(lay.widths, vec![2 * (8 - 2), 2 * (8 - 4)]);
        // total DEN * (a2 * n + a1) = 8 * (2 * 2 + 1)
        assert_eq!(lay.total, 40);
        assert!(lay.spent < lay.total);
    }

    #[test]
    fn sampling_follows_the_layout() {
        let mut model = ppmd(3);
        learn_all(&mut model, b"abracadabra");

        // the zero point always lands in the first enumerated region
        let first = model.layout(model.ctx, &ByteSet::new()).syms[0];
        let mut low = |_t: u64| 0;
        assert_eq!(model.sample_excluding(&ByteSet::new(), &mut low), first);

        // the top point escapes everywhere and falls through to the
        // highest base symbol
        let mut high = |t: u64| t - 1;
        assert_eq!(model.sample_excluding(&ByteSet::new(), &mut high), 255);
    }

    #[test]
    fn sampling_tracks_learned_statistics() {
        use rand::{rngs::StdRng, SeedableRng};

        let mut model = ppmd(2);
        learn_all(&mut model, &[b'a'; 100]);

        let mut rng = StdRng::seed_from_u64(7);
        let hits = (0..64).filter(|_| model.sample(&mut rng) == b'a').count();
        // nearly all mass sits on 'a'; the sliver left is the escape
        assert!(hits >= 56, "got {hits} of 64");
    }

    #[test]
    fn clones_stay_in_lockstep() {
        use crate::coder::ArithmeticEncoder;

        let mut model = ppmd(3);
        learn_all(&mut model, b"mississippi");
        let mut copy = model.clone();

        let mut enc_a = ArithmeticEncoder::new(Vec::new());
        let mut enc_b = ArithmeticEncoder::new(Vec::new());
        for &b in b"mississippi river" {
            model.encode(b, &mut enc_a).unwrap();
            model.learn(b);
            copy.encode(b, &mut enc_b).unwrap();
            copy.learn(b);
        }
        assert_eq!(enc_a.finish().unwrap(), enc_b.finish().unwrap());
    }

    #[test]
    fn reset_prunes_to_bare_root() {
        let mut model = ppmd(3);
        learn_all(&mut model, b"abracadabra");
        assert!(model.nodes.len() > 1);

        model.reset();
        assert_eq!(model.nodes.len(), 1);
        assert_eq!(model.ctx, ROOT);
        assert!(model.nodes[ROOT].children.is_empty());

        // the tree is usable again from scratch
        learn_all(&mut model, b"ab");
        assert_eq!(model.nodes.len(), 3);
    }

    #[test]
    #[should_panic(expected = "escape would have zero mass")]
    fn degenerate_smoothing_is_rejected() {
        let _ = Ppm::with_rationals(2, (0, 1), (0, 1), UniformBytes::new());
    }
}
