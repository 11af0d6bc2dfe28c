//! Bloom filter used as a certain-negative pre-check for blocked domains.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fixed seeds so that the same domain set always produces the same bit array.
const AHASH_SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Probabilistic domain set with no false negatives.
///
/// Sized from the expected element count `n` and the false-positive rate `p`:
/// `m = ceil(-n * ln(p) / ln(2)^2)` bits rounded up to a multiple of 64, and
/// `k = round(m / n * ln(2))` probes clamped to `[1, 10]`. The probe indexes
/// are synthesized by double hashing an aHash value with an FNV-1a value.
///
/// Writes are atomic per 64-bit word, so `add` may be called from several
/// build threads; `might_contain` never takes a lock.
pub struct BloomFilter {
    words: Vec<AtomicU64>,
    num_bits: u64,
    num_hashes: u32,
    len: AtomicUsize,
    hasher: ahash::RandomState,
}

impl BloomFilter {
    /// Create a filter for about `expected` elements at `fp_rate` false positives.
    pub fn new(expected: usize, fp_rate: f64) -> Self {
        let num_bits = Self::optimal_num_bits(expected, fp_rate);
        let num_hashes = Self::optimal_num_hashes(expected, num_bits);
        let words = (0..num_bits / 64).map(|_| AtomicU64::new(0)).collect();
        let (a, b, c, d) = AHASH_SEEDS;

        Self {
            words,
            num_bits,
            num_hashes,
            len: AtomicUsize::new(0),
            hasher: ahash::RandomState::with_seeds(a, b, c, d),
        }
    }

    /// Insert a domain. The input is expected to be normalized already.
    pub fn add(&self, domain: &str) {
        if domain.is_empty() {
            return;
        }
        let (h1, h2) = self.double_hash(domain);
        for i in 0..self.num_hashes as u64 {
            let idx = self.nth_index(h1, h2, i);
            self.words[(idx / 64) as usize].fetch_or(1u64 << (idx % 64), Ordering::Relaxed);
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// `false` means the domain was certainly never added.
    #[inline]
    pub fn might_contain(&self, domain: &str) -> bool {
        if domain.is_empty() {
            return false;
        }
        let (h1, h2) = self.double_hash(domain);
        (0..self.num_hashes as u64).all(|i| {
            let idx = self.nth_index(h1, h2, i);
            self.words[(idx / 64) as usize].load(Ordering::Relaxed) & (1u64 << (idx % 64)) != 0
        })
    }

    /// Size of the bit array.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of probes per element.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of `add` calls so far.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn double_hash(&self, domain: &str) -> (u64, u64) {
        let h1 = self.hasher.hash_one(domain);
        // An even stride would only ever visit half of the slots.
        let h2 = fnv1a(domain.as_bytes()) | 1;
        (h1, h2)
    }

    #[inline]
    fn nth_index(&self, h1: u64, h2: u64, i: u64) -> u64 {
        h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits
    }

    fn optimal_num_bits(expected: usize, fp_rate: f64) -> u64 {
        let n = expected.max(1) as f64;
        let p = if fp_rate > 0.0 && fp_rate < 1.0 {
            fp_rate
        } else {
            0.01
        };
        let ln2 = std::f64::consts::LN_2;
        let bits = (-n * p.ln() / (ln2 * ln2)).ceil() as u64;
        bits.max(64).div_ceil(64) * 64
    }

    fn optimal_num_hashes(expected: usize, num_bits: u64) -> u32 {
        let n = expected.max(1) as f64;
        let k = (num_bits as f64 / n * std::f64::consts::LN_2).round() as u32;
        k.clamp(1, 10)
    }
}

#[inline]
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let bloom = BloomFilter::new(1000, 0.001);
        let domains: Vec<String> = (0..1000).map(|i| format!("ads{}.example.com", i)).collect();
        for d in &domains {
            bloom.add(d);
        }
        for d in &domains {
            assert!(bloom.might_contain(d), "missing {}", d);
        }
        assert_eq!(bloom.len(), 1000);
    }

    #[test]
    fn test_false_positive_rate_is_bounded() {
        let bloom = BloomFilter::new(5000, 0.01);
        for i in 0..5000 {
            bloom.add(&format!("tracker{}.net", i));
        }
        let false_positives = (0..10_000)
            .filter(|i| bloom.might_contain(&format!("benign{}.org", i)))
            .count();
        // 1% target; allow generous slack for hash variance
        assert!(false_positives < 300, "too many false positives: {}", false_positives);
    }

    #[test]
    fn test_sizing() {
        let bloom = BloomFilter::new(1000, 0.01);
        assert_eq!(bloom.num_bits() % 64, 0);
        // -1000 * ln(0.01) / ln(2)^2 = 9585.06 -> 9600
        assert_eq!(bloom.num_bits(), 9600);
        // 9600 / 1000 * ln 2 = 6.65 -> 7
        assert_eq!(bloom.num_hashes(), 7);

        let tiny = BloomFilter::new(0, 0.5);
        assert_eq!(tiny.num_bits(), 64);
        assert!(tiny.num_hashes() >= 1);

        let dense = BloomFilter::new(10, 1e-12);
        assert_eq!(dense.num_hashes(), 10);
    }

    #[test]
    fn test_empty_input() {
        let bloom = BloomFilter::new(10, 0.01);
        bloom.add("");
        assert!(bloom.is_empty());
        assert!(!bloom.might_contain(""));
        assert!(!bloom.might_contain("example.com"));
    }

    #[test]
    fn test_concurrent_adds() {
        use std::sync::Arc;

        let bloom = Arc::new(BloomFilter::new(4000, 0.001));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bloom = Arc::clone(&bloom);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        bloom.add(&format!("t{}-{}.example", t, i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for t in 0..4 {
            for i in 0..1000 {
                assert!(bloom.might_contain(&format!("t{}-{}.example", t, i)));
            }
        }
    }
}
