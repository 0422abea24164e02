use crate::shared::embedding::Embedding;
use crate::similarity::appearance::unit_similarity;

/// Bounded reservoir of representative embeddings for one modality.
///
/// On overflow the candidate pool (stored exemplars plus the newcomer) drops
/// the member with the lowest mean similarity to the others, so outliers
/// such as a blurred or occluded crop are the first to go. Ties evict the
/// oldest member.
#[derive(Clone, Debug, PartialEq)]
pub struct ExemplarSet {
    capacity: usize,
    /// Oldest first.
    exemplars: Vec<Embedding>,
}

impl ExemplarSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            exemplars: Vec::new(),
        }
    }

    pub fn seeded(capacity: usize, seed: Embedding) -> Self {
        let mut set = Self::new(capacity);
        set.exemplars.push(seed);
        set
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Embedding> {
        self.exemplars.iter()
    }

    /// Adds `candidate`, returning whichever embedding had to leave the
    /// reservoir (possibly `candidate` itself).
    pub fn insert(&mut self, candidate: Embedding) -> Option<Embedding> {
        if self.exemplars.len() < self.capacity {
            self.exemplars.push(candidate);
            return None;
        }

        self.exemplars.push(candidate);
        let victim = least_representative(&self.exemplars);
        Some(self.exemplars.remove(victim))
    }
}

fn least_representative(pool: &[Embedding]) -> usize {
    let n = pool.len();
    if n < 2 {
        return 0;
    }
    let mut sums = vec![0.0; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = unit_similarity(&pool[i], &pool[j]);
            sums[i] += s;
            sums[j] += s;
        }
    }
    // Strict comparison keeps the earliest (oldest) index on ties.
    let mut victim = 0;
    for (i, s) in sums.iter().enumerate().skip(1) {
        if *s < sums[victim] {
            victim = i;
        }
    }
    victim
}
