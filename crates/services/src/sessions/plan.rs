use rand::Rng;

use quiz_core::model::{Question, QuestionBank};

/// Uniform random permutation of `items`, returned as a new list.
///
/// Fisher–Yates from the last index down to 1, each step swapping with a
/// uniformly chosen index at or below it.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.random_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// The first `n` questions of a shuffled bank.
///
/// Asking for more than the bank holds returns the whole bank, shuffled.
pub fn sample_exam<R: Rng + ?Sized>(bank: &QuestionBank, n: usize, rng: &mut R) -> Vec<Question> {
    let mut picked = shuffle(bank.all(), rng);
    picked.truncate(n);
    picked
}

/// One uniformly random question. Draws are independent, so repeats happen.
pub fn draw_random<R: Rng + ?Sized>(bank: &QuestionBank, rng: &mut R) -> Option<Question> {
    if bank.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..bank.count());
    bank.all().get(idx).cloned()
}
