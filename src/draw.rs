use rand::Rng;
use rand::seq::SliceRandom;

/// Pick one entry uniformly at random
///
/// Every position has the same chance, so duplicated names win more often.
/// Draws are independent: earlier winners are not excluded.
///
/// # Arguments
/// * `entries` - The entries to draw from
/// * `rng` - Source of randomness
///
/// # Returns
/// * `Option<&T>` - The winner, or `None` if `entries` is empty
pub fn draw<'a, T, R>(entries: &'a [T], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    entries.choose(rng)
}

/// Pick one entry using the thread-local random generator
pub fn draw_winner<T>(entries: &[T]) -> Option<&T> {
    draw(entries, &mut rand::thread_rng())
}
