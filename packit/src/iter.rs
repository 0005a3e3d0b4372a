/// An iterator wrapper that counts
/// the words handed out.
pub(crate) struct Counting<I> {
    iter: I,
    count: usize,
}

impl<I> Counting<I> {
    pub fn new(iter: I) -> Self {
        Self { iter, count: 0 }
    }

    /// Number of words yielded so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.count
    }
}

impl<I: Iterator> Iterator for Counting<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let word = self.iter.next()?;

        self.count += 1;

        Some(word)
    }
}
