/// Strict round-robin position over `len` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    len: usize,
    next: usize,
}

impl RoundRobin {
    pub fn new(len: usize) -> Self {
        Self { len, next: 0 }
    }

    /// Index the next call to [`RoundRobin::advance`] returns.
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn advance(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let current = self.next;
        self.next = (self.next + 1) % self.len;
        Some(current)
    }

    /// The next `count` indices, never repeating one within a batch.
    pub fn take(&mut self, count: usize) -> Vec<usize> {
        let count = count.min(self.len);
        (0..count).filter_map(|_| self.advance()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_around() {
        let mut cursor = RoundRobin::new(3);
        let seen: Vec<usize> = (0..7).filter_map(|_| cursor.advance()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_empty_never_yields() {
        let mut cursor = RoundRobin::new(0);
        assert_eq!(cursor.advance(), None);
        assert!(cursor.take(3).is_empty());
    }

    #[test]
    fn test_take_batches_continue_the_rotation() {
        let mut cursor = RoundRobin::new(5);
        assert_eq!(cursor.take(2), vec![0, 1]);
        assert_eq!(cursor.take(2), vec![2, 3]);
        assert_eq!(cursor.take(2), vec![4, 0]);
    }

    #[test]
    fn test_take_is_clamped_to_len() {
        let mut cursor = RoundRobin::new(2);
        assert_eq!(cursor.take(5), vec![0, 1]);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        for len in 1..10 {
            let mut cursor = RoundRobin::new(len);
            let mut counts = vec![0; len];
            for _ in 0..len {
                counts[cursor.advance().unwrap()] += 1;
            }
            assert!(counts.iter().all(|&c| c == 1));
            assert_eq!(cursor.position(), 0);
        }
    }
}
