//! Bounded text accumulator that keeps the most recent output

/// Tail buffer - stores the last N characters of output
#[derive(Debug, Clone)]
pub struct TailBuffer {
    /// Buffered text
    text: String,
    /// Number of chars currently in `text`
    chars: usize,
    /// Maximum number of chars to keep
    max_chars: usize,
}

impl TailBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            max_chars,
        }
    }

    /// Append text, dropping the oldest content beyond the bound
    pub fn push(&mut self, text: &str) {
        self.text.push_str(text);
        self.chars += text.chars().count();
        if self.chars > self.max_chars {
            self.drop_front(self.chars - self.max_chars);
        }
    }

    /// Keep only the last `keep` characters
    pub fn truncate_to_tail(&mut self, keep: usize) {
        if self.chars > keep {
            self.drop_front(self.chars - keep);
        }
    }

    fn drop_front(&mut self, count: usize) {
        let cut = self
            .text
            .char_indices()
            .nth(count)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len());
        self.text.drain(..cut);
        self.chars -= count.min(self.chars);
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of characters held
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_tail() {
        let mut buf = TailBuffer::new(5);
        buf.push("abc");
        buf.push("defg");
        assert_eq!(buf.as_str(), "cdefg");
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_multibyte_boundaries() {
        let mut buf = TailBuffer::new(3);
        buf.push("❯❯ab");
        assert_eq!(buf.as_str(), "❯ab");
        buf.truncate_to_tail(1);
        assert_eq!(buf.as_str(), "b");
    }

    #[test]
    fn test_clear() {
        let mut buf = TailBuffer::new(10);
        buf.push("hello");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.as_str(), "");
        buf.push("x");
        assert_eq!(buf.len(), 1);
    }
}
