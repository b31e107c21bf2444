use url::Url;

/// In-process history stack for the navigation surface.
pub struct History {
    entries: Vec<Url>,
    index: usize,
}

impl History {
    pub fn new(initial: Url) -> History {
        History {
            entries: vec![initial],
            index: 0,
        }
    }

    pub fn current(&self) -> &Url {
        &self.entries[self.index]
    }

    /// Pushes a new entry, discarding any forward entries.
    pub fn push(&mut self, url: Url) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url);
        self.index += 1;
    }

    pub fn replace(&mut self, url: Url) {
        self.entries[self.index] = url;
    }

    pub fn back(&mut self) -> Option<&Url> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&Url> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test url")
    }

    #[test]
    fn push_discards_forward_entries() {
        let mut history = History::new(url("https://app.test/"));
        history.push(url("https://app.test/a"));
        history.push(url("https://app.test/b"));
        assert_eq!(history.back().unwrap().path(), "/a");
        history.push(url("https://app.test/c"));
        assert!(history.forward().is_none());
        assert_eq!(history.current().path(), "/c");
        assert_eq!(history.back().unwrap().path(), "/a");
        assert_eq!(history.back().unwrap().path(), "/");
        assert!(history.back().is_none());
    }

    #[test]
    fn replace_keeps_position() {
        let mut history = History::new(url("https://app.test/"));
        history.push(url("https://app.test/a"));
        history.replace(url("https://app.test/a2"));
        assert_eq!(history.current().path(), "/a2");
        assert_eq!(history.back().unwrap().path(), "/");
        assert_eq!(history.forward().unwrap().path(), "/a2");
    }
}
