/// Cache entries a successful mutation makes obsolete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    own: bool,
    extra: Vec<String>,
    refetch: bool,
}

impl Invalidation {
    /// Leave every entry to expire on its own.
    pub fn none() -> Self {
        Self::default()
    }

    /// Purge the mutating resource's own key.
    pub fn own() -> Self {
        Self {
            own: true,
            ..Self::default()
        }
    }

    /// Also purge `keys`, e.g. detail entries under a list resource.
    pub fn also<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.extra.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Reload the resource from the remote after purging.
    pub fn and_refetch(mut self) -> Self {
        self.refetch = true;
        self
    }

    pub fn refetches(&self) -> bool {
        self.refetch
    }

    /// Keys to purge, given the mutating resource's key.
    pub fn keys<'a>(&'a self, own_key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.own
            .then_some(own_key)
            .into_iter()
            .chain(self.extra.iter().map(String::as_str))
    }
}
