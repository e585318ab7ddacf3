use subtle::ConstantTimeEq;

/// Set of API keys accepted by the ingress.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    keys: Vec<String>,
    required: bool,
}

impl ApiKeys {
    /// Accepts requests presenting any of `keys`. Blank keys are ignored.
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .filter(|key: &String| !key.trim().is_empty())
            .collect();
        Self {
            keys,
            required: true,
        }
    }

    /// Accepts every request, with or without a key.
    pub fn disabled() -> Self {
        Self {
            keys: Vec::new(),
            required: false,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks `presented` against every configured key.
    ///
    /// All keys are compared in constant time and the loop never exits early,
    /// so timing does not reveal which key came close.
    pub fn verify(&self, presented: Option<&str>) -> bool {
        if !self.required {
            return true;
        }
        let Some(presented) = presented else {
            return false;
        };
        self.keys.iter().fold(false, |matched, key| {
            let equal: bool = key.as_bytes().ct_eq(presented.as_bytes()).into();
            matched | equal
        })
    }
}
